//! Registration allow-list
//!
//! Identities permitted to register, one per line. An empty list means any
//! identity may register, which is only meant for local development.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

/// Identities permitted to begin a registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    identities: BTreeSet<String>,
}

impl AllowList {
    /// Build from an explicit set of identities
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse file contents: lines are trimmed, lines without `@` are ignored
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| line.contains('@')),
        )
    }

    /// Load the allow-list from `path`
    ///
    /// A missing file yields an empty (permit-all) list.
    ///
    /// # Errors
    ///
    /// Returns an error for any read failure other than the file being absent.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!(
                    "Allow-list file {} not found, any email may register",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read allow-list file {}", path.display())
                })
            }
        };

        let list = Self::parse(&contents);
        if list.is_empty() {
            log::warn!(
                "Allow-list file {} has no entries, any email may register",
                path.display()
            );
        } else {
            log::info!("Loaded {} allowed email(s) from {}", list.len(), path.display());
        }
        Ok(list)
    }

    /// Whether `identity` may register
    #[must_use]
    pub fn is_allowed(&self, identity: &str) -> bool {
        if self.identities.is_empty() {
            log::warn!("Allow-list is empty, permitting {identity}");
            return true;
        }
        self.identities.contains(identity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }
}
