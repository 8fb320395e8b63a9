//! In-memory credential store
//!
//! Maps user identities (email addresses) to their registered credentials and
//! keeps an index from credential id to owner so lookups by `rawId` stay cheap.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::passkey::engine::StoredCredential;
use crate::passkey::errors::CeremonyError;

/// A user known to the relying party
#[derive(Debug, Clone)]
pub struct UserAccount<C> {
    /// Unique identity, also used as the account name
    pub identity: String,
    pub display_name: String,
    /// Opaque `WebAuthn` user handle
    pub user_handle: Uuid,
    pub credentials: Vec<C>,
}

impl<C: StoredCredential> UserAccount<C> {
    fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            display_name: identity.to_string(),
            user_handle: Uuid::new_v4(),
            credentials: Vec::new(),
        }
    }

    /// Whether an authenticator-returned user handle designates this user.
    /// Accepts the raw handle bytes or the identity itself.
    #[must_use]
    pub fn matches_user_handle(&self, handle: &[u8]) -> bool {
        handle == self.user_handle.as_bytes() || handle == self.identity.as_bytes()
    }
}

/// Users and their credentials
#[derive(Debug)]
pub struct CredentialStore<C> {
    users: BTreeMap<String, UserAccount<C>>,
    owners: HashMap<Vec<u8>, String>,
}

impl<C> Default for CredentialStore<C> {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            owners: HashMap::new(),
        }
    }
}

impl<C: StoredCredential + Clone> CredentialStore<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the user for `identity`, creating one with no credentials if needed
    pub fn get_or_create_user(&mut self, identity: &str) -> &mut UserAccount<C> {
        self.users.entry(identity.to_string()).or_insert_with(|| {
            log::info!("Creating user {identity}");
            UserAccount::new(identity)
        })
    }

    #[must_use]
    pub fn find_user_by_identity(&self, identity: &str) -> Option<&UserAccount<C>> {
        self.users.get(identity)
    }

    #[must_use]
    pub fn find_user_by_credential_id(&self, credential_id: &[u8]) -> Option<&UserAccount<C>> {
        self.owners
            .get(credential_id)
            .and_then(|identity| self.users.get(identity))
    }

    #[must_use]
    pub fn find_user_by_handle(&self, handle: &[u8]) -> Option<&UserAccount<C>> {
        self.users.values().find(|u| u.matches_user_handle(handle))
    }

    /// Smallest identity among users holding at least one credential
    #[must_use]
    pub fn first_registered_user(&self) -> Option<&UserAccount<C>> {
        self.users.values().find(|u| !u.credentials.is_empty())
    }

    /// Mutable access to a user's credentials so the engine can update counters
    pub fn credentials_mut(&mut self, identity: &str) -> Option<&mut [C]> {
        self.users
            .get_mut(identity)
            .map(|u| u.credentials.as_mut_slice())
    }

    /// Attach a freshly verified credential to `identity`
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCredential` if any user already holds a credential with
    /// the same id, or `Internal` if `identity` is unknown.
    pub fn append_credential(
        &mut self,
        identity: &str,
        credential: C,
    ) -> Result<(), CeremonyError> {
        let credential_id = credential.credential_id().to_vec();
        if let Some(owner) = self.owners.get(&credential_id) {
            log::warn!("Rejecting credential for {identity}: id already registered to {owner}");
            return Err(CeremonyError::DuplicateCredential);
        }

        let user = self
            .users
            .get_mut(identity)
            .ok_or_else(|| CeremonyError::Internal(format!("unknown user {identity}")))?;
        user.credentials.push(credential);
        self.owners.insert(credential_id, identity.to_string());
        Ok(())
    }

    /// Every registered credential across all users
    #[must_use]
    pub fn all_credentials(&self) -> Vec<C> {
        self.users
            .values()
            .flat_map(|u| u.credentials.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn credential_count(&self) -> usize {
        self.owners.len()
    }
}
