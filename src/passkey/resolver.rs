//! Identity resolution for authentication responses
//!
//! Works out which registered user an assertion belongs to before it is
//! verified, so verification runs against that user's stored keys.
//! The credential id is authoritative, the user handle is a hint, and the
//! permissive fallback only exists for single-tenant deployments.

use crate::passkey::credential_store::{CredentialStore, UserAccount};
use crate::passkey::engine::{ClaimedIdentity, StoredCredential};
use crate::passkey::errors::CeremonyError;

/// How a user was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The asserted credential id is registered to the user
    CredentialId,
    /// The authenticator's user handle names the user
    UserHandle,
    /// Neither matched; a registered user was picked
    Fallback,
}

/// Maps a claimed identity onto a registered user
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    permissive: bool,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(permissive: bool) -> Self {
        Self { permissive }
    }

    /// Resolve the identity an assertion concerns
    ///
    /// # Errors
    ///
    /// `NoRegisteredUsers` if nobody has registered a credential yet,
    /// `UserResolutionFailed` if nothing matched and permissive mode is off.
    pub fn resolve<C: StoredCredential + Clone>(
        &self,
        store: &CredentialStore<C>,
        claimed: &ClaimedIdentity,
    ) -> Result<(String, Resolution), CeremonyError> {
        if let Some(user) = store.find_user_by_credential_id(&claimed.credential_id) {
            log::debug!("Resolved {} by credential id", user.identity);
            return Ok((user.identity.clone(), Resolution::CredentialId));
        }

        if let Some(handle) = claimed.user_handle() {
            if let Some(user) = store.find_user_by_handle(handle) {
                log::debug!("Resolved {} by user handle", user.identity);
                return Ok((user.identity.clone(), Resolution::UserHandle));
            }
            log::debug!("User handle did not match any registered user");
        }

        if !self.permissive {
            log::warn!("No user matches the asserted credential and permissive resolution is off");
            return Err(CeremonyError::UserResolutionFailed);
        }

        let user = Self::fallback_user(store)?;
        log::warn!(
            "Permissive resolution: no credential or handle match, falling back to {}",
            user.identity
        );
        Ok((user.identity.clone(), Resolution::Fallback))
    }

    /// The user picked when no identity is known yet
    ///
    /// # Errors
    ///
    /// `NoRegisteredUsers` if no user holds a credential.
    pub fn fallback_user<C: StoredCredential + Clone>(
        store: &CredentialStore<C>,
    ) -> Result<&UserAccount<C>, CeremonyError> {
        store
            .first_registered_user()
            .ok_or(CeremonyError::NoRegisteredUsers)
    }
}
