//! Ceremony engine interface
//!
//! The engine owns everything cryptographic: challenge generation, attestation
//! verification and assertion signature checks. This service only decides
//! which state and which user's credentials are handed to it.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::passkey::credential_store::UserAccount;
use crate::passkey::types::{AuthenticationOptions, RegistrationOptions};

/// Error reported by a ceremony engine
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A credential held in the credential store
pub trait StoredCredential {
    /// Raw credential identifier, unique across all users
    fn credential_id(&self) -> &[u8];
}

/// Identifying data the client attached to an assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedIdentity {
    pub credential_id: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

impl ClaimedIdentity {
    /// The user handle, if the authenticator returned a non-empty one
    #[must_use]
    pub fn user_handle(&self) -> Option<&[u8]> {
        self.user_handle.as_deref().filter(|h| !h.is_empty())
    }
}

/// Result of a successful assertion check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub credential_id: Vec<u8>,
    pub counter: u32,
    pub user_verified: bool,
}

/// External `WebAuthn` ceremony engine
///
/// Implementations must be side-effect free on failure: a rejected
/// registration yields no credential and a rejected assertion leaves the
/// supplied credentials untouched.
pub trait CeremonyEngine: Send + Sync + 'static {
    /// Public key material and counter state for one registered credential
    type Credential: StoredCredential + Clone + Send + 'static;
    /// Server-side state paired with a registration challenge
    type RegistrationState: Send + 'static;
    /// Server-side state paired with an authentication challenge
    type AuthenticationState: Send + 'static;
    /// Client payload finishing a registration
    type AttestationResponse: DeserializeOwned + Send + 'static;
    /// Client payload finishing an authentication
    type AssertionResponse: DeserializeOwned + Send + 'static;

    /// Produce creation options bound to `user`
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot generate a challenge for this user.
    fn begin_registration(
        &self,
        user: &UserAccount<Self::Credential>,
    ) -> Result<(RegistrationOptions, Self::RegistrationState), EngineError>;

    /// Verify an attestation against the state issued by `begin_registration`
    ///
    /// # Errors
    ///
    /// Returns an error if the attestation does not verify.
    fn finish_registration(
        &self,
        response: &Self::AttestationResponse,
        state: Self::RegistrationState,
    ) -> Result<Self::Credential, EngineError>;

    /// Produce request options for a login whose user is not yet known
    ///
    /// `hint` is the user picked to satisfy option generation; `candidates`
    /// holds every registered credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot generate a challenge.
    fn begin_authentication(
        &self,
        hint: &UserAccount<Self::Credential>,
        candidates: &[Self::Credential],
    ) -> Result<(AuthenticationOptions, Self::AuthenticationState), EngineError>;

    /// Verify an assertion against the resolved user's credentials, updating
    /// the matching credential's counter on success
    ///
    /// # Errors
    ///
    /// Returns an error if the assertion does not verify or does not belong
    /// to one of `credentials`.
    fn finish_authentication(
        &self,
        response: &Self::AssertionResponse,
        state: Self::AuthenticationState,
        credentials: &mut [Self::Credential],
    ) -> Result<VerifiedAssertion, EngineError>;

    /// Extract the credential id and user handle the client claims
    ///
    /// # Errors
    ///
    /// Returns an error if the identifiers in the payload are malformed.
    fn claimed_identity(response: &Self::AssertionResponse) -> Result<ClaimedIdentity, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_user_handle_is_ignored() {
        let claimed = ClaimedIdentity {
            credential_id: vec![1, 2, 3],
            user_handle: Some(Vec::new()),
        };
        assert_eq!(claimed.user_handle(), None);

        let claimed = ClaimedIdentity {
            credential_id: vec![1, 2, 3],
            user_handle: Some(b"a@x.com".to_vec()),
        };
        assert_eq!(claimed.user_handle(), Some(&b"a@x.com"[..]));
    }
}
