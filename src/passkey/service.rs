//! Passkey ceremony service
//!
//! Drives the four ceremony steps. The credential store and session registry
//! live behind one mutex, held across each engine call, so two requests can
//! never interleave their reads and writes.
//!
//! The lock is a blocking `std::sync::Mutex` taken on the actix worker thread
//! for the whole signature check. Engines must stay synchronous and CPU-bound;
//! an engine that awaits I/O needs the state moved behind an async lock or
//! the verification moved out of the critical section first.

use std::sync::{LazyLock, Mutex};

use regex::Regex;

use crate::passkey::allow_list::AllowList;
use crate::passkey::credential_store::CredentialStore;
use crate::passkey::engine::{CeremonyEngine, StoredCredential};
use crate::passkey::errors::CeremonyError;
use crate::passkey::resolver::{IdentityResolver, Resolution};
use crate::passkey::session::{CeremonyKind, SessionRegistry};
use crate::passkey::settings::PasskeySettings;
use crate::passkey::types::{AuthenticationOptions, RegistrationOptions};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Validate and normalize a client-supplied email identity
///
/// # Errors
///
/// Returns `Validation` if the email is blank or malformed.
pub fn validate_email(email: &str) -> Result<&str, CeremonyError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CeremonyError::Validation("email is required".to_string()));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(CeremonyError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email)
}

/// Shortened base64url credential id for log lines
fn credential_label(credential_id: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let encoded = URL_SAFE_NO_PAD.encode(credential_id);
    encoded.chars().take(12).collect()
}

/// Mutable ceremony state shared by all requests
pub struct CeremonyState<E: CeremonyEngine> {
    pub store: CredentialStore<E::Credential>,
    pub sessions: SessionRegistry<E::RegistrationState, E::AuthenticationState>,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    pub identity: String,
    pub credential_id: Vec<u8>,
    /// Credentials the user holds after this registration
    pub credential_count: usize,
}

/// Outcome of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub identity: String,
    pub display_name: String,
    pub credential_id: Vec<u8>,
    pub resolution: Resolution,
    pub counter: u32,
    pub user_verified: bool,
}

/// Coordinates passkey ceremonies over a [`CeremonyEngine`]
pub struct PasskeyCeremonyService<E: CeremonyEngine> {
    engine: E,
    allow_list: AllowList,
    resolver: IdentityResolver,
    state: Mutex<CeremonyState<E>>,
}

impl<E: CeremonyEngine> PasskeyCeremonyService<E> {
    /// Create a service with an empty credential store
    #[must_use]
    pub fn new(engine: E, allow_list: AllowList, settings: &PasskeySettings) -> Self {
        Self {
            engine,
            allow_list,
            resolver: IdentityResolver::new(settings.permissive_resolution),
            state: Mutex::new(CeremonyState {
                store: CredentialStore::new(),
                sessions: SessionRegistry::new(settings.session_ttl()),
            }),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run `f` with the ceremony state locked
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the state lock is poisoned.
    pub fn with_state<T>(
        &self,
        f: impl FnOnce(&mut CeremonyState<E>) -> T,
    ) -> Result<T, CeremonyError> {
        let mut state = self.state.lock()?;
        Ok(f(&mut state))
    }

    /// Issue registration options for `email`
    ///
    /// Starting a new registration abandons any unfinished one for the same user.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, `NotAllowed` if the email is not on
    /// the allow-list, `OptionsGeneration` if the engine fails.
    pub fn begin_registration(&self, email: &str) -> Result<RegistrationOptions, CeremonyError> {
        let identity = validate_email(email)?;
        if !self.allow_list.is_allowed(identity) {
            log::warn!("Registration refused for {identity}: not on the allow-list");
            return Err(CeremonyError::NotAllowed(identity.to_string()));
        }

        let mut state = self.state.lock()?;
        let CeremonyState { store, sessions } = &mut *state;
        sessions.purge_expired();

        let user = store.get_or_create_user(identity);
        let (options, registration) = self.engine.begin_registration(user).map_err(|e| {
            log::error!("Registration options for {identity} failed: {e}");
            CeremonyError::OptionsGeneration {
                ceremony: CeremonyKind::Registration.as_str(),
                reason: e.to_string(),
            }
        })?;

        sessions.begin_registration(identity, options.challenge.clone(), registration);
        log::info!("Registration started for {identity}");
        Ok(options)
    }

    /// Verify an attestation and attach the new credential to `email`
    ///
    /// # Errors
    ///
    /// `NoPendingSession`/`SessionExpired` if no live registration exists for
    /// the user, `RegistrationVerificationFailed` if the engine rejects the
    /// attestation, `DuplicateCredential` if the credential id is taken.
    pub fn finish_registration(
        &self,
        email: &str,
        response: &E::AttestationResponse,
    ) -> Result<RegisteredCredential, CeremonyError> {
        let identity = validate_email(email)?;

        let mut state = self.state.lock()?;
        let CeremonyState { store, sessions } = &mut *state;

        if store.find_user_by_identity(identity).is_none() {
            log::warn!("Registration finish for unknown user {identity}");
            return Err(CeremonyError::NoPendingSession(
                CeremonyKind::Registration.as_str(),
            ));
        }

        let session = sessions.consume_registration(identity).inspect_err(|e| {
            log::warn!("Registration finish for {identity} rejected: {e}");
        })?;

        let credential = self
            .engine
            .finish_registration(response, session.state)
            .map_err(|e| {
                log::warn!("Registration verification failed for {identity}: {e}");
                CeremonyError::RegistrationVerificationFailed(e.to_string())
            })?;

        let credential_id = credential.credential_id().to_vec();
        store.append_credential(identity, credential)?;
        sessions.mark_registration_complete(identity);

        let credential_count = store
            .find_user_by_identity(identity)
            .map_or(0, |user| user.credentials.len());
        log::info!(
            "Registered credential {} for {identity} ({credential_count} total)",
            credential_label(&credential_id)
        );

        Ok(RegisteredCredential {
            identity: identity.to_string(),
            credential_id,
            credential_count,
        })
    }

    /// Issue authentication options for whichever user responds
    ///
    /// Any earlier unconsumed authentication session is replaced.
    ///
    /// # Errors
    ///
    /// `NoRegisteredUsers` if no user holds a credential,
    /// `OptionsGeneration` if the engine fails.
    pub fn begin_authentication(&self) -> Result<AuthenticationOptions, CeremonyError> {
        let mut state = self.state.lock()?;
        let CeremonyState { store, sessions } = &mut *state;
        sessions.purge_expired();

        let hint = IdentityResolver::fallback_user(store).inspect_err(|_| {
            log::warn!("Authentication requested but no users have registered");
        })?;
        let candidates = store.all_credentials();

        let (options, authentication) = self
            .engine
            .begin_authentication(hint, &candidates)
            .map_err(|e| {
                log::error!("Authentication options failed: {e}");
                CeremonyError::OptionsGeneration {
                    ceremony: CeremonyKind::Authentication.as_str(),
                    reason: e.to_string(),
                }
            })?;

        sessions.begin_authentication(options.challenge.clone(), authentication);
        log::info!(
            "Authentication started over {} credential(s)",
            candidates.len()
        );
        Ok(options)
    }

    /// Resolve and verify an assertion against the shared authentication session
    ///
    /// # Errors
    ///
    /// `NoPendingSession`/`SessionExpired` if no live authentication exists,
    /// `UserResolutionFailed` if no user can be matched,
    /// `AuthenticationVerificationFailed` if the engine rejects the assertion.
    pub fn finish_authentication(
        &self,
        response: &E::AssertionResponse,
    ) -> Result<AuthenticatedUser, CeremonyError> {
        let mut state = self.state.lock()?;
        let CeremonyState { store, sessions } = &mut *state;

        let session = sessions.consume_authentication().inspect_err(|e| {
            log::warn!("Authentication finish rejected: {e}");
        })?;

        let claimed = E::claimed_identity(response).map_err(|e| {
            log::warn!("Assertion identifiers are malformed: {e}");
            CeremonyError::Validation(e.to_string())
        })?;

        let (identity, resolution) = self.resolver.resolve(store, &claimed).map_err(|e| {
            log::warn!("Could not resolve assertion to a user: {e}");
            CeremonyError::UserResolutionFailed
        })?;

        let credentials = store
            .credentials_mut(&identity)
            .ok_or(CeremonyError::UserResolutionFailed)?;
        let verified = self
            .engine
            .finish_authentication(response, session.state, credentials)
            .map_err(|e| {
                log::warn!("Authentication verification failed for {identity}: {e}");
                CeremonyError::AuthenticationVerificationFailed(e.to_string())
            })?;

        sessions.mark_authentication_complete();

        let display_name = store
            .find_user_by_identity(&identity)
            .map_or_else(|| identity.clone(), |user| user.display_name.clone());
        log::info!(
            "Authenticated {identity} with credential {} (resolved by {resolution:?}, counter {})",
            credential_label(&verified.credential_id),
            verified.counter
        );

        Ok(AuthenticatedUser {
            identity,
            display_name,
            credential_id: verified.credential_id,
            resolution,
            counter: verified.counter,
            user_verified: verified.user_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{assertion_for, attestation_for};
    use crate::testing::mock::MockCeremonyEngine;

    fn service(allowed: &[&str]) -> PasskeyCeremonyService<MockCeremonyEngine> {
        PasskeyCeremonyService::new(
            MockCeremonyEngine::new(),
            AllowList::new(allowed.iter().copied()),
            &PasskeySettings::default(),
        )
    }

    fn register(service: &PasskeyCeremonyService<MockCeremonyEngine>, email: &str, raw_id: &[u8]) {
        let options = service.begin_registration(email).unwrap();
        service
            .finish_registration(email, &attestation_for(raw_id, &options.challenge))
            .unwrap();
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(validate_email("  a@x.com ").unwrap(), "a@x.com");
        assert!(matches!(validate_email(""), Err(CeremonyError::Validation(_))));
        assert!(matches!(validate_email("a@x"), Err(CeremonyError::Validation(_))));
        assert!(matches!(validate_email("a b@x.com"), Err(CeremonyError::Validation(_))));
    }

    #[test]
    fn test_not_allowed_identity_rejected() {
        let service = service(&["a@x.com"]);
        let err = service.begin_registration("b@x.com").unwrap_err();
        assert!(matches!(err, CeremonyError::NotAllowed(_)));

        // No user record is created for a refused identity
        let users = service.with_state(|s| s.store.user_count()).unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn test_registration_round_trip() {
        let service = service(&[]);
        let options = service.begin_registration("a@x.com").unwrap();
        assert!(!options.challenge.is_empty());

        let registered = service
            .finish_registration("a@x.com", &attestation_for(b"cred-a", &options.challenge))
            .unwrap();
        assert_eq!(registered.credential_count, 1);
        assert_eq!(registered.credential_id, b"cred-a".to_vec());

        let pending = service
            .with_state(|s| s.sessions.has_pending_registration("a@x.com"))
            .unwrap();
        assert!(!pending);
    }

    #[test]
    fn test_second_finish_registration_fails() {
        let service = service(&[]);
        let options = service.begin_registration("a@x.com").unwrap();
        let attestation = attestation_for(b"cred-a", &options.challenge);
        service.finish_registration("a@x.com", &attestation).unwrap();

        let err = service.finish_registration("a@x.com", &attestation).unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
    }

    #[test]
    fn test_failed_verification_invalidates_session() {
        let service = service(&[]);
        let options = service.begin_registration("a@x.com").unwrap();

        let err = service
            .finish_registration("a@x.com", &attestation_for(b"cred-a", "wrong-challenge"))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::RegistrationVerificationFailed(_)));

        // Even the correct response cannot finish an invalidated session
        let err = service
            .finish_registration("a@x.com", &attestation_for(b"cred-a", &options.challenge))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
    }

    #[test]
    fn test_duplicate_credential_across_users() {
        let service = service(&[]);
        register(&service, "a@x.com", b"shared");

        let options = service.begin_registration("b@x.com").unwrap();
        let err = service
            .finish_registration("b@x.com", &attestation_for(b"shared", &options.challenge))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::DuplicateCredential));

        let b_credentials = service
            .with_state(|s| s.store.find_user_by_identity("b@x.com").map(|u| u.credentials.len()))
            .unwrap();
        assert_eq!(b_credentials, Some(0));
    }

    #[test]
    fn test_begin_authentication_requires_registered_user() {
        let service = service(&[]);
        let err = service.begin_authentication().unwrap_err();
        assert!(matches!(err, CeremonyError::NoRegisteredUsers));

        // A user with only an abandoned registration does not count
        service.begin_registration("a@x.com").unwrap();
        let err = service.begin_authentication().unwrap_err();
        assert!(matches!(err, CeremonyError::NoRegisteredUsers));

        register(&service, "a@x.com", b"cred-a");
        let options = service.begin_authentication().unwrap();
        assert!(!options.challenge.is_empty());
        assert!(options.allow_credentials.is_empty());
    }

    #[test]
    fn test_authentication_round_trip() {
        let service = service(&[]);
        register(&service, "a@x.com", b"cred-a");
        register(&service, "b@x.com", b"cred-b");

        let options = service.begin_authentication().unwrap();
        let user = service
            .finish_authentication(&assertion_for(b"cred-b", &options.challenge, None, 1))
            .unwrap();
        assert_eq!(user.identity, "b@x.com");
        assert_eq!(user.display_name, "b@x.com");
        assert_eq!(user.resolution, Resolution::CredentialId);
        assert_eq!(user.counter, 1);

        let err = service
            .finish_authentication(&assertion_for(b"cred-b", &options.challenge, None, 2))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
    }

    #[test]
    fn test_authentication_without_session() {
        let service = service(&[]);
        register(&service, "a@x.com", b"cred-a");

        let err = service
            .finish_authentication(&assertion_for(b"cred-a", "anything", None, 1))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
    }

    #[test]
    fn test_strict_resolution_rejects_unknown_credential() {
        let settings = PasskeySettings {
            permissive_resolution: false,
            ..PasskeySettings::default()
        };
        let service =
            PasskeyCeremonyService::new(MockCeremonyEngine::new(), AllowList::default(), &settings);
        register(&service, "a@x.com", b"cred-a");

        let options = service.begin_authentication().unwrap();
        let err = service
            .finish_authentication(&assertion_for(b"stranger", &options.challenge, None, 1))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::UserResolutionFailed));
    }

    #[test]
    fn test_replayed_counter_rejected() {
        let service = service(&[]);
        register(&service, "a@x.com", b"cred-a");

        let options = service.begin_authentication().unwrap();
        service
            .finish_authentication(&assertion_for(b"cred-a", &options.challenge, None, 5))
            .unwrap();

        let options = service.begin_authentication().unwrap();
        let err = service
            .finish_authentication(&assertion_for(b"cred-a", &options.challenge, None, 5))
            .unwrap_err();
        assert!(matches!(err, CeremonyError::AuthenticationVerificationFailed(_)));
    }
}
