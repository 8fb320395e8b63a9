//! Mock ceremony engine for testing
//!
//! `MockCeremonyEngine` performs no cryptography. It issues random challenges
//! and accepts a response when it echoes the challenge of the session it is
//! checked against, which is enough to exercise every ceremony state
//! transition deterministically.

use std::sync::atomic::{AtomicBool, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::passkey::credential_store::UserAccount;
use crate::passkey::engine::{
    CeremonyEngine, ClaimedIdentity, EngineError, StoredCredential, VerifiedAssertion,
};
use crate::passkey::types::{
    AttestationPreference, AuthenticationOptions, AuthenticatorSelectionCriteria,
    PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, RegistrationOptions,
    RelyingParty, UserEntity,
};

use super::constants::{TEST_RP_ID, TEST_RP_NAME, TEST_TIMEOUT_MILLIS};

fn generate_challenge() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, EngineError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| EngineError::new(format!("{field} is not base64url: {e}")))
}

/// Stored credential with a signature counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCredential {
    pub id: Vec<u8>,
    pub counter: u32,
}

impl MockCredential {
    #[must_use]
    pub fn new(id: &[u8]) -> Self {
        Self {
            id: id.to_vec(),
            counter: 0,
        }
    }
}

impl StoredCredential for MockCredential {
    fn credential_id(&self) -> &[u8] {
        &self.id
    }
}

/// Attestation payload: the new credential id and the challenge it answers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockAttestation {
    pub raw_id: String,
    pub challenge: String,
}

/// Assertion payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockAssertion {
    pub raw_id: String,
    pub challenge: String,
    #[serde(default)]
    pub user_handle: Option<String>,
    #[serde(default)]
    pub counter: u32,
}

#[derive(Debug)]
pub struct MockRegistrationState {
    pub challenge: String,
    pub identity: String,
    pub exclude: Vec<Vec<u8>>,
}

#[derive(Debug)]
pub struct MockAuthenticationState {
    pub challenge: String,
    pub allowed: Vec<Vec<u8>>,
}

/// Challenge-checking fake engine
#[derive(Debug, Default)]
pub struct MockCeremonyEngine {
    fail_options: AtomicBool,
}

impl MockCeremonyEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent begin call fail, as a broken engine would
    pub fn fail_option_generation(&self, fail: bool) {
        self.fail_options.store(fail, Ordering::SeqCst);
    }

    fn check_options(&self) -> Result<(), EngineError> {
        if self.fail_options.load(Ordering::SeqCst) {
            return Err(EngineError::new("mock engine configured to fail"));
        }
        Ok(())
    }
}

impl CeremonyEngine for MockCeremonyEngine {
    type Credential = MockCredential;
    type RegistrationState = MockRegistrationState;
    type AuthenticationState = MockAuthenticationState;
    type AttestationResponse = MockAttestation;
    type AssertionResponse = MockAssertion;

    fn begin_registration(
        &self,
        user: &UserAccount<MockCredential>,
    ) -> Result<(RegistrationOptions, MockRegistrationState), EngineError> {
        self.check_options()?;
        let challenge = generate_challenge();
        let exclude: Vec<Vec<u8>> = user.credentials.iter().map(|c| c.id.clone()).collect();

        let options = RegistrationOptions {
            challenge: challenge.clone(),
            rp: RelyingParty {
                id: TEST_RP_ID.to_string(),
                name: TEST_RP_NAME.to_string(),
            },
            user: UserEntity {
                id: URL_SAFE_NO_PAD.encode(user.user_handle.as_bytes()),
                name: user.identity.clone(),
                display_name: user.display_name.clone(),
            },
            pub_key_cred_params: vec![
                PublicKeyCredentialParameters {
                    kind: "public-key".to_string(),
                    alg: -7,
                },
                PublicKeyCredentialParameters {
                    kind: "public-key".to_string(),
                    alg: -257,
                },
            ],
            timeout: Some(TEST_TIMEOUT_MILLIS),
            exclude_credentials: exclude
                .iter()
                .map(|id| PublicKeyCredentialDescriptor::public_key(id))
                .collect(),
            authenticator_selection: Some(AuthenticatorSelectionCriteria {
                authenticator_attachment: None,
                require_resident_key: false,
                resident_key: Some("discouraged".to_string()),
                user_verification: "preferred".to_string(),
            }),
            attestation: AttestationPreference::normalize("none"),
        };

        Ok((
            options,
            MockRegistrationState {
                challenge,
                identity: user.identity.clone(),
                exclude,
            },
        ))
    }

    fn finish_registration(
        &self,
        response: &MockAttestation,
        state: MockRegistrationState,
    ) -> Result<MockCredential, EngineError> {
        if response.challenge != state.challenge {
            return Err(EngineError::new("challenge mismatch"));
        }
        let id = decode("rawId", &response.raw_id)?;
        if id.is_empty() {
            return Err(EngineError::new("empty credential id"));
        }
        if state.exclude.contains(&id) {
            return Err(EngineError::new(format!(
                "credential already registered to {}",
                state.identity
            )));
        }
        Ok(MockCredential::new(&id))
    }

    fn begin_authentication(
        &self,
        _hint: &UserAccount<MockCredential>,
        candidates: &[MockCredential],
    ) -> Result<(AuthenticationOptions, MockAuthenticationState), EngineError> {
        self.check_options()?;
        let challenge = generate_challenge();

        let options = AuthenticationOptions {
            challenge: challenge.clone(),
            timeout: Some(TEST_TIMEOUT_MILLIS),
            rp_id: TEST_RP_ID.to_string(),
            allow_credentials: Vec::new(),
            user_verification: "preferred".to_string(),
        };

        Ok((
            options,
            MockAuthenticationState {
                challenge,
                allowed: candidates.iter().map(|c| c.id.clone()).collect(),
            },
        ))
    }

    fn finish_authentication(
        &self,
        response: &MockAssertion,
        state: MockAuthenticationState,
        credentials: &mut [MockCredential],
    ) -> Result<VerifiedAssertion, EngineError> {
        if response.challenge != state.challenge {
            return Err(EngineError::new("challenge mismatch"));
        }
        let id = decode("rawId", &response.raw_id)?;
        if !state.allowed.contains(&id) {
            return Err(EngineError::new("credential was not offered for this challenge"));
        }

        let credential = credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::new("credential is not registered to the resolved user"))?;

        if (response.counter != 0 || credential.counter != 0)
            && response.counter <= credential.counter
        {
            return Err(EngineError::new(format!(
                "signature counter did not increase ({} <= {})",
                response.counter, credential.counter
            )));
        }
        credential.counter = response.counter;

        Ok(VerifiedAssertion {
            credential_id: id,
            counter: response.counter,
            user_verified: true,
        })
    }

    fn claimed_identity(response: &MockAssertion) -> Result<ClaimedIdentity, EngineError> {
        let credential_id = decode("rawId", &response.raw_id)?;
        if credential_id.is_empty() {
            return Err(EngineError::new("empty credential id"));
        }
        let user_handle = response
            .user_handle
            .as_deref()
            .map(|handle| decode("userHandle", handle))
            .transpose()?;

        Ok(ClaimedIdentity {
            credential_id,
            user_handle,
        })
    }
}
