//! Test fixtures providing pre-built ceremony payloads and services

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use crate::passkey::{AllowList, PasskeyCeremonyService, PasskeySettings};

use super::mock::{MockAssertion, MockAttestation, MockCeremonyEngine};

/// Attestation answering `challenge` with a new credential `raw_id`
#[must_use]
pub fn attestation_for(raw_id: &[u8], challenge: &str) -> MockAttestation {
    MockAttestation {
        raw_id: URL_SAFE_NO_PAD.encode(raw_id),
        challenge: challenge.to_string(),
    }
}

/// Assertion answering `challenge` with credential `raw_id`
#[must_use]
pub fn assertion_for(
    raw_id: &[u8],
    challenge: &str,
    user_handle: Option<&[u8]>,
    counter: u32,
) -> MockAssertion {
    MockAssertion {
        raw_id: URL_SAFE_NO_PAD.encode(raw_id),
        challenge: challenge.to_string(),
        user_handle: user_handle.map(|h| URL_SAFE_NO_PAD.encode(h)),
        counter,
    }
}

/// `POST /register/verify` body
#[must_use]
pub fn register_verify_body(email: &str, raw_id: &[u8], challenge: &str) -> Value {
    json!({
        "email": email,
        "attestationResponse": attestation_for(raw_id, challenge),
    })
}

/// `POST /login/verify` body
#[must_use]
pub fn login_verify_body(raw_id: &[u8], challenge: &str, counter: u32) -> Value {
    json!({
        "assertionResponse": assertion_for(raw_id, challenge, None, counter),
    })
}

/// Mock-backed ceremony service permitting `allowed` (everyone if empty)
#[must_use]
pub fn mock_service(allowed: &[&str]) -> PasskeyCeremonyService<MockCeremonyEngine> {
    mock_service_with(allowed, &PasskeySettings::default())
}

/// Mock-backed ceremony service with explicit passkey settings
#[must_use]
pub fn mock_service_with(
    allowed: &[&str],
    settings: &PasskeySettings,
) -> PasskeyCeremonyService<MockCeremonyEngine> {
    PasskeyCeremonyService::new(
        MockCeremonyEngine::new(),
        AllowList::new(allowed.iter().copied()),
        settings,
    )
}
