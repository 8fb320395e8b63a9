//! `WebAuthn` wire types
//!
//! This module defines the JSON structures exchanged with the browser client.
//! Field names follow the `WebAuthn` JSON serialization (camelCase) so the
//! option objects can be handed to `navigator.credentials` unchanged.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Registration options sent to the client
/// (`PublicKeyCredentialCreationOptions` shape)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String, // Base64URL-encoded random challenge
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>, // Milliseconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>, // Already registered to this user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub attestation: AttestationPreference,
}

/// Authentication options sent to the client
/// (`PublicKeyCredentialRequestOptions` shape)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String, // Base64URL-encoded random challenge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    pub rp_id: String,
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>, // Always empty: the client picks
    pub user_verification: String, // "required", "preferred", "discouraged"
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelyingParty {
    pub id: String,   // Domain name (e.g., "example.com")
    pub name: String, // Display name
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String, // Base64URL-encoded user handle
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub kind: String, // Always "public-key"
    pub alg: i64,     // COSE algorithm (-7 for ES256, -257 for RS256)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>, // "platform", "cross-platform"
    #[serde(default)]
    pub require_resident_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<String>,
    #[serde(default = "default_user_verification")]
    pub user_verification: String,
}

fn default_user_verification() -> String {
    "preferred".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: String, // Always "public-key"
    pub id: String,   // Base64URL-encoded credential ID
}

impl PublicKeyCredentialDescriptor {
    #[must_use]
    pub fn public_key(credential_id: &[u8]) -> Self {
        Self {
            kind: "public-key".to_string(),
            id: URL_SAFE_NO_PAD.encode(credential_id),
        }
    }
}

/// Attestation conveyance preference advertised to the client
///
/// Engines may report values this service does not know about; those are
/// advertised as `none`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    #[default]
    None,
    Direct,
    Indirect,
    Enterprise,
}

impl AttestationPreference {
    /// Map an engine-reported preference onto the advertised set
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "direct" => Self::Direct,
            "indirect" => Self::Indirect,
            "enterprise" => Self::Enterprise,
            other => {
                if !other.is_empty() && other != "none" {
                    log::debug!("Unknown attestation preference '{other}', advertising 'none'");
                }
                Self::None
            }
        }
    }
}

/// Body of `POST /register/options`
#[derive(Deserialize, Debug)]
pub struct RegistrationOptionsRequest {
    pub email: String,
}

/// Body of `POST /register/verify`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationVerifyRequest<A> {
    pub email: String,
    pub attestation_response: A,
}

/// Body of `POST /login/verify`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationVerifyRequest<A> {
    pub assertion_response: A,
}

/// Successful registration reply
#[derive(Serialize, Deserialize, Debug)]
pub struct RegistrationVerified {
    pub success: bool,
    pub message: String,
}

/// Successful login reply
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationVerified {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub display_name: String,
}

/// Error reply for every failed request
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub message: String,
}
