//! `webauthn-rs` ceremony engine
//!
//! Adapts `webauthn-rs` passkey ceremonies to [`CeremonyEngine`], converting
//! its protocol structures into the wire options this service returns.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use webauthn_rs::prelude::{
    CredentialID, Passkey, PasskeyAuthentication, PasskeyRegistration, Webauthn,
};
use webauthn_rs_proto::{
    CreationChallengeResponse, PublicKeyCredential, RegisterPublicKeyCredential,
    RequestChallengeResponse,
};

use crate::passkey::credential_store::UserAccount;
use crate::passkey::engine::{
    CeremonyEngine, ClaimedIdentity, EngineError, StoredCredential, VerifiedAssertion,
};
use crate::passkey::settings::PasskeySettings;
use crate::passkey::types::{
    AttestationPreference, AuthenticationOptions, AuthenticatorSelectionCriteria,
    PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, RegistrationOptions,
    RelyingParty, UserEntity,
};

impl StoredCredential for Passkey {
    fn credential_id(&self) -> &[u8] {
        self.cred_id().as_ref()
    }
}

/// Name a protocol enum serializes to, e.g. `"preferred"`
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// Ceremony engine backed by `webauthn-rs`
pub struct WebauthnEngine {
    webauthn: Webauthn,
    timeout_millis: u32,
}

impl WebauthnEngine {
    /// Build the engine for the configured relying party
    ///
    /// # Errors
    ///
    /// Returns an error if the relying party settings are invalid.
    pub fn from_settings(settings: &PasskeySettings) -> Result<Self, EngineError> {
        Ok(Self {
            webauthn: settings.create_webauthn()?,
            timeout_millis: settings.timeout_millis(),
        })
    }

    fn registration_options(
        &self,
        ccr: CreationChallengeResponse,
        user: &UserAccount<Passkey>,
    ) -> Result<RegistrationOptions, EngineError> {
        let pk = ccr.public_key;

        let authenticator_selection = pk
            .authenticator_selection
            .map(|selection| {
                serde_json::to_value(selection)
                    .and_then(serde_json::from_value::<AuthenticatorSelectionCriteria>)
            })
            .transpose()
            .map_err(|e| EngineError::new(format!("Unexpected authenticator selection: {e}")))?;

        let attestation = pk
            .attestation
            .map_or(AttestationPreference::None, |preference| {
                AttestationPreference::normalize(&wire_name(&preference))
            });

        Ok(RegistrationOptions {
            challenge: URL_SAFE_NO_PAD.encode(&pk.challenge),
            rp: RelyingParty {
                id: pk.rp.id,
                name: pk.rp.name,
            },
            user: UserEntity {
                id: URL_SAFE_NO_PAD.encode(&pk.user.id),
                name: pk.user.name,
                display_name: pk.user.display_name,
            },
            pub_key_cred_params: pk
                .pub_key_cred_params
                .into_iter()
                .map(|param| PublicKeyCredentialParameters {
                    kind: param.type_,
                    alg: param.alg,
                })
                .collect(),
            timeout: Some(self.timeout_millis),
            exclude_credentials: user
                .credentials
                .iter()
                .map(|c| PublicKeyCredentialDescriptor::public_key(c.credential_id()))
                .collect(),
            authenticator_selection,
            attestation,
        })
    }

    fn authentication_options(&self, rcr: RequestChallengeResponse) -> AuthenticationOptions {
        let pk = rcr.public_key;
        AuthenticationOptions {
            challenge: URL_SAFE_NO_PAD.encode(&pk.challenge),
            timeout: Some(self.timeout_millis),
            rp_id: pk.rp_id,
            // The client chooses among its discoverable credentials
            allow_credentials: Vec::new(),
            user_verification: wire_name(&pk.user_verification),
        }
    }
}

impl CeremonyEngine for WebauthnEngine {
    type Credential = Passkey;
    type RegistrationState = PasskeyRegistration;
    type AuthenticationState = PasskeyAuthentication;
    type AttestationResponse = RegisterPublicKeyCredential;
    type AssertionResponse = PublicKeyCredential;

    fn begin_registration(
        &self,
        user: &UserAccount<Passkey>,
    ) -> Result<(RegistrationOptions, PasskeyRegistration), EngineError> {
        let exclude: Vec<CredentialID> = user
            .credentials
            .iter()
            .map(|c| c.cred_id().clone())
            .collect();
        let exclude = if exclude.is_empty() { None } else { Some(exclude) };

        let (ccr, state) = self
            .webauthn
            .start_passkey_registration(
                user.user_handle,
                &user.identity,
                &user.display_name,
                exclude,
            )
            .map_err(|e| EngineError::new(format!("Failed to start registration: {e}")))?;

        Ok((self.registration_options(ccr, user)?, state))
    }

    fn finish_registration(
        &self,
        response: &RegisterPublicKeyCredential,
        state: PasskeyRegistration,
    ) -> Result<Passkey, EngineError> {
        self.webauthn
            .finish_passkey_registration(response, &state)
            .map_err(|e| EngineError::new(e.to_string()))
    }

    fn begin_authentication(
        &self,
        hint: &UserAccount<Passkey>,
        candidates: &[Passkey],
    ) -> Result<(AuthenticationOptions, PasskeyAuthentication), EngineError> {
        log::debug!(
            "Starting authentication over {} credential(s), options generated for {}",
            candidates.len(),
            hint.identity
        );

        let (rcr, state) = self
            .webauthn
            .start_passkey_authentication(candidates)
            .map_err(|e| EngineError::new(format!("Failed to start authentication: {e}")))?;

        Ok((self.authentication_options(rcr), state))
    }

    fn finish_authentication(
        &self,
        response: &PublicKeyCredential,
        state: PasskeyAuthentication,
        credentials: &mut [Passkey],
    ) -> Result<VerifiedAssertion, EngineError> {
        let asserted: &[u8] = response.raw_id.as_ref();
        if !credentials.iter().any(|c| c.credential_id() == asserted) {
            return Err(EngineError::new(
                "credential is not registered to the resolved user",
            ));
        }

        let result = self
            .webauthn
            .finish_passkey_authentication(response, &state)
            .map_err(|e| EngineError::new(e.to_string()))?;

        for credential in credentials.iter_mut() {
            credential.update_credential(&result);
        }

        Ok(VerifiedAssertion {
            credential_id: result.cred_id().as_ref().to_vec(),
            counter: result.counter(),
            user_verified: result.user_verified(),
        })
    }

    fn claimed_identity(response: &PublicKeyCredential) -> Result<ClaimedIdentity, EngineError> {
        let credential_id: &[u8] = response.raw_id.as_ref();
        if credential_id.is_empty() {
            return Err(EngineError::new("assertion carries an empty credential id"));
        }

        Ok(ClaimedIdentity {
            credential_id: credential_id.to_vec(),
            user_handle: response
                .response
                .user_handle
                .as_ref()
                .map(|handle| AsRef::<[u8]>::as_ref(handle).to_vec()),
        })
    }
}
