//! `WebAuthn` settings
//!
//! This module defines the relying-party and ceremony settings.

use serde::{Deserialize, Serialize};
use url::Url;
use webauthn_rs::prelude::{Webauthn, WebauthnBuilder};

use crate::passkey::engine::EngineError;

/// Upper bound on how long a pending ceremony may live (one day)
const MAX_SESSION_TTL_SECONDS: u64 = 86_400;

/// Passkey settings for `WebAuthn` operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasskeySettings {
    pub rp_id: String,
    pub rp_name: String,
    pub rp_origin: String,
    /// Ceremony timeout advertised to the client
    pub timeout_seconds: u64,
    /// Lifetime of a pending ceremony session
    pub session_ttl_seconds: u64,
    /// Fall back to an arbitrary registered user when an assertion matches nobody
    pub permissive_resolution: bool,
}

impl Default for PasskeySettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "Passkey Sample App".to_string(),
            rp_origin: "http://localhost:3000".to_string(),
            timeout_seconds: 60,
            session_ttl_seconds: 300,
            permissive_resolution: true,
        }
    }
}

impl PasskeySettings {
    /// Build a `webauthn-rs` instance for this relying party
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not a valid URL or the RP id does
    /// not match the origin's effective domain.
    pub fn create_webauthn(&self) -> Result<Webauthn, EngineError> {
        let origin = Url::parse(&self.rp_origin).map_err(|e| {
            EngineError::new(format!("Invalid relying party origin {}: {e}", self.rp_origin))
        })?;

        WebauthnBuilder::new(&self.rp_id, &origin)
            .and_then(|builder| builder.rp_name(&self.rp_name).build())
            .map_err(|e| EngineError::new(format!("Failed to create WebAuthn: {e}")))
    }

    /// Ceremony timeout in milliseconds, as advertised in options
    #[must_use]
    pub fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout_seconds.saturating_mul(1000)).unwrap_or(u32::MAX)
    }

    /// Session lifetime as a `chrono` duration
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        let seconds = i64::try_from(self.session_ttl_seconds.min(MAX_SESSION_TTL_SECONDS))
            .unwrap_or(i64::MAX);
        chrono::Duration::seconds(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_webauthn() {
        let settings = PasskeySettings::default();
        assert!(settings.create_webauthn().is_ok());
        assert_eq!(settings.session_ttl(), chrono::Duration::seconds(300));
        assert_eq!(settings.timeout_millis(), 60_000);
    }

    #[test]
    fn test_mismatched_rp_id_rejected() {
        let settings = PasskeySettings {
            rp_id: "example.com".to_string(),
            ..PasskeySettings::default()
        };
        assert!(settings.create_webauthn().is_err());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let settings = PasskeySettings {
            rp_origin: "not a url".to_string(),
            ..PasskeySettings::default()
        };
        assert!(settings.create_webauthn().is_err());
    }
}
