//! Testing utilities for the passkey relying party
//!
//! - [`mock`] - `MockCeremonyEngine`, a deterministic engine without cryptography
//! - [`fixtures`] - Ceremony payloads, request bodies and ready-made services
//!
//! Available to unit tests and, with the `testing` feature, to integration tests.
//!
//! ```rust,ignore
//! use passkey_rp::testing::fixtures::{attestation_for, mock_service};
//!
//! let service = mock_service(&["a@x.com"]);
//! let options = service.begin_registration("a@x.com")?;
//! service.finish_registration("a@x.com", &attestation_for(b"cred", &options.challenge))?;
//! ```

pub mod fixtures;
pub mod mock;

pub use mock::{MockAssertion, MockAttestation, MockCeremonyEngine, MockCredential};

/// Common test constants
pub mod constants {
    /// Relying party id reported by the mock engine
    pub const TEST_RP_ID: &str = "localhost";

    /// Relying party name reported by the mock engine
    pub const TEST_RP_NAME: &str = "Passkey Sample App";

    /// Ceremony timeout reported by the mock engine
    pub const TEST_TIMEOUT_MILLIS: u32 = 60_000;

    /// Allow-listed test identity
    pub const TEST_EMAIL: &str = "a@x.com";

    /// Identity that is not on the test allow-list
    pub const OTHER_EMAIL: &str = "b@x.com";
}
