#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the passkey-rp application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod handlers;
pub mod passkey;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use handlers::{configure_services, health};
pub use passkey::{AllowList, CeremonyError, PasskeyCeremonyService, WebauthnEngine};
pub use settings::RelyingPartySettings;
