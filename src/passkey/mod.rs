//! Passkey ceremonies
//!
//! This module coordinates `WebAuthn` registration and authentication
//! ceremonies: the credential store, pending session registry, identity
//! resolution and the orchestrating service, over a pluggable ceremony engine.

// Core settings
mod settings;
pub use settings::PasskeySettings;

pub mod allow_list;
pub mod credential_store;
pub mod engine;
pub mod errors;
pub mod resolver;
pub mod session;
pub mod types;
pub mod webauthn;

// Service layer
mod service;
pub use service::*;

pub use allow_list::AllowList;
pub use engine::{CeremonyEngine, EngineError};
pub use errors::{CeremonyError, ErrorKind};
pub use webauthn::WebauthnEngine;
