//! Ceremony error types
//!
//! Every failure a ceremony can produce, grouped into the coarse kinds the
//! HTTP layer maps onto status codes.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::passkey::types::ErrorBody;

/// Coarse classification of a [`CeremonyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing request fields
    Validation,
    /// Identity is not permitted to register
    Authorization,
    /// Ceremony state does not allow the operation
    State,
    /// The ceremony engine rejected the attestation or assertion
    Verification,
    /// Serialization or internal plumbing failure
    Internal,
}

/// Errors produced by passkey ceremonies
#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} is not allowed to register")]
    NotAllowed(String),

    #[error("no pending {0} session")]
    NoPendingSession(&'static str),

    #[error("{0} session has expired")]
    SessionExpired(&'static str),

    #[error("no registered users")]
    NoRegisteredUsers,

    #[error("could not resolve a registered user for this credential")]
    UserResolutionFailed,

    #[error("credential is already registered")]
    DuplicateCredential,

    #[error("registration verification failed: {0}")]
    RegistrationVerificationFailed(String),

    #[error("authentication verification failed: {0}")]
    AuthenticationVerificationFailed(String),

    /// The engine could not produce ceremony options
    #[error("failed to generate {ceremony} options: {reason}")]
    OptionsGeneration {
        ceremony: &'static str,
        reason: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CeremonyError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotAllowed(_) => ErrorKind::Authorization,
            Self::NoPendingSession(_)
            | Self::SessionExpired(_)
            | Self::NoRegisteredUsers
            | Self::UserResolutionFailed
            | Self::DuplicateCredential => ErrorKind::State,
            Self::RegistrationVerificationFailed(_) | Self::AuthenticationVerificationFailed(_) => {
                ErrorKind::Verification
            }
            Self::OptionsGeneration { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ResponseError for CeremonyError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::State | ErrorKind::Verification => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
        })
    }
}

impl<T> From<std::sync::PoisonError<T>> for CeremonyError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Internal("ceremony state lock poisoned".to_string())
    }
}
