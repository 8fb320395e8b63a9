//! Passkey request handlers
//!
//! Thin HTTP adapters over `PasskeyCeremonyService`. Every failure is
//! rendered by `CeremonyError`'s `ResponseError` impl as `{"message": ...}`.

use actix_web::{web, HttpResponse, Result};

use crate::passkey::types::{
    AuthenticationVerified, AuthenticationVerifyRequest, RegistrationOptionsRequest,
    RegistrationVerified, RegistrationVerifyRequest,
};
use crate::passkey::{CeremonyEngine, CeremonyError, PasskeyCeremonyService};

/// `POST /register/options`
///
/// # Errors
///
/// Returns an error if the email is invalid or not allow-listed, or the
/// engine cannot produce options.
pub async fn register_options<E: CeremonyEngine>(
    service: web::Data<PasskeyCeremonyService<E>>,
    body: web::Json<RegistrationOptionsRequest>,
) -> Result<HttpResponse, CeremonyError> {
    let options = service.begin_registration(&body.email)?;
    Ok(HttpResponse::Ok().json(options))
}

/// `POST /register/verify`
///
/// # Errors
///
/// Returns an error if there is no pending registration for the email or the
/// attestation does not verify.
pub async fn register_verify<E: CeremonyEngine>(
    service: web::Data<PasskeyCeremonyService<E>>,
    body: web::Json<RegistrationVerifyRequest<E::AttestationResponse>>,
) -> Result<HttpResponse, CeremonyError> {
    let registered = service.finish_registration(&body.email, &body.attestation_response)?;
    Ok(HttpResponse::Ok().json(RegistrationVerified {
        success: true,
        message: format!("Passkey registered for {}", registered.identity),
    }))
}

/// `POST /login/options`
///
/// # Errors
///
/// Returns an error if nobody has registered yet or the engine cannot produce
/// options.
pub async fn login_options<E: CeremonyEngine>(
    service: web::Data<PasskeyCeremonyService<E>>,
) -> Result<HttpResponse, CeremonyError> {
    let options = service.begin_authentication()?;
    Ok(HttpResponse::Ok().json(options))
}

/// `POST /login/verify`
///
/// # Errors
///
/// Returns an error if there is no pending login, the assertion cannot be
/// matched to a user, or it does not verify.
pub async fn login_verify<E: CeremonyEngine>(
    service: web::Data<PasskeyCeremonyService<E>>,
    body: web::Json<AuthenticationVerifyRequest<E::AssertionResponse>>,
) -> Result<HttpResponse, CeremonyError> {
    let user = service.finish_authentication(&body.assertion_response)?;
    Ok(HttpResponse::Ok().json(AuthenticationVerified {
        success: true,
        message: "Login successful".to_string(),
        email: user.identity,
        display_name: user.display_name,
    }))
}
