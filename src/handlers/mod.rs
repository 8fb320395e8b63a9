// HTTP request handlers for the passkey relying party
pub mod health;
pub mod passkey;

use actix_web::{error::InternalError, web, HttpResponse};

use crate::passkey::types::ErrorBody;
use crate::passkey::CeremonyEngine;

pub use health::health;
pub use passkey::{login_options, login_verify, register_options, register_verify};

/// JSON extractor config rendering malformed bodies as `400 {"message": ...}`
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("invalid request: {err}");
        log::debug!("Rejected request body: {message}");
        let response = HttpResponse::BadRequest().json(ErrorBody { message });
        InternalError::from_response(err, response).into()
    })
}

/// Mount the health check and the ceremony endpoints under `api_prefix`
pub fn configure_services<E: CeremonyEngine>(cfg: &mut web::ServiceConfig, api_prefix: &str) {
    cfg.app_data(json_config())
        // Health endpoint
        .route("/ping", web::get().to(health))
        // Passkey endpoints
        .service(
            web::scope(api_prefix)
                .route("/register/options", web::post().to(register_options::<E>))
                .route("/register/verify", web::post().to(register_verify::<E>))
                .route("/login/options", web::post().to(login_options::<E>))
                .route("/login/verify", web::post().to(login_verify::<E>)),
        );
}
