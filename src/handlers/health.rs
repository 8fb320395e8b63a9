use actix_web::{HttpResponse, Result};

/// Liveness probe
///
/// # Errors
///
/// Never fails; returns a `Result` for handler signature consistency
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().content_type("text/plain").body("pong"))
}
