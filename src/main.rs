#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use anyhow::{anyhow, Context};
use passkey_rp::{
    configure_services, AllowList, PasskeyCeremonyService, RelyingPartySettings, WebauthnEngine,
    VERSION,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings =
        RelyingPartySettings::load().map_err(|e| anyhow!("Failed to load settings: {e}"))?;

    // A missing allow-list file is tolerated; any other read failure is fatal
    let allow_list = AllowList::load(Path::new(&settings.allow_list.path))?;

    let engine = WebauthnEngine::from_settings(&settings.passkeys)
        .context("Failed to initialize WebAuthn")?;
    let service = web::Data::new(PasskeyCeremonyService::new(
        engine,
        allow_list,
        &settings.passkeys,
    ));

    start_server(service, settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    service: web::Data<PasskeyCeremonyService<WebauthnEngine>>,
    settings: RelyingPartySettings,
) -> anyhow::Result<()> {
    let bind_address = settings.get_bind_address();
    let api_prefix = settings.get_api_prefix();
    print_startup_info(&bind_address, &api_prefix, &settings);

    // Configure CORS for the browser client
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let api_prefix = api_prefix.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(service.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(|cfg| configure_services::<WebauthnEngine>(cfg, &api_prefix))
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("Server terminated with an error")
}

fn print_startup_info(bind_address: &str, api_prefix: &str, settings: &RelyingPartySettings) {
    println!("Starting passkey-rp {VERSION} on http://{bind_address}");
    println!(
        "Relying party: {} ({}) at {}",
        settings.passkeys.rp_name, settings.passkeys.rp_id, settings.passkeys.rp_origin
    );
    println!();
    println!("Passkey endpoints:");
    println!("  POST {api_prefix}/register/options - Start passkey registration");
    println!("  POST {api_prefix}/register/verify  - Complete passkey registration");
    println!("  POST {api_prefix}/login/options    - Start passkey login");
    println!("  POST {api_prefix}/login/verify     - Complete passkey login");
    println!();
    println!("System endpoints:");
    println!("  GET  /ping - Health check");
    if settings.passkeys.permissive_resolution {
        println!();
        println!("⚠️  Permissive identity resolution is enabled (single-tenant mode)");
    }
}
