// End-to-end tests of the HTTP surface with the mock ceremony engine
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use passkey_rp::configure_services;
use passkey_rp::testing::constants::{OTHER_EMAIL, TEST_EMAIL};
use passkey_rp::testing::fixtures::{login_verify_body, mock_service, register_verify_body};
use passkey_rp::testing::MockCeremonyEngine;

macro_rules! app {
    ($service:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($service))
                .configure(|cfg| configure_services::<MockCeremonyEngine>(cfg, "/api")),
        )
        .await
    };
}

macro_rules! post {
    ($app:expr, $path:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri($path)
            .set_json($body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn test_health_check() {
    let app = app!(mock_service(&[]));
    let req = test::TestRequest::get().uri("/ping").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "pong");
}

#[actix_web::test]
async fn test_allow_list_scenario() {
    let app = app!(mock_service(&[TEST_EMAIL]));

    let (status, body) = post!(app, "/api/register/options", json!({ "email": OTHER_EMAIL }));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains(OTHER_EMAIL));

    let (status, first) = post!(app, "/api/register/options", json!({ "email": TEST_EMAIL }));
    assert_eq!(status, StatusCode::OK);
    let (status, second) = post!(app, "/api/register/options", json!({ "email": TEST_EMAIL }));
    assert_eq!(status, StatusCode::OK);

    let c1 = first["challenge"].as_str().unwrap();
    let c2 = second["challenge"].as_str().unwrap();
    assert_ne!(c1, c2);

    // C1 is no longer consumable
    let (status, _) = post!(
        app,
        "/api/register/verify",
        register_verify_body(TEST_EMAIL, b"cred-1", c1)
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_registration_options_shape() {
    let app = app!(mock_service(&[]));
    let (status, body) = post!(app, "/api/register/options", json!({ "email": TEST_EMAIL }));

    assert_eq!(status, StatusCode::OK);
    assert!(!body["challenge"].as_str().unwrap().is_empty());
    assert_eq!(body["rp"]["id"], "localhost");
    assert_eq!(body["user"]["name"], TEST_EMAIL);
    assert_eq!(body["user"]["displayName"], TEST_EMAIL);
    assert_eq!(body["pubKeyCredParams"][0]["type"], "public-key");
    assert_eq!(body["timeout"], 60_000);
    assert_eq!(body["attestation"], "none");
    assert!(body["authenticatorSelection"].is_object());
}

#[actix_web::test]
async fn test_invalid_requests_are_bad_request() {
    let app = app!(mock_service(&[]));

    let (status, body) = post!(app, "/api/register/options", json!({ "email": "" }));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = post!(app, "/api/register/options", json!({ "mail": TEST_EMAIL }));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("invalid request"));

    let (status, _) = post!(
        app,
        "/api/register/verify",
        json!({ "email": TEST_EMAIL, "attestationResponse": "not-an-object" })
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_login_without_users() {
    let app = app!(mock_service(&[]));
    let req = test::TestRequest::post()
        .uri("/api/login/options")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "message": "no registered users" }));
}

#[actix_web::test]
async fn test_full_ceremony_round_trip() {
    let app = app!(mock_service(&[TEST_EMAIL]));

    let (_, options) = post!(app, "/api/register/options", json!({ "email": TEST_EMAIL }));
    let challenge = options["challenge"].as_str().unwrap();
    let (status, body) = post!(
        app,
        "/api/register/verify",
        register_verify_body(TEST_EMAIL, b"cred-a", challenge)
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Second submission of the same attestation finds no session
    let (status, _) = post!(
        app,
        "/api/register/verify",
        register_verify_body(TEST_EMAIL, b"cred-a", challenge)
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, options) = post!(app, "/api/login/options", json!({}));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(options["allowCredentials"], json!([]));
    assert_eq!(options["rpId"], "localhost");
    assert_eq!(options["userVerification"], "preferred");
    let challenge = options["challenge"].as_str().unwrap();

    let (status, body) = post!(
        app,
        "/api/login/verify",
        login_verify_body(b"cred-a", challenge, 1)
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["email"], TEST_EMAIL);
    assert_eq!(body["displayName"], TEST_EMAIL);

    let (status, _) = post!(app, "/api/login/verify", login_verify_body(b"cred-a", challenge, 2));
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_login_verify_without_options() {
    let app = app!(mock_service(&[]));
    let (status, body) = post!(app, "/api/login/verify", login_verify_body(b"cred-a", "c", 1));

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("no pending"));
}
