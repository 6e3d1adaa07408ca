//! Exercises the router assembled by `create_app` directly (no bound
//! socket): discovery/JWKS are the one §6 surface with no request body and
//! no client registration prerequisite, making them the cheapest way to
//! confirm the whole state-bootstrap-to-response path is wired correctly.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use clap::Parser;
use http_body_util::BodyExt;
use idp_server::config::{Args, ServerConfig};
use idp_server::state::AppState;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let args = Args::parse_from(["idp-server", "--issuer", "https://as.example"]);
    let config = ServerConfig::try_from(&args).expect("valid default args");
    let (_recorder, handle) = PrometheusBuilder::new()
        .build()
        .expect("prometheus recorder builds without a global install");
    let state = AppState::bootstrap(config, handle).expect("bootstrap with default config");
    idp_server::create_app(state)
}

#[tokio::test]
async fn discovery_document_reflects_the_bootstrapped_profile() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/openid-configuration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(document["issuer"], "https://as.example");
    assert!(document["jwks_uri"]
        .as_str()
        .unwrap()
        .ends_with("/.well-known/jwks.json"));
    assert_eq!(document["code_challenge_methods_supported"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn jwks_endpoint_publishes_the_bootstrapped_signing_key() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/jwks.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(document["keys"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_endpoint_reports_up() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
