//! OpenID Connect 1.0 / OAuth 2.0 authorization server HTTP surface (§6).
//!
//! This crate wires every `auth-oauth` operation to its `axum` route; it
//! contains no protocol logic of its own.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assembles the full router: §6's endpoint table plus the ambient
/// `/health` and `/metrics` surfaces, with tracing/CORS/timing layered on.
pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/.well-known/openid-configuration", get(handlers::discovery::openid_configuration))
        .route("/.well-known/jwks.json", get(handlers::discovery::jwks))
        .route("/authorize", get(handlers::authorize::authorize).post(handlers::authorize::authorize))
        .route("/as/par", post(handlers::par::par))
        .route("/token", post(handlers::token::token))
        .route("/userinfo", get(handlers::userinfo::userinfo).post(handlers::userinfo::userinfo))
        .route("/introspect", post(handlers::introspect::introspect))
        .route("/revoke", post(handlers::revoke::revoke))
        .route("/register", post(handlers::register::register))
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer())
                .layer(axum::middleware::from_fn(middleware::request_timing_middleware)),
        )
        .with_state(state)
}
