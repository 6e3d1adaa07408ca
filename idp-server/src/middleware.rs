use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Request timing, logged structurally so it lands in the same sink as
/// every other `tracing` event (§5 ambient logging).
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let elapsed = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = elapsed.as_millis(),
        status = response.status().as_u16(),
        "request processed"
    );

    response
}

/// Permissive CORS: every endpoint here is meant to be called from an
/// arbitrary relying party's browser-side code (§4.8, §4.12), and none of
/// them rely on cookies for cross-origin authorization — the one cookie
/// this binary sets (`idp_session`) is only read back same-origin from
/// `/authorize`.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("dpop"),
        ])
}
