//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::{BaseRateLimiter, ServerDeps};
use crate::server::middleware::{extract_client_ip, rate_limit_middleware};
use crate::server::routes::{health_handler, request_otp_handler, verify_otp_handler};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: Arc<ServerDeps>,
    pub rate_limiter: Arc<dyn BaseRateLimiter>,
    /// Whether `extract_client_ip` may believe X-Forwarded-For / X-Real-IP
    pub trust_proxy_headers: bool,
}

/// Build the Axum application router
///
/// The OTP endpoints sit behind the per-IP rate limiter; `/health` does not.
pub fn build_app(
    deps: Arc<ServerDeps>,
    rate_limiter: Arc<dyn BaseRateLimiter>,
    request_timeout: Duration,
    trust_proxy_headers: bool,
) -> Router {
    let app_state = AxumAppState {
        deps,
        rate_limiter,
        trust_proxy_headers,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let otp_routes = Router::new()
        .route("/v1/request-otp", post(request_otp_handler))
        .route("/v1/verify-otp", post(verify_otp_handler))
        .route_layer(middleware::from_fn(rate_limit_middleware));

    Router::new()
        .merge(otp_routes)
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state)) // Must wrap every middleware that reads it
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
