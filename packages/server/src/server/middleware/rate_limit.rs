// Per-client rate limiting for the OTP endpoints
//
// Keyed by the `ClientIp` extension from `extract_client_ip`. Requests with no
// resolvable address share a single bucket.

use axum::{
    extract::{Extension, Request},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::server::app::AxumAppState;
use crate::server::middleware::ClientIp;

const UNKNOWN_CLIENT: &str = "unknown";

pub async fn rate_limit_middleware(
    Extension(state): Extension<AxumAppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ClientIp>()
        .map(|ClientIp(ip)| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match state.rate_limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            tracing::warn!(client = %key, retry_after_secs, "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "status": "rate_limited" })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
    }
}
