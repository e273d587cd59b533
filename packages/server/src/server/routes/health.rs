use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AxumAppState;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    store: &'static str,
}

/// Health check endpoint
///
/// Pings the challenge store. Returns 200 OK when it answers within the
/// timeout, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(state): Extension<AxumAppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match tokio::time::timeout(PING_TIMEOUT, state.deps.store.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check: store ping failed");
            false
        }
        Err(_) => {
            tracing::warn!("Health check: store ping timed out");
            false
        }
    };

    if store_ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                store: "ok",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                store: "error",
            }),
        )
    }
}
