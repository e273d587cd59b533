//! OTP endpoints.
//!
//! Each handler decodes the body, calls one action and maps the outcome to a
//! status and JSON body. Every verification failure is the same 401.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::json;

use crate::domains::otp::{issue_otp, verify_otp, OtpError};
use crate::server::app::AxumAppState;

#[derive(Debug, Deserialize)]
pub struct RequestOtpBody {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpBody {
    pub phone_number: String,
    pub otp: String,
}

/// POST /v1/request-otp
pub async fn request_otp_handler(
    Extension(state): Extension<AxumAppState>,
    body: Result<Json<RequestOtpBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_request(rejection),
    };

    match issue_otp(&body.phone_number, &state.deps).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(json!({
                "status": "issued",
                "phone_number": issued.phone_number,
                "expires_at": issued.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            })),
        )
            .into_response(),
        Err(e) => otp_error_response(e),
    }
}

/// POST /v1/verify-otp
pub async fn verify_otp_handler(
    Extension(state): Extension<AxumAppState>,
    body: Result<Json<VerifyOtpBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_request(rejection),
    };

    match verify_otp(&body.phone_number, &body.otp, &state.deps).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "verified" }))).into_response(),
        Err(e) => otp_error_response(e),
    }
}

fn invalid_request(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": "invalid_request",
            "message": rejection.body_text(),
        })),
    )
        .into_response()
}

/// Map a service error to its HTTP status and body
pub fn otp_error_response(err: OtpError) -> Response {
    let (status, label) = match &err {
        OtpError::InvalidPhone => (StatusCode::BAD_REQUEST, "invalid_phone"),
        OtpError::InvalidCode => (StatusCode::BAD_REQUEST, "invalid_code"),
        OtpError::NotFoundOrExpired => (StatusCode::UNAUTHORIZED, "rejected"),
        OtpError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "delivery_failed"),
        OtpError::StoreUnavailable(e) => {
            tracing::error!(error = %e, "Challenge store unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
        }
    };

    (status, Json(json!({ "status": label }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::otp::{NotifierError, StoreError};

    #[test]
    fn test_error_statuses() {
        let cases = [
            (OtpError::InvalidPhone, StatusCode::BAD_REQUEST),
            (OtpError::InvalidCode, StatusCode::BAD_REQUEST),
            (OtpError::NotFoundOrExpired, StatusCode::UNAUTHORIZED),
            (
                OtpError::DeliveryFailed(NotifierError::Rejected("blocked".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                OtpError::StoreUnavailable(StoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(otp_error_response(err).status(), expected);
        }
    }
}
