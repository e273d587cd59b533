//! OTP domain result types
//!
//! Returned by the actions; the HTTP adapter serializes them. Neither ever
//! carries the code.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::PhoneNumber;

/// Result of issuing an OTP
#[derive(Debug, Clone, Serialize)]
pub struct OtpIssued {
    pub phone_number: PhoneNumber,
    pub expires_at: DateTime<Utc>,
}

/// Result of verifying an OTP
#[derive(Debug, Clone, Serialize)]
pub struct OtpVerified {
    pub phone_number: PhoneNumber,
}
