use serde::Deserialize;

/// Message resource returned by `POST /Accounts/{sid}/Messages.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    pub to: String,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl MessageResponse {
    /// Twilio accepts a message into its queue before delivery. Anything
    /// other than these statuses on the create call means it was refused.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self.status.as_str(),
            "accepted" | "queued" | "sending" | "sent" | "delivered" | "scheduled"
        )
    }
}

/// Error body Twilio returns with 4xx/5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub code: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub more_info: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}
