// Minimal Twilio Programmable Messaging client.
// https://www.twilio.com/docs/messaging/api/message-resource#create-a-message-resource

use std::collections::HashMap;

pub mod models;
use reqwest::Client;
use thiserror::Error;

use crate::models::{ErrorResponse, MessageResponse};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number (E.164) or messaging service SID (`MG...`).
    pub from: String,
}

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("request to Twilio failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Twilio returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Twilio refused message {sid} with status {status}")]
    Refused { sid: String, status: String },
}

impl TwilioError {
    /// True when the failure happened before Twilio gave an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, TwilioError::Transport(_))
    }
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
    base_url: String,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API host (used against local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{base}/2010-04-01/Accounts/{sid}/Messages.json",
            base = self.base_url,
            sid = self.options.account_sid
        )
    }

    fn form_body<'a>(&'a self, recipient: &'a str, body: &'a str) -> HashMap<&'static str, &'a str> {
        let mut form_body = HashMap::new();
        form_body.insert("To", recipient);
        // Messaging service SIDs go in a different field than plain numbers
        if self.options.from.starts_with("MG") {
            form_body.insert("MessagingServiceSid", self.options.from.as_str());
        } else {
            form_body.insert("From", self.options.from.as_str());
        }
        form_body.insert("Body", body);
        form_body
    }

    /// Queue an SMS for delivery. Returns once Twilio has accepted the message.
    pub async fn send_sms(&self, recipient: &str, body: &str) -> Result<MessageResponse, TwilioError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&self.form_body(recipient, body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&raw)
                .map(|e| match e.code {
                    Some(code) => format!("{} (code {})", e.message, code),
                    None => e.message,
                })
                .unwrap_or(raw);
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message = response.json::<MessageResponse>().await?;
        if !message.is_accepted() {
            return Err(TwilioError::Refused {
                sid: message.sid,
                status: message.status,
            });
        }

        Ok(message)
    }
}
