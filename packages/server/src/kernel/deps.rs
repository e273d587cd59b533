//! Server dependencies (using traits for testability)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;
use twilio::{TwilioError, TwilioService};

use crate::domains::otp::errors::NotifierError;
use crate::domains::otp::models::{OtpCode, PhoneNumber};
use crate::kernel::{BaseChallengeStore, BaseClock, BaseNotifier, SystemClock};

// =============================================================================
// TwilioService Adapter (implements BaseNotifier trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseNotifier
pub struct TwilioAdapter {
    service: Arc<TwilioService>,
    ttl_minutes: i64,
}

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>, ttl: Duration) -> Self {
        Self {
            service,
            // Round up so the message never understates the window
            ttl_minutes: ((ttl.num_seconds() + 59) / 60).max(1),
        }
    }

    pub fn message_body(&self, code: &OtpCode) -> String {
        format!(
            "Your verification code is {}. It expires in {} minute{}.",
            code.as_str(),
            self.ttl_minutes,
            if self.ttl_minutes == 1 { "" } else { "s" }
        )
    }
}

#[async_trait]
impl BaseNotifier for TwilioAdapter {
    async fn send(&self, phone: &PhoneNumber, code: &OtpCode) -> Result<(), NotifierError> {
        let message = self
            .service
            .send_sms(phone.as_str(), &self.message_body(code))
            .await
            .map_err(|e| match e {
                TwilioError::Transport(_) => NotifierError::Transport(e.to_string()),
                other => NotifierError::Rejected(other.to_string()),
            })?;

        debug!(phone = %phone.fingerprint(), sid = %message.sid, status = %message.status, "SMS queued");
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Everything the OTP actions need. Built once at startup and shared by
/// reference with every request; holds no per-request mutable state.
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseChallengeStore>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub clock: Arc<dyn BaseClock>,
    /// Validity window of an issued code
    pub otp_ttl: Duration,
    /// Failed verifications per phone before its open challenges are revoked
    pub max_verify_attempts: u32,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseChallengeStore>,
        notifier: Arc<dyn BaseNotifier>,
        otp_ttl: Duration,
        max_verify_attempts: u32,
    ) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            otp_ttl,
            max_verify_attempts,
        }
    }

    /// Swap the clock (tests drive time by hand)
    pub fn with_clock(mut self, clock: Arc<dyn BaseClock>) -> Self {
        self.clock = clock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilio::TwilioOptions;

    fn adapter(ttl: Duration) -> TwilioAdapter {
        let service = TwilioService::new(TwilioOptions {
            account_sid: "AC_test".to_string(),
            auth_token: "secret".to_string(),
            from: "+15005550006".to_string(),
        });
        TwilioAdapter::new(Arc::new(service), ttl)
    }

    #[test]
    fn test_message_body_contains_code_and_ttl() {
        let body = adapter(Duration::seconds(300)).message_body(&OtpCode::parse("012345").unwrap());
        assert_eq!(body, "Your verification code is 012345. It expires in 5 minutes.");
    }

    #[test]
    fn test_message_body_singular_minute() {
        let body = adapter(Duration::seconds(30)).message_body(&OtpCode::parse("999999").unwrap());
        assert!(body.ends_with("expires in 1 minute."));
    }

    #[test]
    fn test_message_body_rounds_partial_minutes_up() {
        let body = adapter(Duration::seconds(90)).message_body(&OtpCode::parse("123456").unwrap());
        assert!(body.ends_with("expires in 2 minutes."));

        let body = adapter(Duration::seconds(120)).message_body(&OtpCode::parse("123456").unwrap());
        assert!(body.ends_with("expires in 2 minutes."));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_maps_to_transport() {
        let service = TwilioService::new(TwilioOptions {
            account_sid: "AC_test".to_string(),
            auth_token: "secret".to_string(),
            from: "+15005550006".to_string(),
        })
        .with_base_url("http://127.0.0.1:9");
        let adapter = TwilioAdapter::new(Arc::new(service), Duration::seconds(300));

        let err = adapter
            .send(
                &PhoneNumber::normalize("0712345678").unwrap(),
                &OtpCode::parse("123456").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Transport(_)));
    }
}
