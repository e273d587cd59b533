use async_trait::async_trait;
use tracing::{info, warn};

use crate::domains::otp::errors::NotifierError;
use crate::domains::otp::models::{OtpCode, PhoneNumber};
use crate::kernel::BaseNotifier;

/// Notifier that writes to the log instead of sending an SMS.
///
/// Debug builds print the code so a developer can complete the flow by hand.
/// Release builds never do.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        if !cfg!(debug_assertions) {
            warn!("LogNotifier in use: codes will not be delivered to phones");
        }
        Self
    }
}

#[async_trait]
impl BaseNotifier for LogNotifier {
    async fn send(&self, phone: &PhoneNumber, code: &OtpCode) -> Result<(), NotifierError> {
        if cfg!(debug_assertions) {
            info!(phone = %phone.fingerprint(), code = %code.as_str(), "OTP (development, not sent)");
        } else {
            info!(phone = %phone.fingerprint(), code = "******", "OTP (not sent)");
        }
        Ok(())
    }
}
