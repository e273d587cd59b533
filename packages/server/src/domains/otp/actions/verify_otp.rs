//! Verify OTP action

use tracing::{error, info, warn};

use crate::domains::otp::errors::OtpError;
use crate::domains::otp::models::{OtpCode, PhoneNumber};
use crate::domains::otp::types::OtpVerified;
use crate::kernel::ServerDeps;

/// Verify a code for a raw phone number and consume the challenge.
///
/// Unknown, expired, already-consumed and locked-out challenges all come back
/// as `NotFoundOrExpired`. Safe to retry: only the first successful consume
/// wins.
pub async fn verify_otp(
    raw_phone: &str,
    raw_code: &str,
    deps: &ServerDeps,
) -> Result<OtpVerified, OtpError> {
    let phone = PhoneNumber::normalize(raw_phone).ok_or(OtpError::InvalidPhone)?;
    let code = OtpCode::parse(raw_code).ok_or(OtpError::InvalidCode)?;
    let now = deps.clock.now();

    if deps.store.consume(&phone, &code, now).await? {
        info!(phone = %phone.fingerprint(), "OTP verified");
        return Ok(OtpVerified {
            phone_number: phone,
        });
    }

    record_failure(&phone, deps).await;
    Err(OtpError::NotFoundOrExpired)
}

/// Count the failed attempt against the phone's open challenges and burn
/// them once the limit is reached. Bookkeeping errors are logged only; the
/// caller's result is already decided.
async fn record_failure(phone: &PhoneNumber, deps: &ServerDeps) {
    let now = deps.clock.now();

    let attempts = match deps.store.record_failed_attempt(phone, now).await {
        Ok(attempts) => attempts,
        Err(e) => {
            error!(phone = %phone.fingerprint(), error = %e, "Failed to record OTP attempt");
            return;
        }
    };

    if attempts == 0 {
        info!(phone = %phone.fingerprint(), "OTP rejected: no active challenge");
        return;
    }

    if attempts < deps.max_verify_attempts {
        info!(phone = %phone.fingerprint(), attempts, "OTP rejected: wrong code");
        return;
    }

    match deps.store.revoke_active(phone, now).await {
        Ok(revoked) => warn!(
            phone = %phone.fingerprint(),
            attempts,
            revoked,
            "Too many failed OTP attempts, active challenges revoked"
        ),
        Err(e) => error!(phone = %phone.fingerprint(), error = %e, "Failed to revoke challenges"),
    }
}
