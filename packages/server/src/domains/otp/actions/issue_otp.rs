//! Issue OTP action

use tracing::{info, warn};

use crate::domains::otp::errors::{OtpError, StoreError};
use crate::domains::otp::models::{Challenge, OtpCode, PhoneNumber};
use crate::domains::otp::types::OtpIssued;
use crate::kernel::ServerDeps;

/// How many fresh codes to try when the generated one collides with an
/// active challenge for the same phone.
const MAX_CODE_COLLISIONS: usize = 3;

/// Issue a new OTP for a raw, user-entered phone number.
///
/// Validation happens before any store or notifier call. A notifier failure
/// is reported but the persisted challenge is left in place; it simply
/// expires unused.
pub async fn issue_otp(raw_phone: &str, deps: &ServerDeps) -> Result<OtpIssued, OtpError> {
    let phone = PhoneNumber::normalize(raw_phone).ok_or(OtpError::InvalidPhone)?;

    let challenge = persist_new_challenge(&phone, deps).await?;

    if let Err(e) = deps.notifier.send(&phone, &challenge.code).await {
        warn!(phone = %phone.fingerprint(), error = %e, "OTP delivery failed");
        return Err(OtpError::DeliveryFailed(e));
    }

    info!(
        phone = %phone.fingerprint(),
        challenge_id = %challenge.id,
        expires_at = %challenge.expires_at,
        "OTP issued"
    );

    Ok(OtpIssued {
        phone_number: phone,
        expires_at: challenge.expires_at,
    })
}

async fn persist_new_challenge(
    phone: &PhoneNumber,
    deps: &ServerDeps,
) -> Result<Challenge, OtpError> {
    for _ in 0..MAX_CODE_COLLISIONS {
        let challenge = Challenge::new(
            phone.clone(),
            OtpCode::generate(),
            deps.clock.now(),
            deps.otp_ttl,
        );

        match deps.store.insert(&challenge).await {
            Ok(()) => return Ok(challenge),
            Err(StoreError::Conflict) => {
                warn!(phone = %phone.fingerprint(), "Generated code collided with an active challenge, retrying");
            }
            Err(e) => {
                warn!(phone = %phone.fingerprint(), error = %e, "Failed to persist challenge");
                return Err(OtpError::StoreUnavailable(e));
            }
        }
    }

    Err(OtpError::StoreUnavailable(StoreError::Conflict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockNotifier, UnavailableStore};
    use crate::kernel::{BaseChallengeStore, BaseClock, TestDependencies};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_issue_persists_and_notifies() {
        let test_deps = TestDependencies::new(start());
        let deps = test_deps.server_deps();

        let issued = issue_otp("0712345678", &deps).await.unwrap();

        assert_eq!(issued.phone_number.as_str(), "+254712345678");
        assert_eq!(issued.expires_at, start() + Duration::seconds(300));

        let stored = test_deps.store.all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].phone.as_str(), "+254712345678");
        assert!(!stored[0].consumed);
        assert_eq!(stored[0].expires_at - stored[0].issued_at, Duration::seconds(300));

        let sent = test_deps.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].code, stored[0].code);
    }

    #[tokio::test]
    async fn test_invalid_phone_touches_nothing() {
        let test_deps = TestDependencies::new(start());
        let deps = test_deps.server_deps();

        let err = issue_otp("0123456789", &deps).await.unwrap_err();

        assert!(matches!(err, OtpError::InvalidPhone));
        assert!(test_deps.store.all().await.is_empty());
        assert!(test_deps.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_challenge() {
        let test_deps =
            TestDependencies::new(start()).with_notifier(MockNotifier::new().failing("gateway down"));
        let deps = test_deps.server_deps();

        let err = issue_otp("+254712345678", &deps).await.unwrap_err();

        assert!(matches!(err, OtpError::DeliveryFailed(_)));
        assert_eq!(test_deps.store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_skips_notifier() {
        let notifier = MockNotifier::new();
        let deps = ServerDeps::new(
            Arc::new(UnavailableStore),
            Arc::new(notifier.clone()),
            Duration::seconds(300),
            5,
        );

        let err = issue_otp("0712345678", &deps).await.unwrap_err();

        assert!(matches!(err, OtpError::StoreUnavailable(_)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_two_issues_give_two_active_challenges() {
        let test_deps = TestDependencies::new(start());
        let deps = test_deps.server_deps();

        issue_otp("0712345678", &deps).await.unwrap();
        issue_otp("0712345678", &deps).await.unwrap();

        let phone = PhoneNumber::normalize("0712345678").unwrap();
        let now = test_deps.clock.now();
        for sent in test_deps.notifier.sent() {
            assert!(test_deps
                .store
                .find_active(&phone, &sent.code, now)
                .await
                .unwrap()
                .is_some());
        }
    }
}
