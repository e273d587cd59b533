// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The OTP lifecycle rules live in domains/otp/actions and only talk to these.
//
// Naming convention: Base* for trait names (e.g., BaseChallengeStore, BaseNotifier)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domains::otp::errors::{NotifierError, StoreError};
use crate::domains::otp::models::{Challenge, OtpCode, PhoneNumber};

// =============================================================================
// Challenge Store Trait (Infrastructure - durable OTP state)
// =============================================================================

/// Persistence of OTP challenges.
///
/// Every time predicate takes `now` from the caller so the store and the
/// service share one clock.
#[async_trait]
pub trait BaseChallengeStore: Send + Sync {
    /// Persist a new challenge. Fails with `StoreError::Conflict` if an active
    /// challenge with the same phone and code already exists.
    async fn insert(&self, challenge: &Challenge) -> Result<(), StoreError>;

    /// The challenge matching phone and code with `expires_at > now` and not
    /// consumed, if any.
    async fn find_active(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StoreError>;

    /// Atomically mark the matching active challenge consumed. Returns true
    /// iff this call performed the transition; linearizable across callers.
    async fn consume(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Increment `attempts` on all active challenges for the phone and return
    /// the highest resulting count (0 if none are active).
    async fn record_failed_attempt(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// Mark every active challenge for the phone consumed. Returns how many.
    async fn revoke_active(&self, phone: &PhoneNumber, now: DateTime<Utc>)
        -> Result<u64, StoreError>;

    /// Delete challenges that are consumed or expired at `now`.
    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release backend resources (connection pool) on shutdown
    async fn close(&self) {}
}

// =============================================================================
// Notifier Trait (Infrastructure - SMS delivery)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Deliver the code to the phone out-of-band. An `Err` means delivery
    /// definitely did not start.
    async fn send(&self, phone: &PhoneNumber, code: &OtpCode) -> Result<(), NotifierError>;
}

// =============================================================================
// Clock Trait (Infrastructure - wall clock)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real UTC wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Rate Limiter Trait (Infrastructure - HTTP adapter only)
// =============================================================================

/// Request admission by an opaque key (client IP at the HTTP layer).
///
/// `Err` carries the number of seconds the caller should wait.
pub trait BaseRateLimiter: Send + Sync {
    fn check(&self, key: &str) -> Result<(), u64>;
}
