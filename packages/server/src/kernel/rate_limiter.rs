//! Rate limiter implementations for the HTTP adapter.
//!
//! The OTP core never sees these; the middleware in server/middleware
//! calls `BaseRateLimiter::check` with the client IP.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};

use crate::kernel::BaseRateLimiter;

/// Shrink the state store every N checks so idle keys don't accumulate.
const SHRINK_INTERVAL: u64 = 1000;

type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock, NoOpMiddleware>;

/// GCRA limiter keyed by an arbitrary string.
#[derive(Clone)]
pub struct KeyedRateLimiter {
    limiter: Arc<KeyedLimiter>,
    checks: Arc<AtomicU64>,
}

impl KeyedRateLimiter {
    /// Allow `per_minute` requests per key per minute, bursting up to the
    /// same amount.
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl BaseRateLimiter for KeyedRateLimiter {
    fn check(&self, key: &str) -> Result<(), u64> {
        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count % SHRINK_INTERVAL == 0 && count > 0 {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(Clock::now(&DefaultClock::default()));
                Err(wait.as_secs().max(1))
            }
        }
    }
}

/// Admits everything. Used when `RATE_LIMIT_PER_MINUTE=0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRateLimiter;

impl BaseRateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> Result<(), u64> {
        Ok(())
    }
}

/// Build the limiter for a configured quota (0 disables limiting)
pub fn create_rate_limiter(per_minute: u32) -> Arc<dyn BaseRateLimiter> {
    match NonZeroU32::new(per_minute) {
        Some(quota) => Arc::new(KeyedRateLimiter::per_minute(quota)),
        None => Arc::new(NoopRateLimiter),
    }
}
