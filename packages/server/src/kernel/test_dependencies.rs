// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{BaseChallengeStore, BaseClock, BaseNotifier, InMemoryChallengeStore, ServerDeps};
use crate::domains::otp::errors::{NotifierError, StoreError};
use crate::domains::otp::models::{Challenge, OtpCode, PhoneNumber};

// =============================================================================
// Mock Notifier
// =============================================================================

/// A message the mock notifier was asked to deliver
#[derive(Debug, Clone)]
pub struct SentCode {
    pub phone: PhoneNumber,
    pub code: OtpCode,
}

#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentCode>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with a gateway rejection
    pub fn failing(self, reason: &str) -> Self {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
        self
    }

    /// Get all delivered codes in order
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent code sent to a phone
    pub fn last_code_for(&self, phone: &PhoneNumber) -> Option<OtpCode> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| &s.phone == phone)
            .map(|s| s.code.clone())
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send(&self, phone: &PhoneNumber, code: &OtpCode) -> Result<(), NotifierError> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(NotifierError::Rejected(reason));
        }
        self.sent.lock().unwrap().push(SentCode {
            phone: phone.clone(),
            code: code.clone(),
        });
        Ok(())
    }
}

// =============================================================================
// Manual Clock
// =============================================================================

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl BaseClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Unavailable Store
// =============================================================================

/// Store whose backend is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn down<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl BaseChallengeStore for UnavailableStore {
    async fn insert(&self, _challenge: &Challenge) -> Result<(), StoreError> {
        Self::down()
    }

    async fn find_active(
        &self,
        _phone: &PhoneNumber,
        _code: &OtpCode,
        _now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StoreError> {
        Self::down()
    }

    async fn consume(
        &self,
        _phone: &PhoneNumber,
        _code: &OtpCode,
        _now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Self::down()
    }

    async fn record_failed_attempt(
        &self,
        _phone: &PhoneNumber,
        _now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        Self::down()
    }

    async fn revoke_active(
        &self,
        _phone: &PhoneNumber,
        _now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Self::down()
    }

    async fn purge_stale(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
        Self::down()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Self::down()
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Handles to the doubles behind a test `ServerDeps`
#[derive(Clone)]
pub struct TestDependencies {
    pub store: InMemoryChallengeStore,
    pub notifier: MockNotifier,
    pub clock: ManualClock,
}

impl TestDependencies {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            store: InMemoryChallengeStore::new(),
            notifier: MockNotifier::new(),
            clock: ManualClock::new(start),
        }
    }

    pub fn with_notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Build ServerDeps over these doubles (5 minute TTL, 5 attempts)
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            Arc::new(self.store.clone()),
            Arc::new(self.notifier.clone()),
            Duration::seconds(300),
            5,
        )
        .with_clock(Arc::new(self.clock.clone()))
    }
}
