//! Challenge store backends.
//!
//! - `PostgresChallengeStore`: production, SQL lives in `Challenge` (models/)
//! - `InMemoryChallengeStore`: `memory://` for local development and tests
//!
//! `connect_store` picks one from `STORE_URI`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::domains::otp::errors::StoreError;
use crate::domains::otp::models::{Challenge, OtpCode, PhoneNumber};
use crate::kernel::BaseChallengeStore;

// =============================================================================
// PostgreSQL
// =============================================================================

/// Wrapper around a PgPool that implements BaseChallengeStore
#[derive(Clone)]
pub struct PostgresChallengeStore(pub PgPool);

impl PostgresChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.0)
            .await
            .context("Failed to run migrations")
    }
}

#[async_trait]
impl BaseChallengeStore for PostgresChallengeStore {
    async fn insert(&self, challenge: &Challenge) -> Result<(), StoreError> {
        challenge.insert(&self.0).await
    }

    async fn find_active(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StoreError> {
        Challenge::find_active(phone, code, now, &self.0).await
    }

    async fn consume(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Challenge::consume(phone, code, now, &self.0).await
    }

    async fn record_failed_attempt(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        Challenge::record_failed_attempt(phone, now, &self.0).await
    }

    async fn revoke_active(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Challenge::revoke_active(phone, now, &self.0).await
    }

    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Challenge::purge_stale(now, &self.0).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.0).await?;
        Ok(())
    }

    async fn close(&self) {
        self.0.close().await;
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store. Every operation holds the mutex for its whole
/// duration, which makes `consume` linearizable.
#[derive(Clone, Default)]
pub struct InMemoryChallengeStore {
    challenges: Arc<Mutex<Vec<Challenge>>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored challenge, stale ones included
    pub async fn all(&self) -> Vec<Challenge> {
        self.challenges.lock().await.clone()
    }

    /// All challenges for a phone, oldest first
    pub async fn for_phone(&self, phone: &PhoneNumber) -> Vec<Challenge> {
        self.challenges
            .lock()
            .await
            .iter()
            .filter(|c| &c.phone == phone)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BaseChallengeStore for InMemoryChallengeStore {
    async fn insert(&self, challenge: &Challenge) -> Result<(), StoreError> {
        let mut challenges = self.challenges.lock().await;
        let now = challenge.issued_at;

        if challenges
            .iter()
            .any(|c| c.matches(&challenge.phone, &challenge.code) && c.is_active(now))
        {
            return Err(StoreError::Conflict);
        }

        // Same cleanup the SQL backend does before its insert
        challenges.retain(|c| {
            !(c.matches(&challenge.phone, &challenge.code) && !c.consumed && c.expires_at <= now)
        });
        challenges.push(challenge.clone());
        Ok(())
    }

    async fn find_active(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StoreError> {
        let challenges = self.challenges.lock().await;
        Ok(challenges
            .iter()
            .rev()
            .find(|c| c.matches(phone, code) && c.is_active(now))
            .cloned())
    }

    async fn consume(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut challenges = self.challenges.lock().await;
        match challenges
            .iter_mut()
            .find(|c| c.matches(phone, code) && c.is_active(now))
        {
            Some(challenge) => {
                challenge.consumed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_failed_attempt(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let mut challenges = self.challenges.lock().await;
        let mut highest = 0;
        for challenge in challenges
            .iter_mut()
            .filter(|c| &c.phone == phone && c.is_active(now))
        {
            challenge.attempts += 1;
            highest = highest.max(challenge.attempts);
        }
        Ok(highest)
    }

    async fn revoke_active(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut challenges = self.challenges.lock().await;
        let mut revoked = 0;
        for challenge in challenges
            .iter_mut()
            .filter(|c| &c.phone == phone && c.is_active(now))
        {
            challenge.consumed = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|c| !c.is_stale(now));
        Ok((before - challenges.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Connect to the store named by `uri`, apply migrations and verify it answers.
pub async fn connect_store(uri: &str, max_connections: u32) -> Result<Arc<dyn BaseChallengeStore>> {
    if uri.starts_with("memory://") {
        info!("Using in-memory challenge store (state is lost on restart)");
        return Ok(Arc::new(InMemoryChallengeStore::new()));
    }

    if !(uri.starts_with("postgres://") || uri.starts_with("postgresql://")) {
        bail!("Unsupported STORE_URI scheme (expected postgres:// or memory://)");
    }

    info!("Connecting to challenge store...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(uri)
        .await
        .context("Failed to connect to challenge store")?;

    let store = PostgresChallengeStore::new(pool);
    info!("Running database migrations...");
    store.migrate().await?;
    store
        .ping()
        .await
        .context("Challenge store did not answer ping")?;
    info!("Challenge store ready");

    Ok(Arc::new(store))
}
