use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{OtpCode, PhoneNumber};
use crate::domains::otp::errors::StoreError;

/// One issued OTP: a phone, a code and a validity window.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: Uuid,
    pub phone: PhoneNumber,
    pub code: OtpCode,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub attempts: u32,
}

/// Lifecycle state of a challenge at a given instant.
///
/// `Active` moves to `Consumed` on a successful verification or to `Expired`
/// once the clock passes `expires_at`. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Active,
    Consumed,
    Expired,
}

impl Challenge {
    /// Build a fresh, unconsumed challenge. `issued_at` is truncated to
    /// milliseconds so it survives a round trip through any backend.
    pub fn new(phone: PhoneNumber, code: OtpCode, now: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = now.trunc_subsecs(3);
        Self {
            id: Uuid::now_v7(),
            phone,
            code,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
            attempts: 0,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> ChallengeState {
        if self.consumed {
            ChallengeState::Consumed
        } else if self.expires_at > now {
            ChallengeState::Active
        } else {
            ChallengeState::Expired
        }
    }

    /// Verifiable right now: not consumed and `expires_at` strictly after `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == ChallengeState::Active
    }

    /// Safe to garbage collect.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        !self.is_active(now)
    }

    pub fn matches(&self, phone: &PhoneNumber, code: &OtpCode) -> bool {
        &self.phone == phone && &self.code == code
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ChallengeRow {
    id: Uuid,
    phone: String,
    code: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    consumed: bool,
    attempts: i32,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = StoreError;

    fn try_from(row: ChallengeRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::normalize(&row.phone)
            .ok_or_else(|| StoreError::Corrupt(format!("challenge {} has invalid phone", row.id)))?;
        let code = OtpCode::parse(&row.code)
            .ok_or_else(|| StoreError::Corrupt(format!("challenge {} has invalid code", row.id)))?;
        Ok(Self {
            id: row.id,
            phone,
            code,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            consumed: row.consumed,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
        })
    }
}

impl Challenge {
    /// Insert a new challenge.
    ///
    /// Expired leftovers with the same phone and code are cleared first so
    /// they don't trip the partial unique index; a still-active duplicate
    /// yields `StoreError::Conflict`.
    pub async fn insert(&self, pool: &PgPool) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM otp_challenges
            WHERE phone = $1 AND code = $2 AND consumed = FALSE AND expires_at <= $3
            "#,
        )
        .bind(self.phone.as_str())
        .bind(self.code.as_str())
        .bind(self.issued_at)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO otp_challenges (id, phone, code, issued_at, expires_at, consumed, attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.phone.as_str())
        .bind(self.code.as_str())
        .bind(self.issued_at)
        .bind(self.expires_at)
        .bind(self.consumed)
        .bind(self.attempts as i32)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await?;
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find the active challenge for a phone and code
    pub async fn find_active(
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>, StoreError> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            SELECT id, phone, code, issued_at, expires_at, consumed, attempts
            FROM otp_challenges
            WHERE phone = $1 AND code = $2 AND consumed = FALSE AND expires_at > $3
            ORDER BY issued_at DESC
            LIMIT 1
            "#,
        )
        .bind(phone.as_str())
        .bind(code.as_str())
        .bind(now)
        .fetch_optional(pool)
        .await?;

        row.map(Challenge::try_from).transpose()
    }

    /// Mark the matching active challenge consumed.
    ///
    /// A single conditional UPDATE: concurrent callers serialize on the row
    /// lock and the loser re-evaluates `consumed = FALSE`, so at most one
    /// caller gets `true`.
    pub async fn consume(
        phone: &PhoneNumber,
        code: &OtpCode,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE otp_challenges
            SET consumed = TRUE, consumed_at = $3
            WHERE phone = $1 AND code = $2 AND consumed = FALSE AND expires_at > $3
            "#,
        )
        .bind(phone.as_str())
        .bind(code.as_str())
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Bump `attempts` on every active challenge for the phone; returns the
    /// highest resulting count (0 when there is none).
    pub async fn record_failed_attempt(
        phone: &PhoneNumber,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<u32, StoreError> {
        let counts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_challenges
            SET attempts = attempts + 1
            WHERE phone = $1 AND consumed = FALSE AND expires_at > $2
            RETURNING attempts
            "#,
        )
        .bind(phone.as_str())
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(counts.into_iter().max().map_or(0, |n| n.max(0) as u32))
    }

    /// Burn every active challenge for the phone
    pub async fn revoke_active(
        phone: &PhoneNumber,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE otp_challenges
            SET consumed = TRUE, consumed_at = $2
            WHERE phone = $1 AND consumed = FALSE AND expires_at > $2
            "#,
        )
        .bind(phone.as_str())
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete consumed and expired challenges
    pub async fn purge_stale(now: DateTime<Utc>, pool: &PgPool) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM otp_challenges
            WHERE consumed = TRUE OR expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
