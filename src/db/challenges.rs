//! Postgres-backed challenge store

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{generate_nonce, Challenge, ChallengeStats, ChallengeStore, ConsumeOutcome, StoreError};
use crate::clock::Clock;

/// Challenge store over the `auth_nonces` table
///
/// Consumption is a single conditional `UPDATE`, so Postgres row locking
/// guarantees one winner among concurrent consumers of the same nonce.
#[derive(Clone)]
pub struct PgChallengeStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PgChallengeStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { pool, clock, ttl }
    }
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    async fn create(&self) -> Result<Challenge, StoreError> {
        let challenge = Challenge {
            value: generate_nonce(),
            created_at: self.clock.now(),
            consumed: false,
        };

        sqlx::query(
            r#"
            INSERT INTO auth_nonces (nonce, created_at, used)
            VALUES ($1, $2, FALSE)
            "#,
        )
        .bind(&challenge.value)
        .bind(challenge.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Collision,
            _ => StoreError::from(e),
        })?;

        Ok(challenge)
    }

    async fn consume(&self, value: &str) -> Result<ConsumeOutcome, StoreError> {
        let now = self.clock.now();

        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE auth_nonces
            SET used = TRUE, used_at = $2
            WHERE nonce = $1 AND used = FALSE
            RETURNING created_at
            "#,
        )
        .bind(value)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(created_at) = created_at {
            if now - created_at > self.ttl {
                return Ok(ConsumeOutcome::Expired);
            }
            return Ok(ConsumeOutcome::Consumed);
        }

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM auth_nonces WHERE nonce = $1)
            "#,
        )
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists {
            ConsumeOutcome::AlreadyUsed
        } else {
            ConsumeOutcome::NotFound
        })
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        // A TTL reaching before the representable range keeps every unused row
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM auth_nonces
            WHERE used = TRUE OR created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn stats(&self) -> Result<ChallengeStats, StoreError> {
        let (active, used): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE used = FALSE),
                COUNT(*) FILTER (WHERE used = TRUE)
            FROM auth_nonces
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ChallengeStats {
            active_nonces: active.max(0) as u64,
            used_nonces: used.max(0) as u64,
        })
    }
}
