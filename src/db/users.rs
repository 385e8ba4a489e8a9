//! Postgres-backed user directory

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::StoreError;
use crate::clock::Clock;
use crate::users::{normalize_address, start_of_day, Account, UserDirectory, UserStats};

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn record_login(&self, address: &str) -> Result<Account, StoreError> {
        let account = sqlx::query_as(
            r#"
            INSERT INTO users (address, created_at, last_login_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (address) DO UPDATE SET last_login_at = EXCLUDED.last_login_at
            RETURNING address, created_at, last_login_at
            "#,
        )
        .bind(normalize_address(address))
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as(
            r#"
            SELECT address, created_at, last_login_at
            FROM users
            WHERE address = $1
            "#,
        )
        .bind(normalize_address(address))
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn stats(&self) -> Result<UserStats, StoreError> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE last_login_at >= $1)
            FROM users
            "#,
        )
        .bind(start_of_day(self.clock.now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStats {
            total_users: total.max(0) as u64,
            active_today: active.max(0) as u64,
        })
    }
}
