//! User directory contract and in-process implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::model::{normalize_address, Account, UserStats};
use crate::auth::StoreError;
use crate::clock::Clock;

/// Login history collaborator
///
/// `record_login` is an idempotent upsert: the first login creates the
/// account, later logins only move `last_login_at`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn record_login(&self, address: &str) -> Result<Account, StoreError>;

    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError>;

    async fn stats(&self) -> Result<UserStats, StoreError>;
}

/// Start of the UTC day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

pub struct InMemoryUserDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryUserDirectory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn record_login(&self, address: &str) -> Result<Account, StoreError> {
        let address = normalize_address(address);
        let now = self.clock.now();
        let mut accounts = self.accounts.write().await;

        let account = accounts
            .entry(address.clone())
            .and_modify(|account| account.last_login_at = now)
            .or_insert_with(|| Account {
                address,
                created_at: now,
                last_login_at: now,
            });

        Ok(account.clone())
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&normalize_address(address)).cloned())
    }

    async fn stats(&self) -> Result<UserStats, StoreError> {
        let since = start_of_day(self.clock.now());
        let accounts = self.accounts.read().await;

        Ok(UserStats {
            total_users: accounts.len() as u64,
            active_today: accounts
                .values()
                .filter(|a| a.last_login_at >= since)
                .count() as u64,
        })
    }
}
