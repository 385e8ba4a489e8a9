//! Account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account record keyed by lower-cased address
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Login counters
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total_users: u64,
    /// Accounts that logged in since UTC midnight
    pub active_today: u64,
}

/// Normalize an account address for storage and lookup
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
