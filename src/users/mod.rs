//! Account directory
//!
//! Records wallet logins and answers profile lookups. The authentication core
//! only upserts and reads accounts; it never mutates them otherwise.

mod directory;
mod model;

pub use directory::{start_of_day, InMemoryUserDirectory, UserDirectory};
pub use model::{normalize_address, Account, UserStats};
