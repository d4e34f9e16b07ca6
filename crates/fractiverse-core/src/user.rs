//! User records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user known to the ledger.
///
/// Rows are created on first successful signup and never hard-deleted. The
/// balance is only ever changed through ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID issued by the identity provider.
    pub id: UserId,

    /// Email address, trimmed and lower-cased.
    pub email: String,

    /// Spendable tokens. Never negative.
    pub token_balance: i64,

    /// When the user was provisioned.
    pub created_at: DateTime<Utc>,

    /// When the row was last changed.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a zero balance.
    #[must_use]
    pub fn new(id: UserId, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: normalize_email(email),
            token_balance: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical form of an email address used for uniqueness.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
