//! Ledger entries.
//!
//! Every balance mutation is paired with exactly one `Transaction`. Amounts are
//! always stored as a positive magnitude; the direction follows from the type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TransactionId, UserId};

/// An audit record for one balance mutation (or a failed attempt at one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance this entry belongs to.
    pub user_id: UserId,

    /// Kind of entry.
    pub transaction_type: TransactionType,

    /// Magnitude in tokens, always positive.
    pub amount: i64,

    /// Human-readable description.
    pub description: String,

    /// Outcome of the entry.
    pub status: TransactionStatus,

    /// Unique key guarding against double application: the payment processor's
    /// event id for settlements, a namespaced caller key for debits and refunds.
    pub idempotency_key: Option<String>,

    /// Additional metadata (tier, checkout session, failure reason).
    pub metadata: serde_json::Value,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn new(
        user_id: UserId,
        transaction_type: TransactionType,
        amount: i64,
        description: String,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            transaction_type,
            amount: amount.abs(),
            description,
            status,
            idempotency_key: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// A completed token purchase.
    #[must_use]
    pub fn purchase(user_id: UserId, amount: i64, description: String) -> Self {
        Self::new(
            user_id,
            TransactionType::Purchase,
            amount,
            description,
            TransactionStatus::Completed,
        )
    }

    /// A completed token spend.
    #[must_use]
    pub fn usage(user_id: UserId, amount: i64, description: String) -> Self {
        Self::new(
            user_id,
            TransactionType::Use,
            amount,
            description,
            TransactionStatus::Completed,
        )
    }

    /// A completed refund of previously spent tokens.
    #[must_use]
    pub fn refund(user_id: UserId, amount: i64, description: String) -> Self {
        Self::new(
            user_id,
            TransactionType::Refund,
            amount,
            description,
            TransactionStatus::Completed,
        )
    }

    /// A purchase that the payment processor reported as failed. Recorded for
    /// observability; it never changes the balance.
    #[must_use]
    pub fn failed_purchase(user_id: UserId, amount: i64, description: String) -> Self {
        Self::new(
            user_id,
            TransactionType::Purchase,
            amount,
            description,
            TransactionStatus::Failed,
        )
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// The signed effect this entry has on the balance.
    ///
    /// Only completed entries move the balance.
    #[must_use]
    pub const fn balance_delta(&self) -> i64 {
        match self.status {
            TransactionStatus::Completed if self.transaction_type.is_credit() => self.amount,
            TransactionStatus::Completed => -self.amount,
            TransactionStatus::Pending | TransactionStatus::Failed => 0,
        }
    }
}

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Tokens bought through the payment processor.
    Purchase,

    /// Tokens consumed by an application feature.
    Use,

    /// Tokens returned to the user.
    Refund,
}

impl TransactionType {
    /// Check if this type increases the balance.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Purchase | Self::Refund)
    }

    /// Stable storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Use => "USE",
            Self::Refund => "REFUND",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(Self::Purchase),
            "USE" => Ok(Self::Use),
            "REFUND" => Ok(Self::Refund),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Outcome of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Recorded before the outcome is known.
    Pending,

    /// Applied to the balance; immutable from here on.
    Completed,

    /// Not applied to the balance.
    Failed,
}

impl TransactionStatus {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}
