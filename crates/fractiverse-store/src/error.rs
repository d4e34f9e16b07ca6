//! Error types for ledger storage.

use fractiverse_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A record with the same unique field already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// The conflicting value.
        id: String,
    },

    /// Insufficient balance for a debit.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in tokens.
        balance: i64,
        /// Required amount in tokens.
        required: i64,
    },

    /// A credit would push the balance past `i64::MAX`.
    #[error("balance overflow: balance={balance}, amount={amount}")]
    BalanceOverflow {
        /// Current balance in tokens.
        balance: i64,
        /// Amount that was to be added.
        amount: i64,
    },

    /// The idempotency key was already applied.
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// The key that was duplicated.
        event_id: String,
    },
}

impl StoreError {
    pub(crate) fn user_not_found(user_id: impl ToString) -> Self {
        Self::NotFound {
            entity: "user",
            id: user_id.to_string(),
        }
    }

    /// Apply a signed balance change, refusing overdraft and overflow.
    pub(crate) fn checked_balance(balance: i64, delta: i64) -> Result<i64> {
        let new_balance = balance
            .checked_add(delta)
            .ok_or(Self::BalanceOverflow {
                balance,
                amount: delta,
            })?;
        if new_balance < 0 {
            return Err(Self::InsufficientBalance {
                balance,
                required: -delta,
            });
        }
        Ok(new_balance)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "user", id } => Self::UserNotFound { user_id: id },
            StoreError::NotFound { entity, id } => Self::Validation(format!("{entity} not found: {id}")),
            StoreError::AlreadyExists { entity: "email", id } => Self::EmailTaken { email: id },
            StoreError::AlreadyExists { id, .. } => Self::UserAlreadyExists { user_id: id },
            StoreError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            StoreError::BalanceOverflow { balance, amount } => Self::Validation(format!(
                "crediting {amount} tokens would overflow the balance of {balance}"
            )),
            StoreError::DuplicateEvent { event_id } => Self::DuplicateEvent { event_id },
            StoreError::Database(message) | StoreError::Serialization(message) => {
                Self::store(message)
            }
        }
    }
}
