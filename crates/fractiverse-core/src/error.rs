//! Error types for ledger operations.

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the ledger, the settlement listener and the checkout
/// initiator.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Bad input shape or values.
    #[error("validation error: {0}")]
    Validation(String),

    /// The user does not exist.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// A debit exceeds the available balance.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in tokens.
        balance: i64,
        /// Requested amount in tokens.
        required: i64,
    },

    /// The idempotency key (settlement event id or debit key) was already applied.
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// The key that was already applied.
        event_id: String,
    },

    /// The user already exists.
    #[error("user already exists: {user_id}")]
    UserAlreadyExists {
        /// The user ID that already exists.
        user_id: String,
    },

    /// Another user already registered this email.
    #[error("email already registered: {email}")]
    EmailTaken {
        /// The normalized email.
        email: String,
    },

    /// The store or the payment processor could not be reached or failed.
    #[error("dependency error: {service} - {message}")]
    Dependency {
        /// The collaborator that failed.
        service: String,
        /// Error message (never shown to end users).
        message: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Build a store dependency error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Dependency {
            service: "store".to_string(),
            message: message.into(),
        }
    }
}
