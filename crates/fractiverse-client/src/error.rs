//! Client error types.

/// Errors that can occur when using the FractiVerse client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The balance does not cover the debit.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The idempotency key was already used.
    #[error("duplicate event: {message}")]
    DuplicateEvent {
        /// Server message.
        message: String,
    },

    /// The user is not provisioned.
    #[error("user not found")]
    UserNotFound,

    /// Missing or rejected credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
