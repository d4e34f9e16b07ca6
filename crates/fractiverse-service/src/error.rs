//! API error types and responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use fractiverse_core::LedgerError;
use fractiverse_store::StoreError;

use crate::stripe::StripeError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - the caller presented credentials for a surface that is
    /// disabled here.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input shape or values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A debit exceeds the available balance.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Duplicate event or idempotency key.
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// Untrusted webhook notification.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The store or the payment processor failed.
    #[error("dependency error: {0}")]
    Dependency(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::BAD_REQUEST,
                "insufficient_balance",
                format!("Insufficient token balance: {balance} available, {required} required"),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::DuplicateEvent(id) => (
                StatusCode::CONFLICT,
                "duplicate_event",
                format!("{id} was already processed"),
                None,
            ),
            Self::InvalidSignature(reason) => {
                tracing::warn!(reason = %reason, "Rejected webhook with invalid signature");
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_signature",
                    "Invalid webhook signature".to_string(),
                    None,
                )
            }
            Self::Dependency(msg) => {
                tracing::error!(error = %msg, "Dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "dependency_error",
                    "A required service is unavailable, please try again later".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::Validation(msg),
            LedgerError::InvalidId(e) => Self::Validation(e.to_string()),
            LedgerError::UserNotFound { .. } => Self::NotFound("User not found".into()),
            LedgerError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            LedgerError::DuplicateEvent { event_id } => Self::DuplicateEvent(event_id),
            LedgerError::UserAlreadyExists { .. } => Self::Conflict("User already exists".into()),
            LedgerError::EmailTaken { .. } => Self::Conflict("Email already registered".into()),
            LedgerError::Dependency { service, message } => {
                Self::Dependency(format!("{service}: {message}"))
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        LedgerError::from(err).into()
    }
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        Self::Dependency(format!("payment processor: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
