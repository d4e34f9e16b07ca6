//! Request and response types for the FractiVerse client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fractiverse_core::{TokenTier, TransactionStatus, TransactionType};

/// Spend tokens.
#[derive(Debug, Clone, Serialize)]
pub struct UseTokensRequest {
    /// Tokens to spend, a positive integer.
    pub amount: i64,
    /// What the tokens are spent on.
    pub description: String,
    /// Key making a retried call safe; repeats fail with `DuplicateEvent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl UseTokensRequest {
    /// A debit without an idempotency key.
    #[must_use]
    pub fn new(amount: i64, description: impl Into<String>) -> Self {
        Self {
            amount,
            description: description.into(),
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Return tokens to a user (service API key required).
#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    /// The user to refund.
    pub user_id: String,
    /// Tokens to return.
    pub amount: i64,
    /// Why.
    pub description: String,
    /// Key making a retried call safe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Spendable tokens.
    pub balance: i64,
}

/// Response to a debit or refund.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationResponse {
    /// Balance after the mutation.
    pub new_balance: i64,
    /// The recorded ledger entry.
    pub transaction_id: String,
}

/// One ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEntry {
    /// Transaction ID.
    pub id: String,
    /// Kind of entry.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Magnitude in tokens.
    pub amount: i64,
    /// Description.
    pub description: String,
    /// Outcome.
    pub status: TransactionStatus,
    /// Timestamp.
    pub created_at: DateTime<Utc>,
}

/// A page of transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionEntry>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// How the browser completes a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Hosted checkout page.
    #[default]
    Redirect,
    /// Embedded payment form.
    Embedded,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutRequest {
    pub tier: TokenTier,
    pub mode: CheckoutMode,
}

/// What the browser needs to continue a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
    /// Redirect to a hosted checkout.
    Redirect {
        /// Hosted checkout URL.
        redirect_url: String,
        /// Checkout session id.
        session_id: String,
    },
    /// Confirm with an embedded form.
    Embedded {
        /// Payment intent client secret.
        client_secret: String,
        /// Payment intent id.
        payment_intent_id: String,
    },
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// API error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
