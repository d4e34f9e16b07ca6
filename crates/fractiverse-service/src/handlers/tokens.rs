//! Token balance, usage and history handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fractiverse_core::{Transaction, UserId};

use crate::auth::{AuthUser, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Spendable tokens.
    pub balance: i64,
}

/// Get the current token balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.get_balance(auth.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// Use tokens request.
#[derive(Debug, Deserialize)]
pub struct UseTokensRequest {
    /// Tokens to spend, a positive integer.
    pub amount: i64,
    /// What the tokens were spent on.
    #[serde(default)]
    pub description: String,
    /// Caller key making retries safe.
    pub idempotency_key: Option<String>,
}

/// Response to a balance mutation.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    /// Balance after the mutation.
    pub new_balance: i64,
    /// The recorded ledger entry.
    pub transaction_id: String,
}

/// Spend tokens on behalf of the authenticated user.
pub async fn use_tokens(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<UseTokensRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let Json(body) = body?;

    let (transaction, new_balance) = state
        .ledger
        .debit(
            auth.user_id,
            body.amount,
            &body.description,
            body.idempotency_key.as_deref(),
        )
        .await?;

    Ok(Json(MutationResponse {
        new_balance,
        transaction_id: transaction.id.to_string(),
    }))
}

/// Refund request (service-to-service).
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// The user to refund.
    pub user_id: String,
    /// Tokens to return, a positive integer.
    pub amount: i64,
    /// Why the tokens are returned.
    #[serde(default)]
    pub description: String,
    /// Caller key making retries safe.
    pub idempotency_key: Option<String>,
}

/// Return tokens to a user after a failed feature call.
pub async fn refund_tokens(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    body: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let Json(body) = body?;
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::Validation("user_id must be a UUID".into()))?;

    let (transaction, new_balance) = state
        .ledger
        .refund(
            user_id,
            body.amount,
            &body.description,
            body.idempotency_key.as_deref(),
        )
        .await?;

    tracing::info!(
        service = %service.service_name,
        user_id = %user_id,
        amount = body.amount,
        "Refund issued"
    );

    Ok(Json(MutationResponse {
        new_balance,
        transaction_id: transaction.id.to_string(),
    }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// `PURCHASE`, `USE` or `REFUND`.
    #[serde(rename = "type")]
    pub transaction_type: String,
    /// Magnitude in tokens.
    pub amount: i64,
    /// Description.
    pub description: String,
    /// `PENDING`, `COMPLETED` or `FAILED`.
    pub status: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            transaction_type: tx.transaction_type.to_string(),
            amount: tx.amount,
            description: tx.description.clone(),
            status: tx.status.to_string(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the authenticated user's transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    query: Result<Query<ListTransactionsQuery>, QueryRejection>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let Query(query) = query?;

    let (transactions, has_more) = state
        .ledger
        .list_transactions(auth.user_id, query.limit, query.offset)
        .await?;

    Ok(Json(ListTransactionsResponse {
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
        has_more,
    }))
}
