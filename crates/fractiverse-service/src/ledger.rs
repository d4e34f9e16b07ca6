//! The Ledger Service.
//!
//! Owns the token-balance invariants: a balance is never negative and every
//! balance mutation is durably paired with exactly one [`Transaction`]. The
//! ledger holds no balance state of its own; each call is a store round-trip,
//! and the store's atomic compound operations do the check-then-act.
//!
//! Nothing here retries. Callers that may retry a mutation must pass an
//! idempotency key (a settlement event id, or a client key for debits).

use std::sync::Arc;

use fractiverse_core::{
    normalize_email, LedgerError, Result, SettlementEvent, Transaction, User, UserId,
};
use fractiverse_store::Store;
use tracing::{debug, info, warn};

/// Maximum page size for transaction listings.
pub const MAX_PAGE_SIZE: usize = 100;

/// Largest amount a single credit, debit or refund may move.
pub const MAX_TOKEN_AMOUNT: i64 = 1_000_000_000;

/// Maximum length of a transaction description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum length of a client idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Token balance operations over an injected store handle.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Provision a user with a zero balance.
    pub async fn create_user(&self, user_id: UserId, email: &str) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(LedgerError::Validation("a valid email is required".into()));
        }

        let user = User::new(user_id, &email);
        self.store.create_user(&user).await?;

        info!(user_id = %user_id, "User provisioned");
        Ok(user)
    }

    /// Get a user.
    pub async fn get_user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }

    // =========================================================================
    // Balance operations
    // =========================================================================

    /// Current balance. Pure read.
    pub async fn get_balance(&self, user_id: UserId) -> Result<i64> {
        Ok(self.get_user(user_id).await?.token_balance)
    }

    /// Credit purchased tokens, at most once per `source_event_id`.
    ///
    /// Returns the new balance. Fails with `DuplicateEvent` if the event was
    /// already applied.
    pub async fn credit(&self, user_id: UserId, amount: i64, source_event_id: &str) -> Result<i64> {
        validate_amount(amount)?;
        if source_event_id.trim().is_empty() {
            return Err(LedgerError::Validation("source event id is required".into()));
        }

        let transaction =
            Transaction::purchase(user_id, amount, format!("Purchased {amount} tokens"))
                .with_idempotency_key(source_event_id);
        self.apply_credit(&transaction).await
    }

    /// Apply an authenticated settlement notification.
    pub async fn settle(&self, event: &SettlementEvent) -> Result<i64> {
        validate_amount(event.token_amount)?;
        self.apply_credit(&event.purchase_transaction()).await
    }

    /// Spend tokens.
    ///
    /// Fails with `InsufficientBalance`, writing nothing, if the balance does
    /// not cover `amount`. With an `idempotency_key`, a repeat of the same key
    /// by the same user fails with `DuplicateEvent` instead of spending twice.
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
        idempotency_key: Option<&str>,
    ) -> Result<(Transaction, i64)> {
        validate_amount(amount)?;
        let description = validate_description(description, "Token usage")?;

        let mut transaction = Transaction::usage(user_id, amount, description);
        if let Some(key) = idempotency_key {
            transaction = transaction.with_idempotency_key(scoped_key("use", user_id, key)?);
        }

        match self.store.debit(&transaction).await {
            Ok(balance) => {
                info!(
                    user_id = %user_id,
                    amount,
                    new_balance = balance,
                    transaction_id = %transaction.id,
                    "Tokens debited"
                );
                Ok((transaction, balance))
            }
            Err(e) => {
                let err = LedgerError::from(e);
                if let LedgerError::InsufficientBalance { balance, required } = &err {
                    debug!(user_id = %user_id, balance, required, "Debit refused: insufficient balance");
                }
                Err(err)
            }
        }
    }

    /// Return previously spent tokens to a user.
    pub async fn refund(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
        idempotency_key: Option<&str>,
    ) -> Result<(Transaction, i64)> {
        validate_amount(amount)?;
        let description = validate_description(description, "Token refund")?;

        let mut transaction = Transaction::refund(user_id, amount, description);
        if let Some(key) = idempotency_key {
            transaction = transaction.with_idempotency_key(scoped_key("refund", user_id, key)?);
        }

        let balance = self.apply_credit(&transaction).await?;
        Ok((transaction, balance))
    }

    /// Record an entry that does not move the balance, such as a failed
    /// purchase.
    pub async fn record(&self, transaction: &Transaction) -> Result<()> {
        if transaction.balance_delta() != 0 {
            return Err(LedgerError::Validation(
                "only entries without balance effect can be recorded".into(),
            ));
        }
        self.store.record_transaction(transaction).await?;
        info!(
            user_id = %transaction.user_id,
            transaction_id = %transaction.id,
            status = %transaction.status,
            "Ledger entry recorded"
        );
        Ok(())
    }

    /// A page of a user's entries, newest first, and whether more exist.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Transaction>, bool)> {
        self.get_user(user_id).await?;

        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut transactions = self
            .store
            .list_transactions_by_user(&user_id, limit + 1, offset)
            .await?;

        let has_more = transactions.len() > limit;
        transactions.truncate(limit);
        Ok((transactions, has_more))
    }

    async fn apply_credit(&self, transaction: &Transaction) -> Result<i64> {
        match self.store.credit(transaction).await {
            Ok(balance) => {
                info!(
                    user_id = %transaction.user_id,
                    amount = transaction.amount,
                    transaction_type = %transaction.transaction_type,
                    new_balance = balance,
                    transaction_id = %transaction.id,
                    "Tokens credited"
                );
                Ok(balance)
            }
            Err(e) => {
                let err = LedgerError::from(e);
                if let LedgerError::DuplicateEvent { event_id } = &err {
                    warn!(user_id = %transaction.user_id, key = %event_id, "Credit already applied");
                }
                Err(err)
            }
        }
    }
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(LedgerError::Validation(format!(
            "amount must be a positive integer, got {amount}"
        )));
    }
    if amount > MAX_TOKEN_AMOUNT {
        return Err(LedgerError::Validation(format!(
            "amount must be at most {MAX_TOKEN_AMOUNT}, got {amount}"
        )));
    }
    Ok(())
}

fn validate_description(description: &str, default: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(LedgerError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(if description.is_empty() {
        default.to_string()
    } else {
        description.to_string()
    })
}

/// Namespace a caller key so it can never collide with settlement event ids
/// or with another user's keys.
fn scoped_key(scope: &str, user_id: UserId, key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(LedgerError::Validation(format!(
            "idempotency key must be 1-{MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(format!("{scope}:{user_id}:{key}"))
}
