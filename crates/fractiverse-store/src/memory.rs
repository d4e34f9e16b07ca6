//! In-process storage.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use fractiverse_core::{Transaction, TransactionId, User, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    users_by_email: HashMap<String, UserId>,
    transactions: BTreeMap<TransactionId, Transaction>,
    idempotency_keys: HashMap<String, TransactionId>,
}

impl Inner {
    fn check_key(&self, transaction: &Transaction) -> Result<()> {
        match &transaction.idempotency_key {
            Some(key) if self.idempotency_keys.contains_key(key) => {
                Err(StoreError::DuplicateEvent {
                    event_id: key.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn insert_transaction(&mut self, transaction: &Transaction) {
        if let Some(key) = &transaction.idempotency_key {
            self.idempotency_keys.insert(key.clone(), transaction.id);
        }
        self.transactions
            .insert(transaction.id, transaction.clone());
    }

    /// Apply a signed balance change plus its entry. The whole check-then-act
    /// runs under the caller's lock.
    fn apply(&mut self, transaction: &Transaction, delta: i64) -> Result<i64> {
        self.check_key(transaction)?;

        let user = self
            .users
            .get_mut(&transaction.user_id)
            .ok_or_else(|| StoreError::user_not_found(transaction.user_id))?;

        let new_balance = StoreError::checked_balance(user.token_balance, delta)?;

        user.token_balance = new_balance;
        user.updated_at = chrono::Utc::now();
        self.insert_transaction(transaction);

        Ok(new_balance)
    }
}

/// Storage backed by in-process maps behind one async mutex.
///
/// Data does not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists {
                entity: "user",
                id: user.id.to_string(),
            });
        }
        if inner.users_by_email.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists {
                entity: "email",
                id: user.email.clone(),
            });
        }

        inner.users_by_email.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(user_id).cloned())
    }

    async fn get_transaction_by_key(&self, idempotency_key: &str) -> Result<Option<Transaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .idempotency_keys
            .get(idempotency_key)
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .values()
            .rev()
            .filter(|tx| &tx.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.check_key(transaction)?;
        if !inner.users.contains_key(&transaction.user_id) {
            return Err(StoreError::user_not_found(transaction.user_id));
        }
        inner.insert_transaction(transaction);
        Ok(())
    }

    async fn credit(&self, transaction: &Transaction) -> Result<i64> {
        self.inner.lock().await.apply(transaction, transaction.amount)
    }

    async fn debit(&self, transaction: &Transaction) -> Result<i64> {
        self.inner
            .lock()
            .await
            .apply(transaction, -transaction.amount)
    }
}
