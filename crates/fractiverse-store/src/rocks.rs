//! `RocksDB` storage implementation.
//!
//! Compound operations read, check and then commit a single `WriteBatch`. A
//! process-wide write lock serializes them so the check cannot go stale before
//! the batch lands.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use fractiverse_core::{Transaction, TransactionId, User, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".to_string()))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn has_key(&self, idempotency_key: &str) -> Result<bool> {
        let cf = self.cf(cf::IDEMPOTENCY_KEYS)?;
        Ok(self
            .db
            .get_cf(&cf, keys::idempotency_key(idempotency_key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    fn load_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get(cf::USERS, &keys::user_key(user_id))
    }

    fn load_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        self.get(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    /// Stage a ledger entry and its index rows into `batch`.
    fn stage_transaction(&self, batch: &mut WriteBatch, transaction: &Transaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let cf_keys = self.cf(cf::IDEMPOTENCY_KEYS)?;

        let tx_key = keys::transaction_key(&transaction.id);
        batch.put_cf(&cf_tx, &tx_key, Self::serialize(transaction)?);
        batch.put_cf(
            &cf_by_user,
            keys::user_transaction_key(&transaction.user_id, &transaction.id),
            [],
        );
        if let Some(key) = &transaction.idempotency_key {
            batch.put_cf(&cf_keys, keys::idempotency_key(key), &tx_key);
        }
        Ok(())
    }

    fn apply(&self, transaction: &Transaction, delta: i64) -> Result<i64> {
        let _guard = self.lock()?;

        if let Some(key) = &transaction.idempotency_key {
            if self.has_key(key)? {
                return Err(StoreError::DuplicateEvent {
                    event_id: key.clone(),
                });
            }
        }

        let mut user = self
            .load_user(&transaction.user_id)?
            .ok_or_else(|| StoreError::user_not_found(transaction.user_id))?;

        let new_balance = StoreError::checked_balance(user.token_balance, delta)?;
        user.token_balance = new_balance;
        user.updated_at = chrono::Utc::now();

        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(&user)?);
        self.stage_transaction(&mut batch, transaction)?;

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(new_balance)
    }
}

#[async_trait]
impl Store for RocksStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock()?;

        if self.load_user(&user.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "user",
                id: user.id.to_string(),
            });
        }
        if self
            .get::<UserId>(cf::USERS_BY_EMAIL, &keys::email_key(&user.email))?
            .is_some()
        {
            return Err(StoreError::AlreadyExists {
                entity: "email",
                id: user.email.clone(),
            });
        }

        let cf_users = self.cf(cf::USERS)?;
        let cf_emails = self.cf(cf::USERS_BY_EMAIL)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(user)?);
        batch.put_cf(
            &cf_emails,
            keys::email_key(&user.email),
            Self::serialize(&user.id)?,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.load_user(user_id)
    }

    async fn get_transaction_by_key(&self, idempotency_key: &str) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::IDEMPOTENCY_KEYS)?;
        let Some(tx_key) = self
            .db
            .get_cf(&cf, keys::idempotency_key(idempotency_key))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.get(cf::TRANSACTIONS, &tx_key)
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(id) = keys::transaction_id_from_user_key(&key) {
                ids.push(id);
            }
        }

        let mut transactions = Vec::new();
        for id in ids.iter().rev().skip(offset).take(limit) {
            if let Some(tx) = self.load_transaction(id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        let _guard = self.lock()?;

        if let Some(key) = &transaction.idempotency_key {
            if self.has_key(key)? {
                return Err(StoreError::DuplicateEvent {
                    event_id: key.clone(),
                });
            }
        }
        if self.load_user(&transaction.user_id)?.is_none() {
            return Err(StoreError::user_not_found(transaction.user_id));
        }

        let mut batch = WriteBatch::default();
        self.stage_transaction(&mut batch, transaction)?;
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn credit(&self, transaction: &Transaction) -> Result<i64> {
        self.apply(transaction, transaction.amount)
    }

    async fn debit(&self, transaction: &Transaction) -> Result<i64> {
        self.apply(transaction, -transaction.amount)
    }
}
