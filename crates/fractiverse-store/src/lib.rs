//! Storage layer for the FractiVerse token ledger.
//!
//! The ledger never caches balances: every read and write goes through a
//! [`Store`], and the store's atomic compound operations are the only
//! consistency mechanism in the system.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, the production backend. Debits use a
//!   conditional `UPDATE ... WHERE token_balance >= $n` and idempotency rides on
//!   a unique index over `transactions.idempotency_key`.
//! - [`MemoryStore`]: a single mutex over in-process maps, for tests and local
//!   development.
//! - `RocksStore`: embedded `RocksDB` with column families, behind the
//!   `rocksdb-backend` feature.
//!
//! # Example
//!
//! ```no_run
//! use fractiverse_core::{Transaction, User, UserId};
//! use fractiverse_store::{MemoryStore, Store};
//!
//! # async fn run() -> fractiverse_store::Result<()> {
//! let store = MemoryStore::new();
//! let user = User::new(UserId::generate(), "ada@example.com");
//! store.create_user(&user).await?;
//!
//! let purchase = Transaction::purchase(user.id, 100, "Purchased 100 tokens".into())
//!     .with_idempotency_key("evt_1");
//! let balance = store.credit(&purchase).await?;
//! assert_eq!(balance, 100);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
pub mod postgres;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use fractiverse_core::{Transaction, User, UserId};

/// The storage trait defining all ledger persistence.
///
/// Balance mutations are only available as compound operations that change the
/// balance and insert the paired [`Transaction`] as one atomic unit.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id or email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get the transaction recorded under an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_transaction_by_key(&self, idempotency_key: &str) -> Result<Option<Transaction>>;

    /// List transactions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// Insert a transaction that does not move the balance (e.g. a FAILED
    /// purchase).
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::DuplicateEvent` if the idempotency key was already used.
    async fn record_transaction(&self, transaction: &Transaction) -> Result<()>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Add `transaction.amount` to the user's balance and insert the
    /// transaction atomically.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::DuplicateEvent` if the idempotency key was already used.
    async fn credit(&self, transaction: &Transaction) -> Result<i64>;

    /// Subtract `transaction.amount` from the user's balance and insert the
    /// transaction atomically, only if the balance covers it.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::DuplicateEvent` if the idempotency key was already used.
    /// - `StoreError::InsufficientBalance` if the balance is too low; nothing
    ///   is written.
    async fn debit(&self, transaction: &Transaction) -> Result<i64>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve queries.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
