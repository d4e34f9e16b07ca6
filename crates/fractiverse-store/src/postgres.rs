//! PostgreSQL storage implementation.
//!
//! Balance changes never read-then-write: credits add in place below the
//! `BIGINT` ceiling, debits use a conditional
//! `UPDATE ... WHERE token_balance >= $2 RETURNING`, and the paired
//! ledger insert commits in the same database transaction. The partial unique
//! index on `transactions.idempotency_key` makes a repeated key a no-op insert,
//! which rolls the whole unit back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use tracing::debug;
use uuid::Uuid;

use fractiverse_core::{Transaction, User, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, description, status, \
     idempotency_key, metadata, created_at";

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_key_unused(
        conn: &mut sqlx::PgConnection,
        transaction: &Transaction,
    ) -> Result<()> {
        let Some(key) = &transaction.idempotency_key else {
            return Ok(());
        };

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM transactions WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(conn)
                .await?;

        match existing {
            Some(_) => Err(StoreError::DuplicateEvent {
                event_id: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Balance of the transaction's user, after a conditional update matched
    /// no row. A missing user is `NotFound`.
    async fn current_balance(
        conn: &mut sqlx::PgConnection,
        transaction: &Transaction,
    ) -> Result<i64> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT token_balance FROM users WHERE id = $1")
                .bind(transaction.user_id.as_uuid())
                .fetch_optional(conn)
                .await?;

        current.ok_or_else(|| StoreError::user_not_found(transaction.user_id))
    }

    /// Insert a ledger row. Returns `DuplicateEvent` when the idempotency key
    /// is already taken.
    async fn insert_transaction<'c, E>(executor: E, transaction: &Transaction) -> Result<()>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(
            r"
            INSERT INTO transactions
                (id, user_id, transaction_type, amount, description, status,
                 idempotency_key, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING
            ",
        )
        .bind(transaction.id.to_string())
        .bind(transaction.user_id.as_uuid())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(transaction.status.as_str())
        .bind(transaction.idempotency_key.as_deref())
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .execute(executor)
        .await
        .map_err(|e| map_constraint_error(e, transaction))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateEvent {
                event_id: transaction.idempotency_key.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn map_constraint_error(err: sqlx::Error, transaction: &Transaction) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return StoreError::user_not_found(transaction.user_id);
        }
    }
    StoreError::from(err)
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    token_balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            token_balance: row.token_balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: String,
    user_id: Uuid,
    transaction_type: String,
    amount: i64,
    description: String,
    status: String,
    idempotency_key: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Self {
            id: row
                .id
                .parse()
                .map_err(|e: fractiverse_core::IdError| StoreError::Serialization(e.to_string()))?,
            user_id: UserId::from_uuid(row.user_id),
            transaction_type: row
                .transaction_type
                .parse()
                .map_err(StoreError::Serialization)?,
            amount: row.amount,
            description: row.description,
            status: row.status.parse().map_err(StoreError::Serialization)?,
            idempotency_key: row.idempotency_key,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, token_balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.token_balance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.constraint() == Some("users_email_key") => {
                StoreError::AlreadyExists {
                    entity: "email",
                    id: user.email.clone(),
                }
            }
            Some(db_err) if db_err.is_unique_violation() => StoreError::AlreadyExists {
                entity: "user",
                id: user.id.to_string(),
            },
            _ => StoreError::from(e),
        })?;

        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, token_balance, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_transaction_by_key(&self, idempotency_key: &str) -> Result<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE idempotency_key = $1"
        ))
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        Self::insert_transaction(&self.pool, transaction).await
    }

    async fn credit(&self, transaction: &Transaction) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        Self::ensure_key_unused(&mut *tx, transaction).await?;

        let balance: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE users SET token_balance = token_balance + $2, updated_at = now()
            WHERE id = $1 AND token_balance <= $3 - $2
            RETURNING token_balance
            ",
        )
        .bind(transaction.user_id.as_uuid())
        .bind(transaction.amount)
        .bind(i64::MAX)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            let current = Self::current_balance(&mut *tx, transaction).await?;
            return Err(StoreError::BalanceOverflow {
                balance: current,
                amount: transaction.amount,
            });
        };

        // A concurrent delivery of the same key that committed first makes this
        // insert a no-op; dropping `tx` rolls back the balance change.
        Self::insert_transaction(&mut *tx, transaction).await?;

        tx.commit().await?;
        debug!(user_id = %transaction.user_id, balance, "credit committed");
        Ok(balance)
    }

    async fn debit(&self, transaction: &Transaction) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        Self::ensure_key_unused(&mut *tx, transaction).await?;

        let balance: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE users SET token_balance = token_balance - $2, updated_at = now()
            WHERE id = $1 AND token_balance >= $2
            RETURNING token_balance
            ",
        )
        .bind(transaction.user_id.as_uuid())
        .bind(transaction.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            let current = Self::current_balance(&mut *tx, transaction).await?;
            return Err(StoreError::InsufficientBalance {
                balance: current,
                required: transaction.amount,
            });
        };

        Self::insert_transaction(&mut *tx, transaction).await?;

        tx.commit().await?;
        debug!(user_id = %transaction.user_id, balance, "debit committed");
        Ok(balance)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
