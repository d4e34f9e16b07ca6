//! Column family names for the `RocksDB` backend.

/// Column family names.
pub mod cf {
    /// User records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: normalized email to `user_id`.
    pub const USERS_BY_EMAIL: &str = "users_by_email";

    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Index: idempotency key to `transaction_id`.
    pub const IDEMPOTENCY_KEYS: &str = "idempotency_keys";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_EMAIL,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::IDEMPOTENCY_KEYS,
    ]
}
