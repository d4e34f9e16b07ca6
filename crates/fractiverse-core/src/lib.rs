//! Core types for the FractiVerse token ledger.
//!
//! This crate provides the foundational types shared by the store, the HTTP
//! service and the client SDK:
//!
//! - **Identifiers**: `UserId`, `TransactionId`
//! - **Users**: `User`
//! - **Ledger entries**: `Transaction`, `TransactionType`, `TransactionStatus`
//! - **Purchasing**: `TokenTier`, `SettlementEvent`
//! - **Errors**: `LedgerError`
//!
//! # Token unit
//!
//! Tokens are whole, non-negative integers stored as `i64`. A user's
//! `token_balance` is the single source of truth for spendable credits and only
//! the ledger mutates it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod settlement;
pub mod tier;
pub mod transaction;
pub mod user;

pub use error::{LedgerError, Result};
pub use ids::{IdError, TransactionId, UserId};
pub use settlement::SettlementEvent;
pub use tier::{TierError, TokenTier};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use user::{normalize_email, User};
