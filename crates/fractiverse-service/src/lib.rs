//! FractiVerse token-ledger HTTP service.
//!
//! This crate provides the three ledger components and the HTTP surface around
//! them:
//!
//! - **Ledger Service** ([`ledger::Ledger`]) - credits, debits and balance reads
//! - **Settlement Listener** ([`settlement`]) - turns signed payment-processor
//!   notifications into at most one credit per event
//! - **Checkout Initiator** ([`checkout`]) - starts a purchase of a token tier
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **Session tokens** from the hosted identity provider (HS256 JWTs) for
//!    end-user requests
//! 2. **Service API keys** for service-to-service requests (refunds)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod checkout;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod routes;
pub mod settlement;
pub mod state;
pub mod stripe;

pub use auth::{Identity, IdentityProvider, JwtIdentityProvider};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use ledger::Ledger;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{PaymentProcessor, StripeClient, StripeError};
