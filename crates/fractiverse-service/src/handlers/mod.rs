//! API handlers.

pub mod checkout;
pub mod health;
pub mod tokens;
pub mod users;
pub mod webhooks;
