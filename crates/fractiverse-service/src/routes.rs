//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, health, tokens, users, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for token endpoints.
/// Debits are called by application features on every chat message.
const TOKENS_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /checkout/tiers` - Purchasable tiers
///
/// ## Users (session auth)
/// - `POST /users` - Provision the current user
/// - `GET /users/me` - Get the current user
///
/// ## Tokens (session auth, rate-limited)
/// - `GET /tokens/balance` - Current balance
/// - `POST /tokens/use` - Spend tokens
/// - `GET /tokens/transactions` - Transaction history
/// - `POST /tokens/refund` - Return tokens (service API key auth)
///
/// ## Checkout (session auth)
/// - `POST /checkout` - Start a purchase
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payment` - Payment processor notifications
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let token_routes = Router::new()
        .route("/tokens/balance", get(tokens::get_balance))
        .route("/tokens/use", post(tokens::use_tokens))
        .route("/tokens/transactions", get(tokens::list_transactions))
        .route("/tokens/refund", post(tokens::refund_tokens))
        .layer(ConcurrencyLimitLayer::new(TOKENS_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::get_me))
        .route("/checkout", post(checkout::create_checkout))
        .route("/checkout/tiers", get(checkout::list_tiers))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .merge(api_routes)
        .merge(token_routes)
        // Webhooks (no rate limit - redelivery is paced by the processor)
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
