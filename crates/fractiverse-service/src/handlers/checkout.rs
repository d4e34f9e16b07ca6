//! Checkout handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use fractiverse_core::TokenTier;

use crate::auth::AuthUser;
use crate::checkout::{initiate_checkout, parse_selection, CheckoutOutcome};
use crate::error::ApiError;
use crate::state::AppState;

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Tier name (`starter`, `standard`, `pro`, `ultimate`).
    pub tier: String,
    /// `redirect` (default) or `embedded`.
    pub mode: Option<String>,
}

/// Start a token purchase for the authenticated user.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutOutcome>, ApiError> {
    let Json(body) = body?;
    let (tier, mode) = parse_selection(&body.tier, body.mode.as_deref())?;

    let outcome = initiate_checkout(&state, auth.user_id, tier, mode).await?;
    Ok(Json(outcome))
}

/// A purchasable tier.
#[derive(Debug, Serialize)]
pub struct TierResponse {
    /// Tier name.
    pub tier: TokenTier,
    /// Product name shown at checkout.
    pub name: String,
    /// Tokens credited.
    pub tokens: i64,
    /// Price in cents.
    pub price_cents: i64,
}

/// List purchasable tiers. Public.
pub async fn list_tiers() -> Json<Vec<TierResponse>> {
    Json(
        TokenTier::all()
            .iter()
            .map(|&tier| TierResponse {
                tier,
                name: tier.display_name(),
                tokens: tier.token_amount(),
                price_cents: tier.price_cents(),
            })
            .collect(),
    )
}
