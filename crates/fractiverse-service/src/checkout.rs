//! The Checkout Initiator.
//!
//! Stateless: validates the requested tier and asks the payment processor for
//! a hosted session or a payment intent. The user id and token amount travel
//! as processor metadata and come back with the settlement notification.

use std::fmt;
use std::str::FromStr;

use fractiverse_core::{TokenTier, UserId};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{CheckoutRequest, StripeError};

/// How the browser completes the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutMode {
    /// Redirect to a hosted checkout page.
    #[default]
    Redirect,
    /// Confirm a payment intent with an embedded form.
    Embedded,
}

impl CheckoutMode {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckoutMode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(Self::Redirect),
            "embedded" => Ok(Self::Embedded),
            other => Err(ApiError::Validation(format!(
                "unknown checkout mode {other:?}, expected \"redirect\" or \"embedded\""
            ))),
        }
    }
}

/// What the caller needs to continue the purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CheckoutOutcome {
    /// Send the browser here.
    Redirect {
        /// Hosted checkout URL.
        redirect_url: String,
        /// Checkout session id.
        session_id: String,
    },
    /// Hand this to the embedded payment form.
    Embedded {
        /// Payment intent client secret.
        client_secret: String,
        /// Payment intent id.
        payment_intent_id: String,
    },
}

/// Validate the raw tier and mode of a checkout request.
pub fn parse_selection(tier: &str, mode: Option<&str>) -> Result<(TokenTier, CheckoutMode), ApiError> {
    let tier = tier
        .parse::<TokenTier>()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let mode = mode
        .map(str::parse::<CheckoutMode>)
        .transpose()?
        .unwrap_or_default();
    Ok((tier, mode))
}

/// Start a purchase of `tier` for `user_id`.
///
/// # Errors
///
/// - `Dependency` if no payment processor is configured or it fails.
/// - `NotFound` if the user is not provisioned.
pub async fn initiate_checkout(
    state: &AppState,
    user_id: UserId,
    tier: TokenTier,
    mode: CheckoutMode,
) -> Result<CheckoutOutcome, ApiError> {
    let payments = state
        .payments
        .as_ref()
        .ok_or_else(|| ApiError::Dependency("payment processor not configured".into()))?;

    let user = state.ledger.get_user(user_id).await?;

    let frontend = state.config.frontend_url.trim_end_matches('/');
    let request = CheckoutRequest {
        user_id,
        email: user.email,
        tier,
        success_url: format!("{frontend}/tokens/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{frontend}/tokens"),
    };

    let outcome = match mode {
        CheckoutMode::Redirect => {
            let session = payments.create_checkout_session(&request).await?;
            let redirect_url = session.url.ok_or_else(|| {
                StripeError::UnexpectedResponse(format!("checkout session {} has no url", session.id))
            })?;
            CheckoutOutcome::Redirect {
                redirect_url,
                session_id: session.id,
            }
        }
        CheckoutMode::Embedded => {
            let intent = payments.create_payment_intent(&request).await?;
            let client_secret = intent.client_secret.ok_or_else(|| {
                StripeError::UnexpectedResponse(format!(
                    "payment intent {} has no client secret",
                    intent.id
                ))
            })?;
            CheckoutOutcome::Embedded {
                client_secret,
                payment_intent_id: intent.id,
            }
        }
    };

    tracing::info!(
        user_id = %user_id,
        tier = %tier,
        mode = %mode,
        tokens = tier.token_amount(),
        price_cents = tier.price_cents(),
        "Checkout initiated"
    );

    Ok(outcome)
}
