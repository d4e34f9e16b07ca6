//! Stripe integration: the payment processor behind checkout and settlement.
//!
//! Stripe handles:
//! - Hosted Checkout sessions (redirect flow)
//! - Payment intents (embedded flow, client secret)
//! - Signed webhook notifications for payment outcomes

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{StripeClient, StripeError};
pub use types::*;

use async_trait::async_trait;
use fractiverse_core::{TokenTier, UserId};

/// Metadata key carrying the purchasing user.
pub const METADATA_USER_ID: &str = "user_id";

/// Metadata key carrying the number of tokens to credit.
pub const METADATA_TOKEN_AMOUNT: &str = "token_amount";

/// Metadata key carrying the tier name.
pub const METADATA_TIER: &str = "tier";

/// Metadata key marking a payment intent created for the embedded flow.
pub const METADATA_FLOW: &str = "flow";

/// [`METADATA_FLOW`] value for embedded (client-secret) purchases.
pub const FLOW_EMBEDDED: &str = "embedded";

/// Everything the processor needs to start a token purchase.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// The purchasing user. Round-trips through metadata to the settlement listener.
    pub user_id: UserId,
    /// Email for the receipt.
    pub email: String,
    /// The tier being bought.
    pub tier: TokenTier,
    /// Redirect target after a successful hosted checkout.
    pub success_url: String,
    /// Redirect target when the user abandons hosted checkout.
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Metadata pairs attached to the processor object.
    #[must_use]
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        vec![
            (METADATA_USER_ID, self.user_id.to_string()),
            (METADATA_TOKEN_AMOUNT, self.tier.token_amount().to_string()),
            (METADATA_TIER, self.tier.as_str().to_string()),
        ]
    }
}

/// The payment processor collaborator.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a hosted checkout session the user is redirected to.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Create a payment intent whose client secret drives an embedded form.
    async fn create_payment_intent(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentIntent, StripeError>;
}
