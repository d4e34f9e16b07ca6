//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::{CheckoutSession, PaymentIntent, StripeErrorResponse};
use super::{CheckoutRequest, PaymentProcessor, FLOW_EMBEDDED, METADATA_FLOW};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// The response lacked a field the caller needs.
    #[error("unexpected Stripe response: {0}")]
    UnexpectedResponse(String),

    /// Invalid webhook signature.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API base (e.g. a local stub).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn metadata_params(request: &CheckoutRequest) -> Vec<(String, String)> {
        request
            .metadata()
            .into_iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value))
            .collect()
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        match response.json::<StripeErrorResponse>().await {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let tier = request.tier;
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.user_id.to_string()),
            ("customer_email".to_string(), request.email.clone()),
            (
                "line_items[0][price_data][currency]".to_string(),
                "usd".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                tier.display_name(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                tier.price_cents().to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];
        params.extend(Self::metadata_params(request));

        tracing::debug!(
            user_id = %request.user_id,
            tier = %tier,
            amount_cents = tier.price_cents(),
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn create_payment_intent(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentIntent, StripeError> {
        let tier = request.tier;
        let mut params = vec![
            ("amount".to_string(), tier.price_cents().to_string()),
            ("currency".to_string(), "usd".to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            ("receipt_email".to_string(), request.email.clone()),
            ("description".to_string(), tier.display_name()),
            (
                format!("metadata[{METADATA_FLOW}]"),
                FLOW_EMBEDDED.to_string(),
            ),
        ];
        params.extend(Self::metadata_params(request));

        tracing::debug!(
            user_id = %request.user_id,
            tier = %tier,
            amount_cents = tier.price_cents(),
            "Creating Stripe payment intent"
        );

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }
}
