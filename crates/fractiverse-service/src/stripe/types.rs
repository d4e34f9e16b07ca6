//! Stripe API types.

use serde::Deserialize;

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Payment status (`paid`, `unpaid`, `no_payment_required`).
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total amount in cents.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Payment intent ID.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Stripe `PaymentIntent` object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID.
    pub id: String,
    /// Secret handed to the browser to confirm the payment.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount in cents.
    #[serde(default)]
    pub amount: i64,
    /// Status (succeeded, `requires_payment_method`, etc.).
    #[serde(default)]
    pub status: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Stripe error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    /// Event ID, unique per notification (redeliveries reuse it).
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: StripeEventData,
}

/// Stripe event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    /// The object the event is about (session, payment intent, ...).
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// ID of the object the event is about.
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.object_str("id").unwrap_or("unknown")
    }

    /// A top-level string field of the event object.
    #[must_use]
    pub fn object_str(&self, key: &str) -> Option<&str> {
        self.data.object.get(key).and_then(serde_json::Value::as_str)
    }

    /// A metadata entry of the event object.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.object.get("metadata").and_then(|m| m.get(key))
    }
}
