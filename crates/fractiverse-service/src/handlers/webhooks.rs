//! Payment processor webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::settlement::{process_notification, SettlementOutcome};
use crate::state::AppState;
use crate::stripe::webhook::SIGNATURE_HEADER;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the notification was accepted.
    pub received: bool,
}

/// Handle a settlement notification.
///
/// The body is taken raw: the signature covers its exact bytes.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = process_notification(&state, signature, &body).await?;
    if !matches!(outcome, SettlementOutcome::Credited { .. }) {
        tracing::debug!(outcome = ?outcome, "Notification acknowledged without credit");
    }

    Ok(Json(WebhookResponse { received: true }))
}
