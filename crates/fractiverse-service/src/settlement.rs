//! The Settlement Listener.
//!
//! Turns a signed payment-processor notification into at most one ledger
//! credit. Authentication comes first: nothing in an unverified body is read.
//! The processor redelivers anything that is not acknowledged with a 2xx, so
//! the outcomes below are split between "acknowledge" (`Ok`) and "ask for
//! redelivery" (`Err`).

use fractiverse_core::{LedgerError, SettlementEvent, Transaction, UserId};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::ledger::MAX_TOKEN_AMOUNT;
use crate::state::AppState;
use crate::stripe::webhook::verify_signature;
use crate::stripe::{
    StripeEvent, FLOW_EMBEDDED, METADATA_FLOW, METADATA_TOKEN_AMOUNT, METADATA_USER_ID,
};

/// Hosted checkout finished; carries `payment_status`.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Delayed payment method (bank debit etc.) for a hosted checkout succeeded.
pub const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
/// Delayed payment method for a hosted checkout failed.
pub const CHECKOUT_ASYNC_FAILED: &str = "checkout.session.async_payment_failed";
/// Hosted checkout was abandoned.
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";
/// A payment intent succeeded.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
/// A payment intent failed.
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// What processing a notification amounted to. Every variant is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Tokens were credited.
    Credited {
        /// The credited user.
        user_id: UserId,
        /// Tokens credited.
        amount: i64,
        /// Balance after the credit.
        new_balance: i64,
    },
    /// The event was already applied.
    Duplicate,
    /// A failed purchase was recorded.
    RecordedFailure,
    /// The event needs no action.
    Ignored,
    /// The event is authentic but its metadata cannot be used. Redelivery
    /// would not fix it.
    Malformed(String),
}

/// Verify, parse and apply one notification.
///
/// `signature` is the raw signature header, `body` the raw request body.
///
/// # Errors
///
/// - `InvalidSignature` if no webhook secret is configured or the signature
///   is missing or wrong; nothing is read or written.
/// - `Validation` if the verified body is not an event envelope.
/// - `NotFound` if the credited user does not exist yet, so the processor
///   redelivers.
/// - `Dependency` if the store failed.
pub async fn process_notification(
    state: &AppState,
    signature: Option<&str>,
    body: &str,
) -> Result<SettlementOutcome, ApiError> {
    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        return Err(ApiError::InvalidSignature(
            "webhook secret not configured".into(),
        ));
    };
    let signature =
        signature.ok_or_else(|| ApiError::InvalidSignature("missing signature header".into()))?;

    verify_signature(
        body,
        signature,
        secret,
        state.config.webhook_tolerance_seconds,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| ApiError::InvalidSignature(e.to_string()))?;

    let event: StripeEvent = serde_json::from_str(body)
        .map_err(|e| ApiError::Validation(format!("invalid event payload: {e}")))?;

    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        object_id = %event.object_id(),
        "Received payment notification"
    );

    match event.event_type.as_str() {
        CHECKOUT_COMPLETED => {
            let payment_status = event.object_str("payment_status").unwrap_or("unknown");
            if payment_status == "paid" {
                credit(state, &event, signature).await
            } else {
                info!(
                    event_id = %event.id,
                    payment_status,
                    "Checkout completed without payment, awaiting async result"
                );
                Ok(SettlementOutcome::Ignored)
            }
        }
        CHECKOUT_ASYNC_SUCCEEDED => credit(state, &event, signature).await,
        PAYMENT_INTENT_SUCCEEDED => {
            let embedded = event
                .metadata(METADATA_FLOW)
                .and_then(Value::as_str)
                .is_some_and(|flow| flow == FLOW_EMBEDDED);
            if embedded {
                credit(state, &event, signature).await
            } else {
                // Hosted checkouts also produce payment intents; those settle
                // through their session events.
                debug!(event_id = %event.id, "Payment intent not from embedded checkout");
                Ok(SettlementOutcome::Ignored)
            }
        }
        CHECKOUT_ASYNC_FAILED | CHECKOUT_EXPIRED | PAYMENT_INTENT_FAILED => {
            record_failure(state, &event).await
        }
        other => {
            debug!(event_id = %event.id, event_type = other, "Unhandled payment event");
            Ok(SettlementOutcome::Ignored)
        }
    }
}

async fn credit(
    state: &AppState,
    event: &StripeEvent,
    signature: &str,
) -> Result<SettlementOutcome, ApiError> {
    let settlement = match settlement_event(event, signature) {
        Ok(settlement) => settlement,
        Err(reason) => {
            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                reason = %reason,
                "Malformed settlement metadata, acknowledging without credit"
            );
            return Ok(SettlementOutcome::Malformed(reason));
        }
    };

    match state.ledger.settle(&settlement).await {
        Ok(new_balance) => Ok(SettlementOutcome::Credited {
            user_id: settlement.user_id,
            amount: settlement.token_amount,
            new_balance,
        }),
        Err(LedgerError::DuplicateEvent { .. }) => {
            info!(event_id = %event.id, "Duplicate delivery, already credited");
            Ok(SettlementOutcome::Duplicate)
        }
        Err(LedgerError::UserNotFound { user_id }) => {
            warn!(event_id = %event.id, user_id = %user_id, "Settlement for unknown user");
            Err(ApiError::NotFound("User not found".into()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn record_failure(
    state: &AppState,
    event: &StripeEvent,
) -> Result<SettlementOutcome, ApiError> {
    let Some(user_id) = metadata_user_id(event).and_then(|id| id.parse::<UserId>().ok()) else {
        debug!(event_id = %event.id, "Failed payment without a known user, ignoring");
        return Ok(SettlementOutcome::Ignored);
    };
    let amount = metadata_token_amount(event).unwrap_or(0);

    let transaction = Transaction::failed_purchase(
        user_id,
        amount,
        format!("Token purchase failed ({})", event.event_type),
    )
    .with_idempotency_key(event.id.clone())
    .with_metadata(serde_json::json!({
        "event_type": event.event_type,
        "object_id": event.object_id(),
    }));

    match state.ledger.record(&transaction).await {
        Ok(()) => {
            warn!(event_id = %event.id, user_id = %user_id, event_type = %event.event_type, "Token purchase failed");
            Ok(SettlementOutcome::RecordedFailure)
        }
        Err(LedgerError::DuplicateEvent { .. }) => Ok(SettlementOutcome::Duplicate),
        Err(LedgerError::UserNotFound { .. }) => {
            debug!(event_id = %event.id, user_id = %user_id, "Failed payment for unknown user, ignoring");
            Ok(SettlementOutcome::Ignored)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the settlement fields back out of the metadata the checkout attached.
fn settlement_event(event: &StripeEvent, signature: &str) -> Result<SettlementEvent, String> {
    let user_id = metadata_user_id(event)
        .ok_or_else(|| format!("missing {METADATA_USER_ID}"))?
        .parse::<UserId>()
        .map_err(|e| format!("invalid {METADATA_USER_ID}: {e}"))?;

    let token_amount = metadata_token_amount(event)
        .ok_or_else(|| format!("missing or invalid {METADATA_TOKEN_AMOUNT}"))?;

    Ok(SettlementEvent {
        event_id: event.id.clone(),
        user_id,
        token_amount,
        raw_payload_signature: signature.to_string(),
    })
}

fn metadata_user_id(event: &StripeEvent) -> Option<&str> {
    event
        .metadata(METADATA_USER_ID)
        .and_then(Value::as_str)
        .or_else(|| event.object_str("client_reference_id"))
        .filter(|id| !id.trim().is_empty())
}

/// A positive token amount no larger than [`MAX_TOKEN_AMOUNT`], sent as a
/// decimal string (Stripe metadata values are strings) or a number.
fn metadata_token_amount(event: &StripeEvent) -> Option<i64> {
    let amount = match event.metadata(METADATA_TOKEN_AMOUNT)? {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    (1..=MAX_TOKEN_AMOUNT).contains(&amount).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(object: Value) -> StripeEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": CHECKOUT_COMPLETED,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn reads_metadata_fields() {
        let user = UserId::generate();
        let ev = event(serde_json::json!({
            "id": "cs_1",
            "metadata": { "user_id": user.to_string(), "token_amount": "500" }
        }));
        let settlement = settlement_event(&ev, "t=1,v1=aa").unwrap();
        assert_eq!(settlement.user_id, user);
        assert_eq!(settlement.token_amount, 500);
        assert_eq!(settlement.event_id, "evt_1");
    }

    #[test]
    fn falls_back_to_client_reference_id() {
        let user = UserId::generate();
        let ev = event(serde_json::json!({
            "client_reference_id": user.to_string(),
            "metadata": { "token_amount": 100 }
        }));
        assert_eq!(settlement_event(&ev, "").unwrap().user_id, user);
    }

    #[test]
    fn rejects_unusable_amounts() {
        let user = UserId::generate().to_string();
        for amount in [
            serde_json::json!("0"),
            serde_json::json!("-3"),
            serde_json::json!("ten"),
            serde_json::json!(1.5),
            serde_json::json!(i64::MAX.to_string()),
            serde_json::json!(MAX_TOKEN_AMOUNT + 1),
            Value::Null,
        ] {
            let ev = event(serde_json::json!({
                "metadata": { "user_id": user, "token_amount": amount }
            }));
            assert!(settlement_event(&ev, "").is_err(), "accepted {amount}");
        }
    }

    #[test]
    fn rejects_missing_or_invalid_user() {
        let ev = event(serde_json::json!({ "metadata": { "token_amount": "100" } }));
        assert!(settlement_event(&ev, "").unwrap_err().contains("missing"));

        let ev = event(serde_json::json!({
            "metadata": { "user_id": "user_123", "token_amount": "100" }
        }));
        assert!(settlement_event(&ev, "").unwrap_err().contains("invalid"));
    }
}
