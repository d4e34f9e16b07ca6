//! Webhook signature verification.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

use super::StripeError;

/// Name of the signature header.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verify a webhook signature header against the raw payload.
///
/// `now` is the current Unix time; signatures whose timestamp is more than
/// `tolerance_seconds` away from it are rejected to stop replays.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the header is malformed, stale or
/// does not match.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: u64,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".into()))?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("malformed timestamp".into()))?;

    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature("no v1 signature".into()));
    }

    if now.abs_diff(issued_at) > tolerance_seconds {
        return Err(StripeError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature("signature mismatch".into()))
    }
}

/// Build a signature header for `payload`, as Stripe would.
///
/// Used by tests and local tooling that replay notifications.
#[must_use]
pub fn signature_header(payload: &str, secret: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={signature}")
}
