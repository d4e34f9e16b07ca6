//! Settlement webhook integration tests.

mod common;

use axum::http::StatusCode;
use common::{checkout_completed, test_config, TestHarness, WEBHOOK_SECRET};
use fractiverse_core::{TransactionStatus, TransactionType, UserId};
use fractiverse_service::stripe::webhook::signature_header;
use fractiverse_store::Store;
use serde_json::json;

#[tokio::test]
async fn completed_checkout_credits_tokens() {
    let harness = TestHarness::new();
    harness.provision().await;

    let response = harness
        .deliver(&checkout_completed("evt_1", harness.user_id, 100))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(harness.balance().await, 100);

    let entry = harness
        .store
        .get_transaction_by_key("evt_1")
        .await
        .unwrap()
        .expect("purchase recorded under the event id");
    assert_eq!(entry.transaction_type, TransactionType::Purchase);
    assert_eq!(entry.status, TransactionStatus::Completed);
    assert_eq!(entry.amount, 100);
}

#[tokio::test]
async fn redelivered_event_credits_once() {
    let harness = TestHarness::new();
    harness.provision().await;
    let event = checkout_completed("evt_1", harness.user_id, 100);

    harness.deliver(&event).await.assert_status_ok();
    harness.deliver(&event).await.assert_status_ok();

    assert_eq!(harness.balance().await, 100);
    assert_eq!(harness.transaction_count().await, 1);
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let harness = TestHarness::new();
    harness.provision().await;
    let payload = checkout_completed("evt_1", harness.user_id, 100).to_string();
    let now = chrono::Utc::now().timestamp();

    let forged = signature_header(&payload, "whsec_attacker", now);
    let stale = signature_header(&payload, WEBHOOK_SECRET, now - 3600);
    for signature in [Some(forged.as_str()), Some(stale.as_str()), Some("garbage"), None] {
        let response = harness.deliver_raw(&payload, signature).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "invalid_signature");
    }

    // Signed for a different body.
    let tampered = payload.replace("\"100\"", "\"100000\"");
    let signature = signature_header(&payload, WEBHOOK_SECRET, now);
    harness
        .deliver_raw(&tampered, Some(&signature))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(harness.balance().await, 0);
    assert_eq!(harness.transaction_count().await, 0);
}

#[tokio::test]
async fn missing_webhook_secret_rejects_everything() {
    let config = fractiverse_service::ServiceConfig {
        stripe_webhook_secret: None,
        ..test_config()
    };
    let harness = TestHarness::with_config(config, true);
    harness.provision().await;

    harness
        .deliver(&checkout_completed("evt_1", harness.user_id, 100))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance().await, 0);
}

#[tokio::test]
async fn unparseable_body_is_a_validation_error() {
    let harness = TestHarness::new();
    let payload = "{\"not\": \"an event\"}";
    let signature = signature_header(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let response = harness.deliver_raw(payload, Some(&signature)).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn malformed_metadata_is_acknowledged_without_credit() {
    let harness = TestHarness::new();
    harness.provision().await;
    let mut event = checkout_completed("evt_1", harness.user_id, 100);
    event["data"]["object"]["metadata"]["token_amount"] = json!("lots");

    harness.deliver(&event).await.assert_status_ok();

    assert_eq!(harness.balance().await, 0);
    assert_eq!(harness.transaction_count().await, 0);
}

#[tokio::test]
async fn unpaid_checkout_is_acknowledged_without_credit() {
    let harness = TestHarness::new();
    harness.provision().await;
    let mut event = checkout_completed("evt_1", harness.user_id, 100);
    event["data"]["object"]["payment_status"] = json!("unpaid");

    harness.deliver(&event).await.assert_status_ok();
    assert_eq!(harness.balance().await, 0);

    // The delayed payment settles later under its own event id.
    let mut settled = checkout_completed("evt_2", harness.user_id, 100);
    settled["type"] = json!("checkout.session.async_payment_succeeded");
    harness.deliver(&settled).await.assert_status_ok();
    assert_eq!(harness.balance().await, 100);
}

#[tokio::test]
async fn settlement_for_unknown_user_asks_for_redelivery() {
    let harness = TestHarness::new();
    let stranger = UserId::generate();

    harness
        .deliver(&checkout_completed("evt_1", stranger, 100))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn embedded_payment_intent_credits_tokens() {
    let harness = TestHarness::new();
    harness.provision().await;
    let event = json!({
        "id": "evt_pi_1",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_test_1",
            "object": "payment_intent",
            "metadata": {
                "user_id": harness.user_id.to_string(),
                "token_amount": "1500",
                "tier": "pro",
                "flow": "embedded"
            }
        }}
    });

    harness.deliver(&event).await.assert_status_ok();
    assert_eq!(harness.balance().await, 1500);
}

#[tokio::test]
async fn hosted_checkout_payment_intent_is_not_credited_twice() {
    let harness = TestHarness::new();
    harness.provision().await;
    harness
        .deliver(&checkout_completed("evt_1", harness.user_id, 100))
        .await
        .assert_status_ok();

    // The intent behind a hosted checkout carries no embedded flow marker.
    let event = json!({
        "id": "evt_pi_2",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_test_2",
            "metadata": {
                "user_id": harness.user_id.to_string(),
                "token_amount": "100"
            }
        }}
    });
    harness.deliver(&event).await.assert_status_ok();

    assert_eq!(harness.balance().await, 100);
}

#[tokio::test]
async fn failed_payment_is_recorded_without_balance_change() {
    let harness = TestHarness::new();
    harness.provision().await;
    let mut event = checkout_completed("evt_fail_1", harness.user_id, 100);
    event["type"] = json!("checkout.session.async_payment_failed");

    harness.deliver(&event).await.assert_status_ok();
    harness.deliver(&event).await.assert_status_ok();

    assert_eq!(harness.balance().await, 0);
    let entry = harness
        .store
        .get_transaction_by_key("evt_fail_1")
        .await
        .unwrap()
        .expect("failure recorded");
    assert_eq!(entry.status, TransactionStatus::Failed);
    assert_eq!(harness.transaction_count().await, 1);
}

#[tokio::test]
async fn failed_payment_for_unknown_user_is_acknowledged() {
    let harness = TestHarness::new();
    let event = json!({
        "id": "evt_fail_2",
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": "pi_test_3",
            "metadata": { "user_id": UserId::generate().to_string() }
        }}
    });

    harness.deliver(&event).await.assert_status_ok();
}

#[tokio::test]
async fn other_event_types_are_acknowledged() {
    let harness = TestHarness::new();
    let event = json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    });

    harness.deliver(&event).await.assert_status_ok();
}
