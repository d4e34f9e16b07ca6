//! Client SDK tests against a stubbed service.

use fractiverse_client::{
    CheckoutMode, CheckoutResponse, ClientError, ClientOptions, FractiverseClient, RefundRequest,
    UseTokensRequest,
};
use fractiverse_core::{TokenTier, TransactionType};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "session-token";

fn error_body(code: &str, message: &str, details: Option<serde_json::Value>) -> serde_json::Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    json!({ "error": error })
}

#[tokio::test]
async fn balance_sends_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokens/balance"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 70 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();
    let balance = client.balance(TOKEN).await.unwrap();

    assert_eq!(balance.balance, 70);
}

#[tokio::test]
async fn use_tokens_posts_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/use"))
        .and(body_json(json!({
            "amount": 30,
            "description": "chat message",
            "idempotency_key": "msg-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "new_balance": 70,
            "transaction_id": "01J9Z7Q4K8V3M2N1P0R5S6T7U8"
        })))
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();
    let spent = client
        .use_tokens(
            TOKEN,
            &UseTokensRequest::new(30, "chat message").with_idempotency_key("msg-1"),
        )
        .await
        .unwrap();

    assert_eq!(spent.new_balance, 70);
}

#[tokio::test]
async fn insufficient_balance_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/use"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_body(
            "insufficient_balance",
            "Insufficient token balance: 70 available, 1000 required",
            Some(json!({ "balance": 70, "required": 1000 })),
        )))
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();
    let err = client
        .use_tokens(TOKEN, &UseTokensRequest::new(1000, "chat message"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::InsufficientBalance {
            balance: 70,
            required: 1000
        }
    ));
}

#[tokio::test]
async fn error_codes_map_to_variants() {
    let server = MockServer::start().await;
    Mock::given(path("/tokens/balance"))
        .and(header("authorization", "Bearer unknown-user"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_body("not_found", "User not found", None)),
        )
        .mount(&server)
        .await;
    Mock::given(path("/tokens/balance"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body(
            "unauthorized",
            "Authentication required",
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(path("/tokens/use"))
        .respond_with(ResponseTemplate::new(409).set_body_json(error_body(
            "duplicate_event",
            "already processed",
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(path("/tokens/transactions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();

    assert!(matches!(
        client.balance("unknown-user").await,
        Err(ClientError::UserNotFound)
    ));
    assert!(matches!(
        client.balance("expired").await,
        Err(ClientError::Unauthorized)
    ));
    assert!(matches!(
        client
            .use_tokens(TOKEN, &UseTokensRequest::new(1, "x").with_idempotency_key("k"))
            .await,
        Err(ClientError::DuplicateEvent { .. })
    ));
    assert!(matches!(
        client.transactions(TOKEN, 10, 0).await,
        Err(ClientError::Api { status: 502, .. })
    ));
}

#[tokio::test]
async fn transactions_are_paged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokens/transactions"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [{
                "id": "01J9Z7Q4K8V3M2N1P0R5S6T7U8",
                "type": "USE",
                "amount": 30,
                "description": "chat message",
                "status": "COMPLETED",
                "created_at": "2026-10-19T09:00:00+00:00"
            }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();
    let page = client.transactions(TOKEN, 2, 4).await.unwrap();

    assert_eq!(page.transactions.len(), 1);
    assert_eq!(page.transactions[0].transaction_type, TransactionType::Use);
    assert!(!page.has_more);
}

#[tokio::test]
async fn checkout_returns_either_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkout"))
        .and(body_json(json!({ "tier": "pro", "mode": "embedded" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_secret": "pi_1_secret",
            "payment_intent_id": "pi_1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/checkout"))
        .and(body_json(json!({ "tier": "starter", "mode": "redirect" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "redirect_url": "https://checkout.example/cs_1",
            "session_id": "cs_1"
        })))
        .mount(&server)
        .await;

    let client = FractiverseClient::new(server.uri()).unwrap();

    assert_eq!(
        client
            .checkout(TOKEN, TokenTier::Pro, CheckoutMode::Embedded)
            .await
            .unwrap(),
        CheckoutResponse::Embedded {
            client_secret: "pi_1_secret".into(),
            payment_intent_id: "pi_1".into(),
        }
    );
    assert!(matches!(
        client
            .checkout(TOKEN, TokenTier::Starter, CheckoutMode::default())
            .await
            .unwrap(),
        CheckoutResponse::Redirect { .. }
    ));
}

#[tokio::test]
async fn refund_uses_service_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/refund"))
        .and(header("x-api-key", "svc-key"))
        .and(header("x-service-name", "chat-backend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "new_balance": 45,
            "transaction_id": "01J9Z7Q4K8V3M2N1P0R5S6T7U9"
        })))
        .mount(&server)
        .await;

    let request = RefundRequest {
        user_id: "5f0c6a4e-0b7e-4d8e-9b1a-2f4c1d3e5a6b".into(),
        amount: 15,
        description: "generation failed".into(),
        idempotency_key: Some("gen-7".into()),
    };

    let without_key = FractiverseClient::new(server.uri()).unwrap();
    assert!(matches!(
        without_key.refund(&request).await,
        Err(ClientError::Configuration(_))
    ));

    let client = FractiverseClient::with_options(
        server.uri(),
        ClientOptions::for_service("chat-backend", "svc-key"),
    )
    .unwrap();
    assert_eq!(client.refund(&request).await.unwrap().new_balance, 45);
}
