//! Common test utilities for fractiverse integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use jsonwebtoken::{encode, EncodingKey, Header};

use fractiverse_core::{Transaction, UserId};
use fractiverse_service::stripe::webhook::{signature_header, SIGNATURE_HEADER};
use fractiverse_service::stripe::{CheckoutRequest, CheckoutSession, PaymentIntent};
use fractiverse_service::{create_router, AppState, PaymentProcessor, ServiceConfig, StripeError};
use fractiverse_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const SERVICE_API_KEY: &str = "test-service-key";

/// Payment processor double that records what it was asked for.
#[derive(Default)]
pub struct FakeProcessor {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".into(),
            url: Some("https://checkout.stripe.test/c/pay/cs_test_1".into()),
            payment_status: Some("unpaid".into()),
            amount_total: Some(request.tier.price_cents()),
            client_reference_id: Some(request.user_id.to_string()),
            payment_intent: None,
            metadata: serde_json::Value::Null,
        })
    }

    async fn create_payment_intent(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentIntent, StripeError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(PaymentIntent {
            id: "pi_test_1".into(),
            client_secret: Some("pi_test_1_secret_abc".into()),
            amount: request.tier.price_cents(),
            status: "requires_payment_method".into(),
            metadata: serde_json::Value::Null,
        })
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for seeding and inspection.
    pub store: Arc<MemoryStore>,
    /// The payment processor double.
    pub payments: Arc<FakeProcessor>,
    /// A test user ID for authenticated requests.
    pub user_id: UserId,
    /// The test user's email.
    pub email: String,
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        auth_jwt_secret: Some(JWT_SECRET.into()),
        auth_audience: "authenticated".into(),
        service_api_key: Some(SERVICE_API_KEY.into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        frontend_url: "https://app.fractiverse.test".into(),
        ..ServiceConfig::default()
    }
}

impl TestHarness {
    /// Create a new test harness with an empty store and a fake processor.
    pub fn new() -> Self {
        Self::with_config(test_config(), true)
    }

    /// A harness whose service has no payment processor.
    pub fn without_payments() -> Self {
        Self::with_config(test_config(), false)
    }

    /// A harness whose service talks to the given payment processor.
    pub fn with_processor(processor: Arc<dyn PaymentProcessor>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), test_config()).with_payment_processor(processor);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            store,
            payments: Arc::new(FakeProcessor::default()),
            user_id: UserId::generate(),
            email: "ada@example.com".into(),
        }
    }

    pub fn with_config(config: ServiceConfig, with_payments: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(FakeProcessor::default());

        let mut state = AppState::new(store.clone(), config);
        if with_payments {
            state = state.with_payment_processor(payments.clone());
        }

        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            store,
            payments,
            user_id: UserId::generate(),
            email: "ada@example.com".into(),
        }
    }

    /// Authorization header for the test user.
    pub fn auth(&self) -> (HeaderName, HeaderValue) {
        bearer(&session_token(self.user_id, Some(&self.email)))
    }

    /// Provision the test user through the API.
    pub async fn provision(&self) {
        let (name, value) = self.auth();
        self.server
            .post("/users")
            .add_header(name, value)
            .json(&serde_json::json!({}))
            .await
            .assert_status_ok();
    }

    /// Credit the test user directly in the store.
    pub async fn fund(&self, amount: i64) {
        let purchase = Transaction::purchase(self.user_id, amount, "seed".into());
        self.store.credit(&purchase).await.expect("Failed to fund user");
    }

    /// Current balance, read from the store.
    pub async fn balance(&self) -> i64 {
        self.store
            .get_user(&self.user_id)
            .await
            .expect("store read")
            .expect("user exists")
            .token_balance
    }

    /// Number of ledger entries for the test user.
    pub async fn transaction_count(&self) -> usize {
        self.store
            .list_transactions_by_user(&self.user_id, 1000, 0)
            .await
            .expect("store read")
            .len()
    }

    /// Deliver a correctly signed notification.
    pub async fn deliver(&self, event: &serde_json::Value) -> TestResponse {
        let payload = event.to_string();
        let header = signature_header(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        self.deliver_raw(&payload, Some(&header)).await
    }

    /// Deliver a raw payload with an arbitrary signature header.
    pub async fn deliver_raw(&self, payload: &str, signature: Option<&str>) -> TestResponse {
        let mut request = self.server.post("/webhooks/payment").text(payload);
        if let Some(signature) = signature {
            request = request.add_header(
                HeaderName::from_static(SIGNATURE_HEADER),
                HeaderValue::from_str(signature).unwrap(),
            );
        }
        request.await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a session token the way the hosted auth provider does.
pub fn session_token(user_id: UserId, email: Option<&str>) -> String {
    let claims = serde_json::json!({
        "sub": user_id.to_string(),
        "email": email,
        "aud": "authenticated",
        "role": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

/// A `checkout.session.completed` event as the processor sends it.
pub fn checkout_completed(event_id: &str, user_id: UserId, tokens: i64) -> serde_json::Value {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_status": "paid",
                "client_reference_id": user_id.to_string(),
                "metadata": {
                    "user_id": user_id.to_string(),
                    "token_amount": tokens.to_string(),
                    "tier": "starter"
                }
            }
        }
    })
}
