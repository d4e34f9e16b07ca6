//! User provisioning integration tests.

mod common;

use axum::http::StatusCode;
use common::{bearer, session_token, TestHarness};
use fractiverse_core::UserId;
use serde_json::json;

#[tokio::test]
async fn signup_creates_user_with_zero_balance() {
    let harness = TestHarness::new();
    let (name, value) = harness.auth();

    let response = harness
        .server
        .post("/users")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.user_id.to_string());
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["token_balance"], 0);
}

#[tokio::test]
async fn second_signup_conflicts() {
    let harness = TestHarness::new();
    harness.provision().await;
    let (name, value) = harness.auth();

    let response = harness
        .server
        .post("/users")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn signup_with_a_taken_email_conflicts() {
    let harness = TestHarness::new();
    harness.provision().await;
    let other = UserId::generate();
    let (name, value) = bearer(&session_token(other, Some("ADA@example.com")));

    let response = harness
        .server
        .post("/users")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(body["error"]["message"], "Email already registered");
}

#[tokio::test]
async fn email_from_body_is_used_when_session_has_none() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let (name, value) = bearer(&session_token(user_id, None));

    let response = harness
        .server
        .post("/users")
        .add_header(name, value)
        .json(&json!({ "email": "  Grace@Example.com " }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["email"], "grace@example.com");
}

#[tokio::test]
async fn signup_without_any_email_is_rejected() {
    let harness = TestHarness::new();
    let (name, value) = bearer(&session_token(UserId::generate(), None));

    let response = harness
        .server
        .post("/users")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_me_requires_provisioning() {
    let harness = TestHarness::new();
    let (name, value) = harness.auth();

    let response = harness
        .server
        .get("/users/me")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_not_found();

    harness.provision().await;
    let response = harness.server.get("/users/me").add_header(name, value).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.user_id.to_string());
}

#[tokio::test]
async fn requests_without_valid_session_are_unauthorized() {
    let harness = TestHarness::new();

    harness.server.get("/users/me").await.assert_status_unauthorized();

    let (name, value) = bearer("not-a-jwt");
    harness
        .server
        .get("/users/me")
        .add_header(name, value)
        .await
        .assert_status_unauthorized();
}
