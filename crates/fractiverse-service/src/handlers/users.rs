//! User provisioning handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use fractiverse_core::User;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// User response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    pub email: String,
    /// Spendable tokens.
    pub token_balance: i64,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            token_balance: user.token_balance,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Create user request.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Email, used when the session does not carry one.
    pub email: Option<String>,
}

/// Provision the authenticated user on first signup.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(body) = body?;

    // The session's email wins over the body's.
    let email = auth
        .email
        .or(body.email)
        .ok_or_else(|| ApiError::Validation("email is required".into()))?;

    let user = state.ledger.create_user(auth.user_id, &email).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Get the authenticated user.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.ledger.get_user(auth.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}
