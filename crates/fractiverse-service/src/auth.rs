//! Authentication: the identity-provider seam and request extractors.
//!
//! This module provides:
//! - `IdentityProvider` - turns a session credential into an [`Identity`]
//! - `JwtIdentityProvider` - validates the hosted auth provider's HS256 tokens
//! - `AuthUser` - end-user extractor (`Authorization: Bearer <token>`)
//! - `ServiceAuth` - service-to-service extractor (`X-Api-Key`)

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use fractiverse_core::UserId;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Who a request is made by, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The user ID.
    pub user_id: UserId,
    /// Email address, if the session carries one.
    pub email: Option<String>,
}

/// The identity provider collaborator.
///
/// The ledger trusts whatever identity it returns.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session credential.
    ///
    /// Returns `ApiError::Unauthorized` for missing, expired or forged
    /// credentials.
    async fn authenticate(&self, token: &str) -> Result<Identity, ApiError>;
}

/// JWT claims issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID, a UUID).
    pub sub: String,
    /// Email of the signed-in user.
    #[serde(default)]
    pub email: Option<String>,
    /// Audience (string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Expiration time.
    pub exp: i64,
}

/// Validates HS256 session tokens with the provider's shared secret.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Create a provider that accepts tokens signed with `secret` for
    /// `audience`, and, if given, issued by `issuer`.
    #[must_use]
    pub fn new(secret: &str, audience: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Identity, ApiError> {
        let token_data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })?;

        let claims = token_data.claims;
        let user_id = claims.sub.parse::<UserId>().map_err(|_| {
            tracing::debug!(sub = %claims.sub, "JWT subject is not a user id");
            ApiError::Unauthorized
        })?;

        Ok(Identity {
            user_id,
            email: claims.email,
        })
    }
}

/// An authenticated end user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Email from the session, if any.
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let Some(identity_provider) = &state.identity else {
            tracing::warn!("Identity provider not configured - rejecting request");
            return Err(ApiError::Unauthorized);
        };

        let identity = identity_provider.authenticate(token).await?;

        Ok(Self {
            user_id: identity.user_id,
            email: identity.email,
        })
    }
}

/// Service authentication via API key.
///
/// Used for service-to-service requests (e.g. the chat backend refunding
/// tokens for a failed generation).
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The service name or identifier.
    pub service_name: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let Some(expected_key) = state.config.service_api_key.as_ref() else {
            tracing::warn!("Service request rejected: SERVICE_API_KEY is not configured");
            return Err(ApiError::Forbidden);
        };

        if !constant_time_eq(api_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let service_name = parts
            .headers
            .get("x-service-name")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { service_name })
    }
}
