//! FractiVerse HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use fractiverse_core::TokenTier;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, CheckoutMode, CheckoutRequest, CheckoutResponse,
    MutationResponse, RefundRequest, TransactionPage, UseTokensRequest,
};

/// FractiVerse token API client.
///
/// End-user calls take the user's session token; the refund call uses the
/// service API key from [`ClientOptions`].
#[derive(Debug, Clone)]
pub struct FractiverseClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    service_name: String,
}

impl FractiverseClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"http://fractiverse:8080"`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: options.api_key,
            service_name: options.service_name,
        })
    }

    /// Get the user's current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn balance(&self, session_token: &str) -> Result<BalanceResponse, ClientError> {
        let request = self.client.get(self.url("/tokens/balance"));
        self.send(Self::bearer(request, session_token)).await
    }

    /// Spend tokens on behalf of the user.
    ///
    /// A timed-out call may still have been applied; retry only with an
    /// idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the balance does not cover the amount,
    /// `DuplicateEvent` if the idempotency key was already used, or another
    /// error if the request fails.
    pub async fn use_tokens(
        &self,
        session_token: &str,
        request: &UseTokensRequest,
    ) -> Result<MutationResponse, ClientError> {
        let builder = self.client.post(self.url("/tokens/use")).json(request);
        let response: MutationResponse = self.send(Self::bearer(builder, session_token)).await?;

        tracing::debug!(
            amount = request.amount,
            new_balance = response.new_balance,
            "Tokens used"
        );
        Ok(response)
    }

    /// List the user's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn transactions(
        &self,
        session_token: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, ClientError> {
        let builder = self
            .client
            .get(self.url("/tokens/transactions"))
            .query(&[("limit", limit), ("offset", offset)]);
        self.send(Self::bearer(builder, session_token)).await
    }

    /// Start a token purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn checkout(
        &self,
        session_token: &str,
        tier: TokenTier,
        mode: CheckoutMode,
    ) -> Result<CheckoutResponse, ClientError> {
        let builder = self
            .client
            .post(self.url("/checkout"))
            .json(&CheckoutRequest { tier, mode });
        self.send(Self::bearer(builder, session_token)).await
    }

    /// Return tokens to a user (service-to-service).
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no service API key was configured, or an
    /// error if the request fails.
    pub async fn refund(&self, request: &RefundRequest) -> Result<MutationResponse, ClientError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ClientError::Configuration("refunds require a service API key".into())
        })?;

        let builder = self
            .client
            .post(self.url("/tokens/refund"))
            .header("x-api-key", api_key)
            .header("x-service-name", &self.service_name)
            .json(request);
        self.send(builder).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(builder: RequestBuilder, session_token: &str) -> RequestBuilder {
        builder.header("authorization", format!("Bearer {session_token}"))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = builder.send().await?;
        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let detail = |key: &str| {
                    api_error
                        .error
                        .details
                        .as_ref()
                        .and_then(|d| d.get(key))
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0)
                };

                match api_error.error.code.as_str() {
                    "insufficient_balance" => Err(ClientError::InsufficientBalance {
                        balance: detail("balance"),
                        required: detail("required"),
                    }),
                    "duplicate_event" => Err(ClientError::DuplicateEvent {
                        message: api_error.error.message,
                    }),
                    "not_found" => Err(ClientError::UserNotFound),
                    "unauthorized" => Err(ClientError::Unauthorized),
                    code => Err(ClientError::Api {
                        code: code.to_string(),
                        message: api_error.error.message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service API key, needed for refunds.
    pub api_key: Option<String>,
    /// Service name to include in service requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            api_key: None,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Options for a backend service holding an API key.
    #[must_use]
    pub fn for_service(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            service_name: name.into(),
            ..Self::default()
        }
    }
}
