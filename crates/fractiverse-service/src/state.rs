//! Application state.

use std::sync::Arc;

use fractiverse_store::Store;

use crate::auth::{IdentityProvider, JwtIdentityProvider};
use crate::config::ServiceConfig;
use crate::ledger::Ledger;
use crate::stripe::{PaymentProcessor, StripeClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger, over the injected store handle.
    pub ledger: Ledger,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Identity provider for end-user sessions (optional).
    pub identity: Option<Arc<dyn IdentityProvider>>,

    /// Payment processor for checkout (optional).
    pub payments: Option<Arc<dyn PaymentProcessor>>,
}

impl AppState {
    /// Create a new application state, wiring collaborators from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let identity = config.auth_jwt_secret.as_ref().map(|secret| {
            tracing::info!(audience = %config.auth_audience, "JWT session validation enabled");
            Arc::new(JwtIdentityProvider::new(
                secret,
                &config.auth_audience,
                config.auth_issuer.as_deref(),
            )) as Arc<dyn IdentityProvider>
        });

        if identity.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not set - user endpoints will reject all requests");
        }

        let payments = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!(base_url = %config.stripe_api_base, "Stripe integration enabled");
                    Some(Arc::new(client.with_base_url(&config.stripe_api_base))
                        as Arc<dyn PaymentProcessor>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if payments.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - all notifications will be rejected");
        }

        Self {
            ledger: Ledger::new(store),
            config,
            identity,
            payments,
        }
    }

    /// Replace the identity provider.
    #[must_use]
    pub fn with_identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Replace the payment processor.
    #[must_use]
    pub fn with_payment_processor(mut self, payments: Arc<dyn PaymentProcessor>) -> Self {
        self.payments = Some(payments);
        self
    }
}
