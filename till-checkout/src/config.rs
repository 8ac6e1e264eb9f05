//! Checkout configuration

use shared::money::{Amount, CARD_MINIMUM};

/// Orchestrator configuration - everything the checkout engine needs to
/// reach its collaborators.
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ORDER_SERVICE_URL | http://localhost:3000 | Order Service base URL |
/// | ORDER_SERVICE_TOKEN | (none) | Bearer token for the Order Service |
/// | REQUEST_TIMEOUT_SECS | 30 | HTTP request timeout in seconds |
/// | CARD_MINIMUM_MINOR | 50 | Minimum non-cash amount in minor units |
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Order Service base URL (e.g. "http://localhost:3000")
    pub order_service_url: String,
    /// Bearer token for the Order Service, if required
    pub order_service_token: Option<String>,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Minimum amount accepted on card-family rails; below this only cash
    pub card_minimum: Amount,
}

impl CheckoutConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            order_service_url: std::env::var("ORDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            order_service_token: std::env::var("ORDER_SERVICE_TOKEN").ok(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            card_minimum: std::env::var("CARD_MINIMUM_MINOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Amount::from_minor)
                .unwrap_or(CARD_MINIMUM),
        }
    }

    /// Point at a specific Order Service URL, keeping other defaults.
    /// Mostly for tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            order_service_url: base_url.into(),
            order_service_token: None,
            request_timeout_secs: 30,
            card_minimum: CARD_MINIMUM,
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self::with_base_url("http://localhost:3000")
    }
}
