//! Order Service client
//!
//! The Order Service is the system of record for orders and payments. The
//! orchestrator talks to it through the `OrderService` trait so tests and
//! alternative transports can stand in for the HTTP client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::dto::{
    AddPaymentRequest, CreateIntentRequest, CreateIntentResponse, GetPaymentsResponse,
};
use thiserror::Error;

/// Order Service error type
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Order or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server rejected the request
    #[error("Order service error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Result type for Order Service operations
pub type ServiceResult<T> = Result<T, OrderServiceError>;

/// The three calls the orchestrator makes against the system of record
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Stage a payment intent for a card-family rail, scoped to the order
    async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> ServiceResult<CreateIntentResponse>;

    /// Register one settled payment against the order
    async fn add_payment(&self, order_id: &str, request: &AddPaymentRequest) -> ServiceResult<()>;

    /// Fetch the authoritative payment list and balances for the order
    async fn get_payments(&self, order_id: &str) -> ServiceResult<GetPaymentsResponse>;
}

/// HTTP implementation of `OrderService`
#[derive(Debug, Clone)]
pub struct HttpOrderService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpOrderService {
    /// Create a client from configuration
    pub fn new(config: &crate::config::CheckoutConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.order_service_url.clone(),
            token: config.order_service_token.clone(),
        }
    }

    /// Set the authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(auth) = self.auth_header() {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        Self::handle_response(request.send().await?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let mut request = self.client.get(self.url(path));
        if let Some(auth) = self.auth_header() {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        Self::handle_response(request.send().await?).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ServiceResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => OrderServiceError::Unauthorized,
                StatusCode::NOT_FOUND => OrderServiceError::NotFound(text),
                _ => OrderServiceError::Api {
                    status: status.as_u16(),
                    message: text,
                },
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| OrderServiceError::InvalidResponse(format!("{e}: {text}")))
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> ServiceResult<CreateIntentResponse> {
        self.post_json("payment-intents", request).await
    }

    async fn add_payment(&self, order_id: &str, request: &AddPaymentRequest) -> ServiceResult<()> {
        // The endpoint returns an empty body on success
        let mut req = self
            .client
            .post(self.url(&format!("orders/{order_id}/payments")))
            .json(request);
        if let Some(auth) = self.auth_header() {
            req = req.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => OrderServiceError::Unauthorized,
                StatusCode::NOT_FOUND => OrderServiceError::NotFound(text),
                _ => OrderServiceError::Api {
                    status: status.as_u16(),
                    message: text,
                },
            });
        }
        Ok(())
    }

    async fn get_payments(&self, order_id: &str) -> ServiceResult<GetPaymentsResponse> {
        self.get_json(&format!("orders/{order_id}/payments")).await
    }
}
