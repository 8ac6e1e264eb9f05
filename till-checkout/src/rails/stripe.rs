//! Stripe manual-card rail via REST API (no SDK dependency)
//!
//! Confirms staged payment intents directly against the Stripe API. Used for
//! the manually-entered-card rail; tap-to-pay goes through terminal hardware
//! and plugs in as its own `PaymentRail` implementation.

use super::{PaymentRail, RailError, RailIntent};
use async_trait::async_trait;
use shared::payment::PaymentMethod;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Intent statuses that mean the charge went through
fn is_settled(status: &str) -> bool {
    matches!(status, "succeeded" | "requires_capture")
}

/// Derive the intent id from a client secret ("pi_123_secret_abc" -> "pi_123")
fn intent_id_from_secret(client_secret: &str) -> Result<&str, RailError> {
    client_secret
        .split_once("_secret")
        .map(|(id, _)| id)
        .ok_or_else(|| RailError::Adapter(format!("malformed client secret: {client_secret}")))
}

/// Manual-card rail confirming Stripe payment intents over REST
pub struct StripeCardRail {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeCardRail {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }

    /// Pull a human-readable error out of a Stripe error response
    fn api_error(resp: &serde_json::Value, fallback: &str) -> RailError {
        let message = resp["error"]["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| format!("{fallback}: {resp}"));
        RailError::Adapter(message)
    }

    fn parse_intent(resp: &serde_json::Value, client_secret: &str) -> Result<RailIntent, RailError> {
        let id = resp["id"]
            .as_str()
            .ok_or_else(|| Self::api_error(resp, "Stripe intent missing id"))?;
        let status = resp["status"]
            .as_str()
            .ok_or_else(|| Self::api_error(resp, "Stripe intent missing status"))?;

        Ok(RailIntent {
            id: id.to_string(),
            client_secret: client_secret.to_string(),
            status: status.to_string(),
        })
    }
}

#[async_trait]
impl PaymentRail for StripeCardRail {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    async fn retrieve_intent(&self, client_secret: &str) -> Result<RailIntent, RailError> {
        let id = intent_id_from_secret(client_secret)?;
        let resp: serde_json::Value = self
            .client
            .get(format!("{STRIPE_API_BASE}/payment_intents/{id}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[("client_secret", client_secret)])
            .send()
            .await?
            .json()
            .await?;

        Self::parse_intent(&resp, client_secret)
    }

    async fn collect_or_confirm(&self, intent: RailIntent) -> Result<RailIntent, RailError> {
        let resp: serde_json::Value = self
            .client
            .post(format!(
                "{STRIPE_API_BASE}/payment_intents/{}/confirm",
                intent.id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("client_secret", intent.client_secret.as_str())])
            .send()
            .await?
            .json()
            .await?;

        let confirmed = Self::parse_intent(&resp, &intent.client_secret)?;
        if !is_settled(&confirmed.status) {
            return Err(RailError::Adapter(format!(
                "payment intent {} not settled (status: {})",
                confirmed.id, confirmed.status
            )));
        }
        Ok(confirmed)
    }
}
