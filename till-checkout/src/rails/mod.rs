//! Payment rail adapters
//!
//! A rail is a way of physically collecting a card-family payment: a
//! terminal tap, or manually entered card data. Each rail implements the
//! same two-step seam against a staged payment intent: retrieve, then
//! collect-or-confirm. Cash has no rail - it settles locally.

pub mod stripe;

use async_trait::async_trait;
use shared::payment::PaymentMethod;
use thiserror::Error;

pub use stripe::StripeCardRail;

/// Rail-side view of a staged payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailIntent {
    /// Intent id (the external reference attached to the payment record)
    pub id: String,
    pub client_secret: String,
    /// Rail-reported status after the last step
    pub status: String,
}

/// Rail adapter error. The message is what the orchestrator surfaces
/// verbatim to the operator.
#[derive(Debug, Error)]
pub enum RailError {
    /// The rail rejected or failed the payment (declined card, tap timeout, ...)
    #[error("{0}")]
    Adapter(String),

    /// Transport failure reaching the rail backend
    #[error("rail transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A card-family payment rail.
///
/// Implementations wrap an external capability (terminal hardware SDK,
/// card-entry backend). They must be all-or-nothing: an error from either
/// step means no funds moved that this layer needs to account for.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Which method this rail collects
    fn method(&self) -> PaymentMethod;

    /// Load the staged intent from its client secret
    async fn retrieve_intent(&self, client_secret: &str) -> Result<RailIntent, RailError>;

    /// Collect the payment (tap, entered card data) and confirm the intent.
    /// Terminology varies by rail: tap-to-pay collects a physical tap then
    /// confirms; manual card confirms directly.
    async fn collect_or_confirm(&self, intent: RailIntent) -> Result<RailIntent, RailError>;
}
