//! Payment rails and payment records

use crate::money::Amount;
use serde::{Deserialize, Serialize};

/// Payment collection method (rail)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash drawer - settled locally, no external confirmation
    Cash,
    /// Manually entered card
    Card,
    /// Card-present / contactless via terminal hardware
    TapToPay,
}

impl PaymentMethod {
    /// Whether this rail needs a server-side payment intent before funds move
    pub fn requires_intent(self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::TapToPay => "TAP_TO_PAY",
        };
        f.write_str(name)
    }
}

/// Payment input as collected from the operator, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount: Amount,
    /// Cash handed over by the customer (cash rail only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tendered: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PaymentInput {
    pub fn new(method: PaymentMethod, amount: Amount) -> Self {
        Self {
            method,
            amount,
            tendered: None,
            note: None,
        }
    }

    pub fn cash(amount: Amount, tendered: Amount) -> Self {
        Self {
            method: PaymentMethod::Cash,
            amount,
            tendered: Some(tendered),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A payment input that passed submission validation, ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    pub method: PaymentMethod,
    pub amount: Amount,
    pub tendered: Option<Amount>,
    pub note: Option<String>,
}

impl ValidatedPayment {
    /// Change due for cash payments. Advisory display data, not a ledger field.
    pub fn change(&self) -> Option<Amount> {
        self.tendered
            .map(|t| t.saturating_sub_floor_zero(self.amount))
    }
}

/// A settled contribution toward an order. Immutable once created;
/// refunds and voids are separate operations outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub method: PaymentMethod,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_tendered: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Rail-side reference (e.g. payment intent id) for reconciliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    /// Unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

/// Per-method total for the completed-order display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummaryItem {
    pub method: PaymentMethod,
    pub amount: Amount,
}
