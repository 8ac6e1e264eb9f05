//! Wire DTOs for the Order Service REST API
//!
//! Amounts are integer minor units everywhere; field names are camelCase on
//! the wire. The Order Service is the system of record - these types only
//! describe its request/response shapes.

use crate::money::Amount;
use crate::payment::{PaymentMethod, PaymentRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request a staged payment intent for a card-family rail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl CreateIntentRequest {
    pub fn for_order(order_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            amount,
            order_id: Some(order_id.into()),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_account_id: Option<String>,
}

/// Register one settled payment against an order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentRequest {
    pub payment_method: PaymentMethod,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_tendered: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Authoritative post-submission snapshot of an order's payments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPaymentsResponse {
    pub payments: Vec<PaymentRecord>,
    pub total_paid: Amount,
    pub remaining_balance: Amount,
}
