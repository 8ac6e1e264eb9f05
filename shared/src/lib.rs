//! Shared types for the till checkout workspace
//!
//! Domain types used across crates: minor-unit money, payment records,
//! derived ledger state, the error taxonomy, and Order Service wire DTOs.

pub mod dto;
pub mod error;
pub mod ledger;
pub mod money;
pub mod payment;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use dto::{AddPaymentRequest, CreateIntentRequest, CreateIntentResponse, GetPaymentsResponse};
pub use error::{ErrorCode, ExecutionError, SyncError, ValidationError};
pub use ledger::{LedgerPhase, LedgerState};
pub use money::{Amount, AmountParseError, CARD_MINIMUM};
pub use payment::{
    PaymentInput, PaymentMethod, PaymentRecord, PaymentSummaryItem, ValidatedPayment,
};
