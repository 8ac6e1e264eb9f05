//! Error taxonomy for the checkout orchestrator
//!
//! Three families, by where they resolve:
//! - `ValidationError`: local, no I/O performed, operator corrects and retries
//! - `ExecutionError`: a rail or Order Service call failed mid-execution
//! - `SyncError`: the authoritative refetch after a settled payment failed
//!
//! Errors are returned as typed results, never panicked across the
//! orchestrator boundary. Each carries a stable wire code so the
//! presentation layer can localize without parsing messages.

use crate::money::Amount;
use crate::payment::PaymentMethod;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes for the presentation layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAmount,
    AmountExceedsBalance,
    BelowRailMinimum,
    InsufficientCash,
    OrderAlreadyComplete,
    SubmissionInProgress,
    IntentCreationFailed,
    RailAdapterFailed,
    PaymentRegistrationFailed,
    SyncFailed,
}

/// Rejections from submission validation. No I/O has happened and the
/// ledger is untouched; all variants are recoverable by correcting input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payment amount must be positive")]
    InvalidAmount,

    #[error("payment amount ({amount}) exceeds remaining balance; maximum allowed is {max_allowed}")]
    AmountExceedsBalance { amount: Amount, max_allowed: Amount },

    #[error("{method} payments require at least {minimum}; collect small amounts in cash")]
    BelowRailMinimum {
        method: PaymentMethod,
        minimum: Amount,
    },

    #[error("cash tendered ({tendered}) is less than the payment amount ({amount})")]
    InsufficientCash { tendered: Amount, amount: Amount },

    #[error("order is already fully paid")]
    OrderAlreadyComplete,

    #[error("another payment for this order is still in flight")]
    SubmissionInProgress,
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::InvalidAmount => ErrorCode::InvalidAmount,
            ValidationError::AmountExceedsBalance { .. } => ErrorCode::AmountExceedsBalance,
            ValidationError::BelowRailMinimum { .. } => ErrorCode::BelowRailMinimum,
            ValidationError::InsufficientCash { .. } => ErrorCode::InsufficientCash,
            ValidationError::OrderAlreadyComplete => ErrorCode::OrderAlreadyComplete,
            ValidationError::SubmissionInProgress => ErrorCode::SubmissionInProgress,
        }
    }
}

/// Failures during payment execution. On any variant except
/// `PaymentRegistrationFailed` no money moved and no record was created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to create payment intent: {0}")]
    IntentCreationFailed(String),

    /// The rail adapter's own message, surfaced verbatim
    #[error("payment rail failed: {0}")]
    RailAdapterFailed(String),

    /// The rail confirmed the charge but recording it with the Order Service
    /// failed. Money may have moved without a ledger entry - the operator
    /// must reconcile manually against `intent_id`, never re-charge.
    #[error("payment settled on the rail (intent {intent_id}) but could not be recorded: {message}")]
    PaymentRegistrationFailed { intent_id: String, message: String },
}

impl ExecutionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecutionError::Validation(e) => e.code(),
            ExecutionError::IntentCreationFailed(_) => ErrorCode::IntentCreationFailed,
            ExecutionError::RailAdapterFailed(_) => ErrorCode::RailAdapterFailed,
            ExecutionError::PaymentRegistrationFailed { .. } => {
                ErrorCode::PaymentRegistrationFailed
            }
        }
    }
}

/// The post-submission refetch of authoritative ledger state failed.
/// The payment itself settled; local state is kept but may be stale.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("failed to refresh ledger from the order service: {0}")]
    Refetch(String),
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::SyncFailed
    }
}
