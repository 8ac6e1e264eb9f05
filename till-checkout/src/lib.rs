//! Split-Payment Checkout Orchestrator
//!
//! Client-side engine for collecting an order's total across heterogeneous
//! payment rails (cash, manually entered card, tap-to-pay):
//!
//! - **session**: `CheckoutSession` - validates submissions, executes one
//!   payment at a time, folds results into ledger state
//! - **order_service**: HTTP client for the Order Service (system of record)
//! - **rails**: adapter seam for card-family rails, plus a Stripe REST rail
//! - **config**: environment-driven configuration
//! - **logger**: tracing setup
//!
//! # Data Flow
//!
//! ```text
//! PaymentInput → validate_submission → ValidatedPayment
//!                                          ↓
//!                                   execute_payment
//!                      cash ──────────────┼────────────── card family
//!                        ↓                                     ↓
//!                  add_payment                      create intent → rail
//!                        ↓                          retrieve/confirm
//!                        ↓                                     ↓
//!                        └────── get_payments (authoritative) ─┘
//!                                          ↓
//!                               LedgerState replaced
//! ```
//!
//! The local `LedgerState` is a read-through cache subordinate to the Order
//! Service: after every settled payment the authoritative snapshot is
//! re-fetched, because a shared order may be modified by another terminal.

pub mod config;
pub mod logger;
pub mod order_service;
pub mod rails;
pub mod session;

// Re-exports
pub use config::CheckoutConfig;
pub use logger::{init_logger, setup_environment};
pub use order_service::{HttpOrderService, OrderService, OrderServiceError};
pub use rails::{PaymentRail, RailError, RailIntent, StripeCardRail};
pub use session::{CheckoutSession, PaymentOutcome};

// Re-export shared types for convenience
pub use shared::{
    Amount, ErrorCode, ExecutionError, LedgerPhase, LedgerState, PaymentInput, PaymentMethod,
    PaymentRecord, SyncError, ValidatedPayment, ValidationError,
};
