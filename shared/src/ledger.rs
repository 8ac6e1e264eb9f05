//! Derived ledger state for a split-payment order
//!
//! The ledger is never stored: it is recomputed from the order's total due
//! and its payment list, and replaced wholesale by the Order Service's
//! authoritative snapshot after every submission.

use crate::money::Amount;
use crate::payment::{PaymentRecord, PaymentSummaryItem};
use serde::{Deserialize, Serialize};

/// Client-side view of where the checkout stands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerPhase {
    /// Accepting payments, remaining balance above zero
    #[default]
    Collecting,
    /// Fully paid. Terminal - never re-opened
    Complete,
    /// A payment settled but the authoritative refetch failed;
    /// local state may be stale until a resync succeeds
    NeedsResync,
}

/// Derived totals for an order: payments plus the balances they imply.
///
/// Invariant: `total_paid == sum(payments.amount)` and
/// `remaining_balance == total_due - total_paid`, always. Overpayment is
/// rejected at submission time rather than clamped here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub total_due: Amount,
    pub payments: Vec<PaymentRecord>,
    pub total_paid: Amount,
    pub remaining_balance: Amount,
}

impl LedgerState {
    /// Derive ledger state from the payment list. Pure, no I/O.
    pub fn compute(total_due: Amount, payments: Vec<PaymentRecord>) -> Self {
        let total_paid: Amount = payments.iter().map(|p| p.amount).sum();
        Self {
            total_due,
            total_paid,
            remaining_balance: total_due - total_paid,
            payments,
        }
    }

    /// Fresh ledger with no payments: everything is still due
    pub fn empty(total_due: Amount) -> Self {
        Self::compute(total_due, Vec::new())
    }

    /// An order is complete iff nothing remains due
    pub fn is_complete(&self) -> bool {
        self.remaining_balance <= Amount::ZERO
    }

    /// Per-method totals, in first-seen order, for the receipt footer
    pub fn summary(&self) -> Vec<PaymentSummaryItem> {
        let mut items: Vec<PaymentSummaryItem> = Vec::new();
        for payment in &self.payments {
            match items.iter_mut().find(|i| i.method == payment.method) {
                Some(item) => item.amount = item.amount + payment.amount,
                None => items.push(PaymentSummaryItem {
                    method: payment.method,
                    amount: payment.amount,
                }),
            }
        }
        items
    }
}
