//! Checkout session - the split-payment orchestrator
//!
//! One session per order being charged. The session validates each payment
//! attempt against the remaining balance, executes it on the chosen rail,
//! and folds the result into ledger state. At most one payment is in flight
//! at a time; the session defensively rejects concurrent submissions even
//! though the presentation layer is expected to disable them.
//!
//! The session never owns durable state. After every settled payment it
//! re-fetches the authoritative snapshot from the Order Service, because a
//! shared order may be modified by another terminal.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared::dto::{AddPaymentRequest, CreateIntentRequest};
use shared::error::{ExecutionError, SyncError, ValidationError};
use shared::ledger::{LedgerPhase, LedgerState};
use shared::money::Amount;
use shared::payment::{PaymentInput, PaymentMethod, PaymentRecord, ValidatedPayment};

use crate::order_service::OrderService;
use crate::rails::PaymentRail;

/// Result of one executed payment
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// The settled payment
    pub payment: PaymentRecord,
    /// Change due back to the customer (cash only). Advisory display data,
    /// never part of the ledger invariants.
    pub change: Option<Amount>,
    /// Ledger after this payment. Authoritative unless `stale` is set.
    pub ledger: LedgerState,
    /// Set when the post-submission refetch failed and `ledger` is the
    /// best-known local estimate
    pub stale: Option<SyncError>,
}

struct SessionState {
    phase: LedgerPhase,
    ledger: LedgerState,
}

/// Clears the in-flight flag when execution finishes, on every path
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Split-payment orchestrator for a single order
pub struct CheckoutSession {
    order_id: String,
    card_minimum: Amount,
    service: Arc<dyn OrderService>,
    rails: HashMap<PaymentMethod, Arc<dyn PaymentRail>>,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
}

impl CheckoutSession {
    /// Open a session for an order with a fixed total due
    pub fn new(
        order_id: impl Into<String>,
        total_due: Amount,
        service: Arc<dyn OrderService>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            card_minimum: shared::money::CARD_MINIMUM,
            service,
            rails: HashMap::new(),
            state: Mutex::new(SessionState {
                phase: LedgerPhase::Collecting,
                ledger: LedgerState::empty(total_due),
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Register a rail adapter for its method
    pub fn with_rail(mut self, rail: Arc<dyn PaymentRail>) -> Self {
        self.rails.insert(rail.method(), rail);
        self
    }

    /// Override the non-cash minimum (from `CheckoutConfig::card_minimum`)
    pub fn with_card_minimum(mut self, minimum: Amount) -> Self {
        self.card_minimum = minimum;
        self
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Current ledger snapshot
    pub fn state(&self) -> LedgerState {
        self.lock_state().ledger.clone()
    }

    pub fn phase(&self) -> LedgerPhase {
        self.lock_state().phase
    }

    /// `true` iff nothing remains due. One-way: adding payments never
    /// un-completes an order.
    pub fn is_order_complete(&self) -> bool {
        let state = self.lock_state();
        state.phase == LedgerPhase::Complete || state.ledger.is_complete()
    }

    /// Validate one payment attempt against the current ledger.
    ///
    /// Pure with respect to I/O: no network or rail calls. Checks run in
    /// order and the first failure wins. The ledger is untouched either way.
    pub fn validate_submission(
        &self,
        input: &PaymentInput,
    ) -> Result<ValidatedPayment, ValidationError> {
        let state = self.lock_state();

        if state.phase == LedgerPhase::Complete || state.ledger.is_complete() {
            return Err(ValidationError::OrderAlreadyComplete);
        }
        if self.in_flight.load(Ordering::Acquire) {
            return Err(ValidationError::SubmissionInProgress);
        }

        if !input.amount.is_positive() {
            return Err(ValidationError::InvalidAmount);
        }

        let remaining = state.ledger.remaining_balance;
        if input.amount > remaining {
            return Err(ValidationError::AmountExceedsBalance {
                amount: input.amount,
                max_allowed: remaining,
            });
        }

        if input.method.requires_intent() && input.amount < self.card_minimum {
            return Err(ValidationError::BelowRailMinimum {
                method: input.method,
                minimum: self.card_minimum,
            });
        }

        let tendered = match input.method {
            PaymentMethod::Cash => {
                let tendered = input.tendered.unwrap_or(Amount::ZERO);
                if tendered < input.amount {
                    return Err(ValidationError::InsufficientCash {
                        tendered,
                        amount: input.amount,
                    });
                }
                Some(tendered)
            }
            // Tendered is meaningless off the cash rail; normalize it away
            _ => None,
        };

        Ok(ValidatedPayment {
            method: input.method,
            amount: input.amount,
            tendered,
            note: input.note.clone(),
        })
    }

    /// Execute one validated payment on its rail and fold the result into
    /// ledger state.
    ///
    /// On any rail or intent failure no payment record is created and the
    /// ledger is unchanged. On success the authoritative snapshot is
    /// re-fetched; if that refetch fails the payment is kept locally and the
    /// outcome carries a staleness warning.
    pub async fn execute_payment(
        &self,
        validated: ValidatedPayment,
    ) -> Result<PaymentOutcome, ExecutionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ValidationError::SubmissionInProgress.into());
        }
        let _guard = FlightGuard(&self.in_flight);

        // The balance may have moved since validation (another terminal)
        if self.lock_state().ledger.is_complete() {
            return Err(ValidationError::OrderAlreadyComplete.into());
        }

        let record = match validated.method {
            PaymentMethod::Cash => self.settle_cash(&validated).await?,
            PaymentMethod::Card | PaymentMethod::TapToPay => {
                self.settle_on_rail(&validated).await?
            }
        };

        tracing::info!(
            order_id = %self.order_id,
            payment_id = %record.id,
            method = %record.method,
            amount = %record.amount,
            "payment settled"
        );

        Ok(self.fold_settled_payment(record).await)
    }

    /// Refetch the authoritative ledger, recovering from `NeedsResync`.
    /// On failure the best-known local state is kept.
    pub async fn resync(&self) -> Result<LedgerState, SyncError> {
        match self.service.get_payments(&self.order_id).await {
            Ok(snapshot) => {
                let mut state = self.lock_state();
                let total_due = state.ledger.total_due;
                state.ledger = LedgerState {
                    total_due,
                    payments: snapshot.payments,
                    total_paid: snapshot.total_paid,
                    remaining_balance: snapshot.remaining_balance,
                };
                state.phase = next_phase(state.phase, &state.ledger);
                Ok(state.ledger.clone())
            }
            Err(e) => {
                tracing::warn!(order_id = %self.order_id, error = %e, "ledger resync failed");
                Err(SyncError::Refetch(e.to_string()))
            }
        }
    }

    /// Cash settles locally: the only external step is recording it.
    /// A recording failure means nothing was registered; the operator
    /// simply retries.
    async fn settle_cash(
        &self,
        validated: &ValidatedPayment,
    ) -> Result<PaymentRecord, ExecutionError> {
        let request = AddPaymentRequest {
            payment_method: PaymentMethod::Cash,
            amount: validated.amount,
            cash_tendered: validated.tendered,
            stripe_payment_intent_id: None,
            note: validated.note.clone(),
        };

        self.service
            .add_payment(&self.order_id, &request)
            .await
            .map_err(|e| ExecutionError::RailAdapterFailed(e.to_string()))?;

        Ok(self.local_record(validated, None))
    }

    /// Card-family settlement: create intent, hand it to the rail
    /// (retrieve, then collect-or-confirm), then register the payment.
    async fn settle_on_rail(
        &self,
        validated: &ValidatedPayment,
    ) -> Result<PaymentRecord, ExecutionError> {
        let rail = self.rails.get(&validated.method).ok_or_else(|| {
            ExecutionError::RailAdapterFailed(format!(
                "no rail adapter registered for {}",
                validated.method
            ))
        })?;

        let intent = self
            .service
            .create_payment_intent(&CreateIntentRequest::for_order(
                self.order_id.as_str(),
                validated.amount,
            ))
            .await
            .map_err(|e| ExecutionError::IntentCreationFailed(e.to_string()))?;

        let retrieved = rail
            .retrieve_intent(&intent.client_secret)
            .await
            .map_err(|e| ExecutionError::RailAdapterFailed(e.to_string()))?;

        let confirmed = rail
            .collect_or_confirm(retrieved)
            .await
            .map_err(|e| ExecutionError::RailAdapterFailed(e.to_string()))?;

        let request = AddPaymentRequest {
            payment_method: validated.method,
            amount: validated.amount,
            cash_tendered: None,
            stripe_payment_intent_id: Some(confirmed.id.clone()),
            note: validated.note.clone(),
        };

        if let Err(e) = self.service.add_payment(&self.order_id, &request).await {
            // Money moved on the rail but the ledger has no record of it.
            // Must be reconciled manually against the intent, never re-charged.
            tracing::error!(
                order_id = %self.order_id,
                intent_id = %confirmed.id,
                error = %e,
                "payment settled on rail but registration failed; manual reconciliation required"
            );
            return Err(ExecutionError::PaymentRegistrationFailed {
                intent_id: confirmed.id,
                message: e.to_string(),
            });
        }

        Ok(self.local_record(validated, Some(confirmed.id)))
    }

    /// Replace local state with the authoritative snapshot; fall back to an
    /// optimistic local append when the refetch fails.
    async fn fold_settled_payment(&self, record: PaymentRecord) -> PaymentOutcome {
        let change = record.change;

        match self.service.get_payments(&self.order_id).await {
            Ok(snapshot) => {
                let mut state = self.lock_state();
                let total_due = state.ledger.total_due;
                state.ledger = LedgerState {
                    total_due,
                    payments: snapshot.payments,
                    total_paid: snapshot.total_paid,
                    remaining_balance: snapshot.remaining_balance,
                };
                state.phase = next_phase(state.phase, &state.ledger);

                PaymentOutcome {
                    payment: record,
                    change,
                    ledger: state.ledger.clone(),
                    stale: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %self.order_id,
                    error = %e,
                    "authoritative refetch failed after settled payment; ledger may be stale"
                );
                let mut state = self.lock_state();
                let total_due = state.ledger.total_due;
                let mut payments = state.ledger.payments.clone();
                payments.push(record.clone());
                state.ledger = LedgerState::compute(total_due, payments);
                state.phase = LedgerPhase::NeedsResync;

                PaymentOutcome {
                    payment: record,
                    change,
                    ledger: state.ledger.clone(),
                    stale: Some(SyncError::Refetch(e.to_string())),
                }
            }
        }
    }

    fn local_record(&self, validated: &ValidatedPayment, reference: Option<String>) -> PaymentRecord {
        PaymentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            method: validated.method,
            amount: validated.amount,
            cash_tendered: validated.tendered,
            change: validated.change(),
            note: validated.note.clone(),
            external_reference: reference,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }
}

/// Phase transition after a fresh authoritative snapshot.
/// `Complete` is terminal; a later snapshot never re-opens it.
fn next_phase(current: LedgerPhase, ledger: &LedgerState) -> LedgerPhase {
    if current == LedgerPhase::Complete || ledger.is_complete() {
        LedgerPhase::Complete
    } else {
        LedgerPhase::Collecting
    }
}
