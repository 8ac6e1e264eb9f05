use super::*;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use shared::dto::{CreateIntentResponse, GetPaymentsResponse};
use shared::error::{ExecutionError, ValidationError};
use shared::ledger::LedgerPhase;
use shared::money::Amount;
use shared::payment::{PaymentInput, PaymentMethod, PaymentRecord, ValidatedPayment};
use tokio::sync::Notify;

use crate::order_service::{OrderService, OrderServiceError, ServiceResult};
use crate::rails::{PaymentRail, RailError, RailIntent};

fn amount(minor: i64) -> Amount {
    Amount::from_minor(minor)
}

/// In-memory Order Service with switchable failure points
struct MockOrderService {
    total_due: Amount,
    payments: Mutex<Vec<PaymentRecord>>,
    intent_counter: AtomicU64,
    fail_create_intent: AtomicBool,
    fail_add_payment: AtomicBool,
    fail_get_payments: AtomicBool,
}

impl MockOrderService {
    fn new(total_due: Amount) -> Arc<Self> {
        Arc::new(Self {
            total_due,
            payments: Mutex::new(Vec::new()),
            intent_counter: AtomicU64::new(0),
            fail_create_intent: AtomicBool::new(false),
            fail_add_payment: AtomicBool::new(false),
            fail_get_payments: AtomicBool::new(false),
        })
    }

    fn server_error(message: &str) -> OrderServiceError {
        OrderServiceError::Api {
            status: 500,
            message: message.to_string(),
        }
    }

    fn recorded(&self) -> Vec<PaymentRecord> {
        self.payments.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl OrderService for MockOrderService {
    async fn create_payment_intent(
        &self,
        request: &shared::dto::CreateIntentRequest,
    ) -> ServiceResult<CreateIntentResponse> {
        if self.fail_create_intent.load(Ordering::Relaxed) {
            return Err(Self::server_error("intent backend unavailable"));
        }
        assert!(request.amount.is_positive());

        let n = self.intent_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(CreateIntentResponse {
            id: format!("pi_{n}"),
            client_secret: format!("pi_{n}_secret_test"),
            stripe_account_id: None,
        })
    }

    async fn add_payment(
        &self,
        _order_id: &str,
        request: &shared::dto::AddPaymentRequest,
    ) -> ServiceResult<()> {
        if self.fail_add_payment.load(Ordering::Relaxed) {
            return Err(Self::server_error("registration backend unavailable"));
        }

        let mut payments = self.payments.lock().unwrap();
        let id = format!("srv-pay-{}", payments.len() + 1);
        payments.push(PaymentRecord {
            id,
            method: request.payment_method,
            amount: request.amount,
            cash_tendered: request.cash_tendered,
            change: request
                .cash_tendered
                .map(|t| t.saturating_sub_floor_zero(request.amount)),
            note: request.note.clone(),
            external_reference: request.stripe_payment_intent_id.clone(),
            timestamp: 0,
        });
        Ok(())
    }

    async fn get_payments(&self, _order_id: &str) -> ServiceResult<GetPaymentsResponse> {
        if self.fail_get_payments.load(Ordering::Relaxed) {
            return Err(Self::server_error("snapshot backend unavailable"));
        }

        let payments = self.payments.lock().unwrap().clone();
        let total_paid: Amount = payments.iter().map(|p| p.amount).sum();
        Ok(GetPaymentsResponse {
            total_paid,
            remaining_balance: self.total_due - total_paid,
            payments,
        })
    }
}

/// Rail that settles everything, with switchable failure points and an
/// optional hold inside collect-or-confirm for concurrency tests
struct MockRail {
    method: PaymentMethod,
    fail_retrieve: bool,
    fail_confirm: bool,
    entered_confirm: Option<Arc<Notify>>,
    release_confirm: Option<Arc<Notify>>,
}

impl MockRail {
    fn settling(method: PaymentMethod) -> Arc<Self> {
        Arc::new(Self {
            method,
            fail_retrieve: false,
            fail_confirm: false,
            entered_confirm: None,
            release_confirm: None,
        })
    }

    fn declining(method: PaymentMethod) -> Arc<Self> {
        Arc::new(Self {
            fail_confirm: true,
            ..Self::unwrapped(method)
        })
    }

    fn disconnected(method: PaymentMethod) -> Arc<Self> {
        Arc::new(Self {
            fail_retrieve: true,
            ..Self::unwrapped(method)
        })
    }

    fn holding(method: PaymentMethod, entered: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            entered_confirm: Some(entered),
            release_confirm: Some(release),
            ..Self::unwrapped(method)
        })
    }

    fn unwrapped(method: PaymentMethod) -> Self {
        Self {
            method,
            fail_retrieve: false,
            fail_confirm: false,
            entered_confirm: None,
            release_confirm: None,
        }
    }
}

#[async_trait::async_trait]
impl PaymentRail for MockRail {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn retrieve_intent(&self, client_secret: &str) -> Result<RailIntent, RailError> {
        if self.fail_retrieve {
            return Err(RailError::Adapter("terminal disconnected".to_string()));
        }
        let id = client_secret
            .split_once("_secret")
            .map(|(id, _)| id.to_string())
            .unwrap();
        Ok(RailIntent {
            id,
            client_secret: client_secret.to_string(),
            status: "requires_confirmation".to_string(),
        })
    }

    async fn collect_or_confirm(&self, intent: RailIntent) -> Result<RailIntent, RailError> {
        if let Some(entered) = &self.entered_confirm {
            entered.notify_one();
        }
        if let Some(release) = &self.release_confirm {
            release.notified().await;
        }
        if self.fail_confirm {
            return Err(RailError::Adapter("card declined: do not honour".to_string()));
        }
        Ok(RailIntent {
            status: "succeeded".to_string(),
            ..intent
        })
    }
}

fn session(total_due: i64, service: Arc<MockOrderService>) -> CheckoutSession {
    CheckoutSession::new("order-1", amount(total_due), service)
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validate_rejects_non_positive_amounts() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service);

    for minor in [0, -10] {
        let input = PaymentInput::new(PaymentMethod::Card, amount(minor));
        assert_eq!(
            session.validate_submission(&input),
            Err(ValidationError::InvalidAmount)
        );
    }
}

#[tokio::test]
async fn test_validate_reports_exact_maximum_on_overpayment() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service);

    let input = PaymentInput::new(PaymentMethod::Card, amount(1200));
    let err = session.validate_submission(&input).unwrap_err();
    assert_eq!(
        err,
        ValidationError::AmountExceedsBalance {
            amount: amount(1200),
            max_allowed: amount(1000),
        }
    );
    // The message tells the operator the exact maximum they may enter
    assert!(err.to_string().contains("maximum allowed is 10.00"));
}

#[tokio::test]
async fn test_validate_never_accepts_amount_over_remaining() {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let remaining: i64 = rng.gen_range(1..10_000);
        let requested: i64 = rng.gen_range(1..20_000);

        let service = MockOrderService::new(amount(remaining));
        let session = session(remaining, service);
        let input = PaymentInput::cash(amount(requested), amount(requested));

        let result = session.validate_submission(&input);
        if requested > remaining {
            assert!(
                matches!(result, Err(ValidationError::AmountExceedsBalance { .. })),
                "accepted {requested} with only {remaining} remaining"
            );
        } else {
            assert!(result.is_ok(), "rejected {requested} with {remaining} remaining");
        }
    }
}

#[tokio::test]
async fn test_card_minimum_boundary() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service);

    // 49 minor units on a card rail is below the 50 minimum
    let below = PaymentInput::new(PaymentMethod::TapToPay, amount(49));
    assert_eq!(
        session.validate_submission(&below),
        Err(ValidationError::BelowRailMinimum {
            method: PaymentMethod::TapToPay,
            minimum: amount(50),
        })
    );

    // 50 is accepted
    let at_minimum = PaymentInput::new(PaymentMethod::TapToPay, amount(50));
    assert!(session.validate_submission(&at_minimum).is_ok());

    // Cash has no minimum
    let small_cash = PaymentInput::cash(amount(1), amount(1));
    assert!(session.validate_submission(&small_cash).is_ok());
}

#[tokio::test]
async fn test_validate_cash_tendered_rules() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service);

    // Tendered below the amount
    let short = PaymentInput::cash(amount(400), amount(300));
    assert_eq!(
        session.validate_submission(&short),
        Err(ValidationError::InsufficientCash {
            tendered: amount(300),
            amount: amount(400),
        })
    );

    // Tendered missing entirely counts as zero
    let missing = PaymentInput::new(PaymentMethod::Cash, amount(400));
    assert_eq!(
        session.validate_submission(&missing),
        Err(ValidationError::InsufficientCash {
            tendered: Amount::ZERO,
            amount: amount(400),
        })
    );

    // Exact tender is fine, change is zero
    let exact = PaymentInput::cash(amount(400), amount(400));
    let validated = session.validate_submission(&exact).unwrap();
    assert_eq!(validated.change(), Some(Amount::ZERO));
}

#[tokio::test]
async fn test_validate_drops_tendered_off_the_cash_rail() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service);

    let mut input = PaymentInput::new(PaymentMethod::Card, amount(100));
    input.tendered = Some(amount(200));

    let validated = session.validate_submission(&input).unwrap();
    assert!(validated.tendered.is_none());
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_split_cash_then_tap_completes_order() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone())
        .with_rail(MockRail::settling(PaymentMethod::TapToPay));

    // Cash 4.00 tendered 5.00: change 1.00, 6.00 still due
    let cash = session
        .validate_submission(&PaymentInput::cash(amount(400), amount(500)))
        .unwrap();
    let outcome = session.execute_payment(cash).await.unwrap();
    assert_eq!(outcome.change, Some(amount(100)));
    assert_eq!(outcome.ledger.remaining_balance, amount(600));
    assert!(outcome.stale.is_none());
    assert!(!session.is_order_complete());

    // Tap-to-pay for the remaining 6.00 completes the order
    let tap = session
        .validate_submission(&PaymentInput::new(PaymentMethod::TapToPay, amount(600)))
        .unwrap();
    let outcome = session.execute_payment(tap).await.unwrap();
    assert_eq!(outcome.ledger.remaining_balance, Amount::ZERO);
    assert!(session.is_order_complete());
    assert_eq!(session.phase(), LedgerPhase::Complete);

    // The ledger identity holds on the authoritative snapshot
    let state = session.state();
    assert_eq!(state.total_paid, state.total_due - state.remaining_balance);

    // Completion is terminal: nothing further is accepted
    let more = PaymentInput::cash(amount(100), amount(100));
    assert_eq!(
        session.validate_submission(&more),
        Err(ValidationError::OrderAlreadyComplete)
    );
}

#[tokio::test]
async fn test_below_minimum_is_steered_to_cash() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service)
        .with_rail(MockRail::settling(PaymentMethod::TapToPay));

    // 0.30 on tap-to-pay is rejected, not silently re-routed
    let tap = PaymentInput::new(PaymentMethod::TapToPay, amount(30));
    assert!(matches!(
        session.validate_submission(&tap),
        Err(ValidationError::BelowRailMinimum { .. })
    ));

    // The same 0.30 in cash goes through with zero change
    let cash = session
        .validate_submission(&PaymentInput::cash(amount(30), amount(30)))
        .unwrap();
    let outcome = session.execute_payment(cash).await.unwrap();
    assert_eq!(outcome.change, Some(Amount::ZERO));
    assert_eq!(outcome.ledger.remaining_balance, amount(970));
}

#[tokio::test]
async fn test_rail_decline_leaves_ledger_byte_identical() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone())
        .with_rail(MockRail::declining(PaymentMethod::Card));

    let before = session.state();

    let card = session
        .validate_submission(&PaymentInput::new(PaymentMethod::Card, amount(600)))
        .unwrap();
    let err = session.execute_payment(card).await.unwrap_err();

    // Adapter message surfaced verbatim
    assert!(matches!(err, ExecutionError::RailAdapterFailed(_)));
    assert!(err.to_string().contains("card declined: do not honour"));

    // No phantom payment anywhere
    assert_eq!(session.state(), before);
    assert!(service.recorded().is_empty());
    assert_eq!(session.phase(), LedgerPhase::Collecting);
}

#[tokio::test]
async fn test_retrieve_failure_leaves_ledger_untouched() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone())
        .with_rail(MockRail::disconnected(PaymentMethod::TapToPay));

    let before = session.state();
    let tap = session
        .validate_submission(&PaymentInput::new(PaymentMethod::TapToPay, amount(500)))
        .unwrap();
    let err = session.execute_payment(tap).await.unwrap_err();

    assert!(err.to_string().contains("terminal disconnected"));
    assert_eq!(session.state(), before);
    assert!(service.recorded().is_empty());
}

#[tokio::test]
async fn test_intent_creation_failure() {
    let service = MockOrderService::new(amount(1000));
    service.fail_create_intent.store(true, Ordering::Relaxed);
    let session = session(1000, service.clone())
        .with_rail(MockRail::settling(PaymentMethod::Card));

    let card = session
        .validate_submission(&PaymentInput::new(PaymentMethod::Card, amount(600)))
        .unwrap();
    let err = session.execute_payment(card).await.unwrap_err();

    assert!(matches!(err, ExecutionError::IntentCreationFailed(_)));
    assert!(service.recorded().is_empty());
    assert_eq!(session.state().remaining_balance, amount(1000));
}

#[tokio::test]
async fn test_missing_rail_adapter_fails_before_any_call() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone()); // no rails registered

    let card = session
        .validate_submission(&PaymentInput::new(PaymentMethod::Card, amount(600)))
        .unwrap();
    let err = session.execute_payment(card).await.unwrap_err();

    assert!(matches!(err, ExecutionError::RailAdapterFailed(_)));
    assert!(err.to_string().contains("CARD"));
    assert!(service.recorded().is_empty());
}

#[tokio::test]
async fn test_registration_failure_reports_the_intent() {
    let service = MockOrderService::new(amount(1000));
    service.fail_add_payment.store(true, Ordering::Relaxed);
    let session = session(1000, service.clone())
        .with_rail(MockRail::settling(PaymentMethod::Card));

    let card = session
        .validate_submission(&PaymentInput::new(PaymentMethod::Card, amount(600)))
        .unwrap();
    let err = session.execute_payment(card).await.unwrap_err();

    // The charge went through on the rail; the operator needs the intent id
    // for manual reconciliation
    match err {
        ExecutionError::PaymentRegistrationFailed { intent_id, .. } => {
            assert_eq!(intent_id, "pi_1");
        }
        other => panic!("expected PaymentRegistrationFailed, got {other:?}"),
    }

    // The local ledger still shows nothing paid: the record was never made
    assert_eq!(session.state().remaining_balance, amount(1000));
}

#[tokio::test]
async fn test_cash_registration_failure_is_retryable() {
    let service = MockOrderService::new(amount(1000));
    service.fail_add_payment.store(true, Ordering::Relaxed);
    let session = session(1000, service.clone());

    let cash = session
        .validate_submission(&PaymentInput::cash(amount(400), amount(500)))
        .unwrap();
    let err = session.execute_payment(cash.clone()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::RailAdapterFailed(_)));
    assert_eq!(session.state().remaining_balance, amount(1000));

    // Nothing settled externally, so a straight retry is safe
    service.fail_add_payment.store(false, Ordering::Relaxed);
    let outcome = session.execute_payment(cash).await.unwrap();
    assert_eq!(outcome.ledger.remaining_balance, amount(600));
}

// ============================================================================
// Sync and phases
// ============================================================================

#[tokio::test]
async fn test_sync_failure_keeps_local_state_and_flags_resync() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone());

    // Registration succeeds but the authoritative refetch fails
    service.fail_get_payments.store(true, Ordering::Relaxed);

    let cash = session
        .validate_submission(&PaymentInput::cash(amount(400), amount(400)))
        .unwrap();
    let outcome = session.execute_payment(cash).await.unwrap();

    // Best-known local state carries the payment, flagged as stale
    assert!(outcome.stale.is_some());
    assert_eq!(outcome.ledger.remaining_balance, amount(600));
    assert_eq!(session.phase(), LedgerPhase::NeedsResync);

    // Resync recovers once the service is reachable again
    service.fail_get_payments.store(false, Ordering::Relaxed);
    let ledger = session.resync().await.unwrap();
    assert_eq!(ledger.remaining_balance, amount(600));
    assert_eq!(ledger.payments.len(), 1);
    assert_eq!(session.phase(), LedgerPhase::Collecting);
}

#[tokio::test]
async fn test_resync_failure_keeps_best_known_state() {
    let service = MockOrderService::new(amount(1000));
    let session = session(1000, service.clone());
    service.fail_get_payments.store(true, Ordering::Relaxed);

    let before = session.state();
    assert!(session.resync().await.is_err());
    assert_eq!(session.state(), before);
}

#[tokio::test]
async fn test_authoritative_snapshot_wins_over_local_state() {
    // Another terminal paid 3.00 against the shared order
    let service = MockOrderService::new(amount(1000));
    service
        .add_payment(
            "order-1",
            &shared::dto::AddPaymentRequest {
                payment_method: PaymentMethod::Card,
                amount: amount(300),
                cash_tendered: None,
                stripe_payment_intent_id: Some("pi_other_terminal".to_string()),
                note: None,
            },
        )
        .await
        .unwrap();

    let session = session(1000, service.clone());
    // This terminal still believes the full 10.00 is due
    assert_eq!(session.state().remaining_balance, amount(1000));

    let cash = session
        .validate_submission(&PaymentInput::cash(amount(200), amount(200)))
        .unwrap();
    let outcome = session.execute_payment(cash).await.unwrap();

    // After the refetch the other terminal's payment is reflected too
    assert_eq!(outcome.ledger.payments.len(), 2);
    assert_eq!(outcome.ledger.remaining_balance, amount(500));
}

#[tokio::test]
async fn test_completion_survives_later_snapshots() {
    let service = MockOrderService::new(amount(100));
    let session = session(100, service.clone());

    let cash = session
        .validate_submission(&PaymentInput::cash(amount(100), amount(100)))
        .unwrap();
    session.execute_payment(cash).await.unwrap();
    assert_eq!(session.phase(), LedgerPhase::Complete);

    // A later resync never re-opens a completed session
    session.resync().await.unwrap();
    assert_eq!(session.phase(), LedgerPhase::Complete);
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test]
async fn test_second_submission_rejected_while_one_is_in_flight() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let service = MockOrderService::new(amount(1000));
    let session = Arc::new(
        session(1000, service).with_rail(MockRail::holding(
            PaymentMethod::TapToPay,
            entered.clone(),
            release.clone(),
        )),
    );

    let first = session
        .validate_submission(&PaymentInput::new(PaymentMethod::TapToPay, amount(600)))
        .unwrap();

    let worker = {
        let session = session.clone();
        tokio::spawn(async move { session.execute_payment(first).await })
    };

    // Wait until the first payment is parked inside the rail
    entered.notified().await;

    // Validation and execution both refuse a second submission
    let second_input = PaymentInput::cash(amount(100), amount(100));
    assert_eq!(
        session.validate_submission(&second_input),
        Err(ValidationError::SubmissionInProgress)
    );

    let second = ValidatedPayment {
        method: PaymentMethod::Cash,
        amount: amount(100),
        tendered: Some(amount(100)),
        note: None,
    };
    assert!(matches!(
        session.execute_payment(second).await,
        Err(ExecutionError::Validation(
            ValidationError::SubmissionInProgress
        ))
    ));

    // Let the first finish; the guard clears and submissions work again
    release.notify_one();
    let outcome = worker.await.unwrap().unwrap();
    assert_eq!(outcome.ledger.remaining_balance, amount(400));

    let third = session.validate_submission(&PaymentInput::cash(amount(100), amount(100)));
    assert!(third.is_ok());
}
