//! Saga coordinator for the checkout flow.

use std::sync::Arc;

use common::{OrderId, VectorClock};
use domain::CheckoutRequest;

use crate::error::SagaError;
use crate::order::{FailureKind, Order};
use crate::outcome::CallOutcome;
use crate::participant::{
    FRAUD_DETECTION, FraudDetectionService, FraudInit, SUGGESTIONS, SuggestionsInit,
    SuggestionsService, TRANSACTION_VERIFICATION, TransactionInit, TransactionVerificationService,
};
use crate::services::queue::{OrderQueue, QueuedOrder};
use crate::state::CheckoutState;

/// A stage that stopped the checkout.
struct StageFailure {
    kind: FailureKind,
    origin: Option<String>,
    reason: String,
}

impl StageFailure {
    fn from_outcome<T>(service: &str, outcome: CallOutcome<T>) -> Result<T, StageFailure> {
        match outcome {
            CallOutcome::Ok(value) => Ok(value),
            CallOutcome::Rejected(rejection) => Err(StageFailure {
                kind: rejection.kind.into(),
                origin: Some(rejection.origin),
                reason: rejection.reason,
            }),
            CallOutcome::Unavailable(reason) => Err(StageFailure {
                kind: FailureKind::Unavailable,
                origin: Some(service.to_string()),
                reason: format!("Service {service} is unavailable: {reason}"),
            }),
        }
    }
}

/// Orchestrates one checkout across the three participants.
///
/// The coordinator initializes every participant concurrently, runs the
/// verification chain with an empty clock, fetches the cached suggestions and
/// clears all sessions with the final merged clock. Any failure broadcasts a
/// clock-less `clear_data` to every participant and rejects the order.
pub struct SagaCoordinator<T, F, S>
where
    T: TransactionVerificationService,
    F: FraudDetectionService,
    S: SuggestionsService,
{
    transaction_verification: T,
    fraud_detection: F,
    suggestions: S,
    queue: Option<Arc<dyn OrderQueue>>,
}

impl<T, F, S> SagaCoordinator<T, F, S>
where
    T: TransactionVerificationService,
    F: FraudDetectionService,
    S: SuggestionsService,
{
    /// Creates a new saga coordinator.
    pub fn new(transaction_verification: T, fraud_detection: F, suggestions: S) -> Self {
        Self {
            transaction_verification,
            fraud_detection,
            suggestions,
            queue: None,
        }
    }

    /// Enqueues every accepted order for execution.
    pub fn with_queue(mut self, queue: Arc<dyn OrderQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Runs the checkout saga and returns the order in a terminal state.
    #[tracing::instrument(skip(self, request), fields(order_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Order {
        metrics::counter!("checkout_requests_total").increment(1);
        let started = std::time::Instant::now();

        let mut order = Order::new(request);
        tracing::Span::current().record("order_id", tracing::field::display(order.id()));

        match self.run(&mut order).await {
            Ok(()) => {
                metrics::counter!("checkout_accepted").increment(1);
                tracing::info!(
                    clock = %order.clock(),
                    suggestions = order.suggested_books().len(),
                    "order accepted"
                );
            }
            Err(failure) => {
                self.broadcast_clear(order.id(), None).await;
                let failure = order.fail(failure.kind, failure.origin, failure.reason);
                metrics::counter!("checkout_rejected").increment(1);
                tracing::warn!(
                    error_instance_id = %failure.error_instance_id,
                    stage = %failure.stage,
                    kind = ?failure.kind,
                    origin = failure.origin.as_deref().unwrap_or("coordinator"),
                    reason = %failure.reason,
                    "order rejected"
                );
            }
        }

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        order
    }

    async fn run(&self, order: &mut Order) -> Result<(), StageFailure> {
        self.initialize(order).await?;

        order.advance(CheckoutState::Verifying);
        let verified = StageFailure::from_outcome(
            TRANSACTION_VERIFICATION,
            self.transaction_verification
                .verify_transaction(order.id(), VectorClock::new())
                .await,
        )?;
        order.observe(&verified);

        order.advance(CheckoutState::FetchingSuggestions);
        let reply = StageFailure::from_outcome(
            SUGGESTIONS,
            self.suggestions
                .get_suggestions(order.id(), order.clock().clone())
                .await,
        )?;
        order.observe(&reply.clock);
        order.set_suggestions(reply.books);

        order.advance(CheckoutState::Clearing);
        self.broadcast_clear(order.id(), Some(order.clock().clone()))
            .await;

        if let Some(queue) = &self.queue {
            queue
                .enqueue(QueuedOrder::new(order.id(), order.request().clone()))
                .await
                .map_err(|e| StageFailure {
                    kind: FailureKind::Unavailable,
                    origin: None,
                    reason: e.to_string(),
                })?;
        }

        order.advance(CheckoutState::Done);
        Ok(())
    }

    /// Creates the order's session on every participant concurrently.
    async fn initialize(&self, order: &Order) -> Result<(), StageFailure> {
        let order_id = order.id();
        let request = order.request();

        let (tv, fd, sg) = tokio::join!(
            self.transaction_verification.initialize(
                order_id,
                TransactionInit {
                    items: request.items.clone(),
                    credit_card: request.credit_card.clone(),
                    billing_address: request.billing_address.clone(),
                },
            ),
            self.fraud_detection.initialize(
                order_id,
                FraudInit {
                    credit_card: request.credit_card.clone(),
                    billing_address: request.billing_address.clone(),
                },
            ),
            self.suggestions.initialize(
                order_id,
                SuggestionsInit {
                    title: request.first_title().map(str::to_owned),
                },
            ),
        );

        for (service, outcome) in [
            (TRANSACTION_VERIFICATION, tv),
            (FRAUD_DETECTION, fd),
            (SUGGESTIONS, sg),
        ] {
            StageFailure::from_outcome(service, outcome).map_err(|failure| StageFailure {
                kind: match failure.kind {
                    FailureKind::Unavailable => FailureKind::Unavailable,
                    _ => FailureKind::Initialization,
                },
                reason: format!("Initialization failed: {}", failure.reason),
                ..failure
            })?;
        }
        Ok(())
    }

    /// Calls `clear_data` on every participant concurrently.
    ///
    /// With no final clock this is compensation: participants that never saw
    /// the order answer `UnknownOrder`, which is expected. Errors never change
    /// the checkout's outcome.
    async fn broadcast_clear(&self, order_id: OrderId, final_clock: Option<VectorClock>) {
        let compensating = final_clock.is_none();
        let (tv, fd, sg) = tokio::join!(
            self.transaction_verification
                .clear_data(order_id, final_clock.clone()),
            self.fraud_detection.clear_data(order_id, final_clock.clone()),
            self.suggestions.clear_data(order_id, final_clock.clone()),
        );

        for (service, result) in [
            (TRANSACTION_VERIFICATION, tv),
            (FRAUD_DETECTION, fd),
            (SUGGESTIONS, sg),
        ] {
            match result {
                Ok(()) => {}
                Err(e @ SagaError::Session(_)) if compensating => {
                    tracing::debug!(service, %order_id, error = %e, "compensation skipped");
                }
                Err(e) => {
                    tracing::error!(service, %order_id, error = %e, "failed to clear session");
                }
            }
        }
    }
}
