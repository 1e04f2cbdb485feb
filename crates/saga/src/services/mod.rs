//! In-process participant implementations and the order queue.

pub mod fraud_detection;
pub mod queue;
pub mod suggestions;
pub mod transaction_verification;

pub use fraud_detection::LocalFraudDetection;
pub use queue::{InMemoryOrderQueue, OrderQueue, QueuedOrder};
pub use suggestions::LocalSuggestions;
pub use transaction_verification::LocalTransactionVerification;

use common::{OrderId, VectorClock};
use session_store::{SessionGuard, SessionStore};

use crate::error::SagaError;
use crate::outcome::{CallOutcome, Rejection, RejectionKind};

async fn open_session<P, R>(store: &SessionStore<P, R>, order_id: OrderId, payload: P) -> CallOutcome<()>
where
    P: Send + 'static,
    R: Send + 'static,
{
    if store.insert(order_id, payload).await {
        tracing::warn!(service = store.service(), %order_id, "existing session overwritten");
    }
    tracing::info!(service = store.service(), %order_id, "session initialized");
    CallOutcome::Ok(())
}

async fn lock_session<P, R>(
    store: &SessionStore<P, R>,
    order_id: OrderId,
) -> Result<SessionGuard<P, R>, Rejection>
where
    P: Send + 'static,
    R: Send + 'static,
{
    store.lock(order_id).await.map_err(|e| {
        tracing::warn!(service = store.service(), %order_id, "call for unknown order");
        Rejection::new(store.service(), RejectionKind::UnknownOrder, e)
    })
}

async fn clear_session<P, R>(
    store: &SessionStore<P, R>,
    order_id: OrderId,
    final_clock: Option<VectorClock>,
) -> Result<(), SagaError>
where
    P: Send + 'static,
    R: Send + 'static,
{
    match store.clear(order_id, final_clock.as_ref()).await {
        Ok(session) => {
            metrics::counter!("participant_sessions_cleared", "service" => store.service().to_string())
                .increment(1);
            tracing::info!(service = store.service(), %order_id, clock = %session.clock, "session cleared");
            Ok(())
        }
        Err(e) => {
            tracing::debug!(service = store.service(), %order_id, error = %e, "clear refused");
            Err(e.into())
        }
    }
}

/// Advances `service`'s own counter after a completed step.
fn tick(clock: &mut VectorClock, service: &str) -> Result<u64, Rejection> {
    clock
        .increment(service)
        .map_err(|e| Rejection::internal(service, e))
}
