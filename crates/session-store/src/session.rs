//! The per-order session record.

use common::{OrderId, VectorClock};

/// State a participant keeps for one order between `Initialize` and `ClearData`.
///
/// `P` is the payload handed over at initialization; `R` is a result the
/// participant computes during the saga and serves back on a later call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaSession<P, R = ()> {
    pub order_id: OrderId,
    pub clock: VectorClock,
    pub payload: P,
    pub cached: Option<R>,
}

impl<P, R> SagaSession<P, R> {
    /// Creates a session whose clock is `{service: 0}`.
    pub fn new(order_id: OrderId, service: &str, payload: P) -> Self {
        Self {
            order_id,
            clock: VectorClock::for_service(service),
            payload,
            cached: None,
        }
    }

    /// Merges an incoming clock into the local clock and returns the result.
    pub fn observe(&mut self, incoming: &VectorClock) -> &VectorClock {
        self.clock.merge_from(incoming);
        &self.clock
    }
}
