//! The coordinator's record of one checkout.

use std::fmt;

use common::{OrderId, VectorClock};
use domain::{Book, CheckoutRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::RejectionKind;
use crate::state::CheckoutState;

/// Final verdict shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Order Accepted")]
    Accepted,
    #[serde(rename = "Order Rejected")]
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Accepted => f.write_str("Order Accepted"),
            OrderStatus::Rejected => f.write_str("Order Rejected"),
        }
    }
}

/// Classification of a failed checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Validation,
    FraudSuspected,
    Initialization,
    UnknownOrder,
    Unavailable,
    Internal,
}

impl FailureKind {
    /// Returns true for failures caused by the order itself rather than the
    /// system processing it.
    pub fn is_business(&self) -> bool {
        matches!(self, FailureKind::Validation | FailureKind::FraudSuspected)
    }
}

impl From<RejectionKind> for FailureKind {
    fn from(kind: RejectionKind) -> Self {
        match kind {
            RejectionKind::Validation => FailureKind::Validation,
            RejectionKind::FraudSuspected => FailureKind::FraudSuspected,
            RejectionKind::UnknownOrder => FailureKind::UnknownOrder,
            RejectionKind::Internal => FailureKind::Internal,
        }
    }
}

/// Why and where a checkout failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFailure {
    /// Opaque id reported to the customer; the full detail is only logged.
    pub error_instance_id: Uuid,
    /// The state the checkout was in when it failed.
    pub stage: CheckoutState,
    pub kind: FailureKind,
    /// Service key of the participant that reported the failure.
    pub origin: Option<String>,
    pub reason: String,
}

/// One checkout as tracked by the coordinator.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    request: CheckoutRequest,
    state: CheckoutState,
    clock: VectorClock,
    suggested_books: Vec<Book>,
    failure: Option<CheckoutFailure>,
    history: Vec<CheckoutState>,
}

impl Order {
    /// Starts tracking a new checkout with a fresh order id.
    pub fn new(request: CheckoutRequest) -> Self {
        Self {
            id: OrderId::new(),
            request,
            state: CheckoutState::Initializing,
            clock: VectorClock::new(),
            suggested_books: Vec::new(),
            failure: None,
            history: vec![CheckoutState::Initializing],
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn request(&self) -> &CheckoutRequest {
        &self.request
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// The latest merged clock returned by the participants.
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn suggested_books(&self) -> &[Book] {
        &self.suggested_books
    }

    pub fn failure(&self) -> Option<&CheckoutFailure> {
        self.failure.as_ref()
    }

    /// Every state the checkout has been in, oldest first.
    pub fn history(&self) -> &[CheckoutState] {
        &self.history
    }

    /// Returns the verdict once the checkout has reached a terminal state.
    pub fn status(&self) -> Option<OrderStatus> {
        match self.state {
            CheckoutState::Done => Some(OrderStatus::Accepted),
            CheckoutState::Failed => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    pub(crate) fn advance(&mut self, next: CheckoutState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid checkout transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(order_id = %self.id, from = %self.state, to = %next, "checkout state changed");
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn observe(&mut self, clock: &VectorClock) {
        self.clock.merge_from(clock);
    }

    pub(crate) fn set_suggestions(&mut self, books: Vec<Book>) {
        self.suggested_books = books;
    }

    pub(crate) fn fail(
        &mut self,
        kind: FailureKind,
        origin: Option<String>,
        reason: String,
    ) -> &CheckoutFailure {
        let stage = self.state;
        self.advance(CheckoutState::Failed);
        self.suggested_books.clear();
        self.failure.insert(CheckoutFailure {
            error_instance_id: Uuid::new_v4(),
            stage,
            kind,
            origin,
            reason,
        })
    }
}
