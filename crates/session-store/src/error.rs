use common::OrderId;
use thiserror::Error;

/// Errors that can occur when working with saga sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No live session exists for the order (never initialized, cleared, or expired).
    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),

    /// The final clock supplied to a clear does not dominate the stored clock.
    #[error(
        "Causality violation for order {order_id}: final clock has {service}={final_counter}, local clock has {stored_counter}"
    )]
    CausalityViolation {
        order_id: OrderId,
        service: String,
        final_counter: u64,
        stored_counter: u64,
    },
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
