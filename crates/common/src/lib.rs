//! Shared types for the checkout services.
//!
//! - [`OrderId`] identifies one checkout across every participant.
//! - [`VectorClock`] carries causal order between the participants of a saga.

pub mod clock;
pub mod types;

pub use clock::{ClockError, VectorClock};
pub use types::OrderId;
