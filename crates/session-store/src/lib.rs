//! Saga session storage for checkout participants.
//!
//! Every participant keeps one [`SagaSession`] per in-flight order: its own
//! vector clock, the payload it was initialized with, and an optional cached
//! result. Sessions live in a [`SessionStore`] owned by the participant, are
//! serialized per order id, and expire after a fixed TTL that is refreshed on
//! every access.

pub mod error;
pub mod session;
pub mod store;

pub use common::{OrderId, VectorClock};
pub use error::{Result, SessionError};
pub use session::SagaSession;
pub use store::{SessionConfig, SessionGuard, SessionStore};
