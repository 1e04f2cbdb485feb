//! Checkout saga for the bookstore.
//!
//! Three participants verify an order in a causal chain:
//! 1. Transaction verification validates cart, billing address and card
//! 2. Fraud detection screens card and country
//! 3. Suggestions picks related books
//!
//! Each participant keeps a per-order session stamped with a vector clock.
//! The [`SagaCoordinator`] drives the chain and clears every session with the
//! final merged clock once the order is accepted; any failure clears the
//! sessions without a clock and rejects the order.

pub mod coordinator;
pub mod error;
pub mod order;
pub mod outcome;
pub mod participant;
pub mod services;
pub mod state;

pub use coordinator::SagaCoordinator;
pub use error::{Result, SagaError};
pub use order::{CheckoutFailure, FailureKind, Order, OrderStatus};
pub use outcome::{CallOutcome, Rejection, RejectionKind};
pub use participant::{
    FRAUD_DETECTION, FraudDetectionService, FraudInit, Participant, SUGGESTIONS, SuggestionsInit,
    SuggestionsReply, SuggestionsService, TRANSACTION_VERIFICATION, TransactionInit,
    TransactionVerificationService,
};
pub use services::{
    InMemoryOrderQueue, LocalFraudDetection, LocalSuggestions, LocalTransactionVerification,
    OrderQueue, QueuedOrder,
};
pub use state::CheckoutState;
