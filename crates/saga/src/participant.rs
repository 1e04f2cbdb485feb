//! The contract between the coordinator and the three participants.
//!
//! Every participant keeps a per-order session between `initialize` and
//! `clear_data`. The act operations carry a vector clock in and out; the
//! participant merges the incoming clock into its session, ticks its own
//! counter once per business step, and returns the merged clock.

use async_trait::async_trait;
use common::{OrderId, VectorClock};
use domain::{BillingAddress, Book, CreditCard, OrderItem};

use crate::error::SagaError;
use crate::outcome::CallOutcome;

/// Clock key of the transaction verification participant.
pub const TRANSACTION_VERIFICATION: &str = "TRANSACTION_VERIFICATION";
/// Clock key of the fraud detection participant.
pub const FRAUD_DETECTION: &str = "FRAUD_DETECTION";
/// Clock key of the suggestions participant.
pub const SUGGESTIONS: &str = "SUGGESTIONS";

/// Order data cached by transaction verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInit {
    pub items: Vec<OrderItem>,
    pub credit_card: CreditCard,
    pub billing_address: BillingAddress,
}

/// Order data cached by fraud detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudInit {
    pub credit_card: CreditCard,
    pub billing_address: BillingAddress,
}

/// Order data cached by the suggestions service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionsInit {
    /// Title of the first ordered book, excluded from suggestions.
    pub title: Option<String>,
}

/// Books returned by [`SuggestionsService::get_suggestions`] with the clock
/// stamped on the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionsReply {
    pub books: Vec<Book>,
    pub clock: VectorClock,
}

/// Session lifecycle shared by every participant.
#[async_trait]
pub trait Participant: Send + Sync {
    /// Data cached at initialization.
    type Init: Send + 'static;

    /// The participant's vector clock key.
    fn service_key(&self) -> &'static str;

    /// Creates the order's session with clock `{service_key: 0}`.
    async fn initialize(&self, order_id: OrderId, init: Self::Init) -> CallOutcome<()>;

    /// Deletes the order's session once `final_clock` dominates the local one.
    ///
    /// `None` or an empty clock deletes unconditionally (compensation).
    async fn clear_data(
        &self,
        order_id: OrderId,
        final_clock: Option<VectorClock>,
    ) -> Result<(), SagaError>;
}

/// Entry point of the verification chain.
#[async_trait]
pub trait TransactionVerificationService: Participant<Init = TransactionInit> {
    /// Validates cart, billing address and card, then hands over to fraud
    /// detection.
    async fn verify_transaction(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<VectorClock>;
}

#[async_trait]
pub trait FraudDetectionService: Participant<Init = FraudInit> {
    /// Screens card and country, then asks for suggestions to be generated.
    async fn detect_fraud(&self, order_id: OrderId, clock: VectorClock) -> CallOutcome<VectorClock>;
}

#[async_trait]
pub trait SuggestionsService: Participant<Init = SuggestionsInit> {
    /// Picks suggested books and caches them in the session.
    async fn generate_suggestions(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<VectorClock>;

    /// Returns the cached suggestions.
    async fn get_suggestions(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<SuggestionsReply>;
}
