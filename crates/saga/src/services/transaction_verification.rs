//! Transaction verification: the first link of the verification chain.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{OrderId, VectorClock};
use domain::{ValidationError, rules};
use session_store::{SagaSession, SessionConfig, SessionStore};

use super::{clear_session, lock_session, open_session, tick};
use crate::error::SagaError;
use crate::outcome::{CallOutcome, Rejection};
use crate::participant::{
    FraudDetectionService, Participant, TRANSACTION_VERIFICATION, TransactionInit,
    TransactionVerificationService,
};

/// Validates the cart, billing address and card, then calls fraud detection.
#[derive(Clone)]
pub struct LocalTransactionVerification<F> {
    sessions: SessionStore<TransactionInit>,
    fraud_detection: F,
    reference_date: Option<NaiveDate>,
}

impl<F: FraudDetectionService> LocalTransactionVerification<F> {
    pub fn new(fraud_detection: F, config: SessionConfig) -> Self {
        Self {
            sessions: SessionStore::new(TRANSACTION_VERIFICATION, config),
            fraud_detection,
            reference_date: None,
        }
    }

    /// Pins the date card expiry is checked against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn sessions(&self) -> &SessionStore<TransactionInit> {
        &self.sessions
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    fn run_checks(&self, session: &mut SagaSession<TransactionInit>) -> Result<(), Rejection> {
        let reject = |e: ValidationError| Rejection::validation(TRANSACTION_VERIFICATION, e);

        rules::validate_cart(&session.payload.items).map_err(reject)?;
        tick(&mut session.clock, TRANSACTION_VERIFICATION)?;
        tracing::debug!(clock = %session.clock, "cart validated");

        rules::validate_billing_address(&session.payload.billing_address).map_err(reject)?;
        tick(&mut session.clock, TRANSACTION_VERIFICATION)?;
        tracing::debug!(clock = %session.clock, "billing address validated");

        rules::validate_credit_card(&session.payload.credit_card, self.today()).map_err(reject)?;
        tick(&mut session.clock, TRANSACTION_VERIFICATION)?;
        tracing::debug!(clock = %session.clock, "credit card validated");
        Ok(())
    }
}

#[async_trait]
impl<F: FraudDetectionService> Participant for LocalTransactionVerification<F> {
    type Init = TransactionInit;

    fn service_key(&self) -> &'static str {
        TRANSACTION_VERIFICATION
    }

    async fn initialize(&self, order_id: OrderId, init: TransactionInit) -> CallOutcome<()> {
        open_session(&self.sessions, order_id, init).await
    }

    async fn clear_data(
        &self,
        order_id: OrderId,
        final_clock: Option<VectorClock>,
    ) -> Result<(), SagaError> {
        clear_session(&self.sessions, order_id, final_clock).await
    }
}

#[async_trait]
impl<F: FraudDetectionService> TransactionVerificationService for LocalTransactionVerification<F> {
    #[tracing::instrument(skip(self, clock), fields(service = TRANSACTION_VERIFICATION))]
    async fn verify_transaction(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<VectorClock> {
        let mut session = match lock_session(&self.sessions, order_id).await {
            Ok(session) => session,
            Err(rejection) => return rejection.into(),
        };
        session.observe(&clock);

        if let Err(rejection) = self.run_checks(&mut session) {
            tracing::info!(%order_id, reason = %rejection.reason, "transaction rejected");
            return rejection.into();
        }

        let downstream = self
            .fraud_detection
            .detect_fraud(order_id, session.clock.clone())
            .await;
        if let Err(rejection) = tick(&mut session.clock, TRANSACTION_VERIFICATION) {
            return rejection.into();
        }

        match downstream {
            CallOutcome::Ok(reply) => {
                session.observe(&reply);
                tracing::info!(%order_id, clock = %session.clock, "transaction verified");
                CallOutcome::Ok(session.clock.clone())
            }
            failure => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{FRAUD_DETECTION, FraudInit, SUGGESTIONS, SuggestionsInit};
    use crate::services::{LocalFraudDetection, LocalSuggestions};
    use domain::{BillingAddress, CreditCard, OrderItem};

    type Chain = LocalTransactionVerification<LocalFraudDetection<LocalSuggestions>>;

    struct Fixture {
        tv: Chain,
        fd: LocalFraudDetection<LocalSuggestions>,
        sg: LocalSuggestions,
    }

    fn fixture() -> Fixture {
        let sg = LocalSuggestions::new(SessionConfig::default());
        let fd = LocalFraudDetection::new(sg.clone(), SessionConfig::default());
        let tv = LocalTransactionVerification::new(fd.clone(), SessionConfig::default())
            .with_reference_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        Fixture { tv, fd, sg }
    }

    fn card() -> CreditCard {
        CreditCard {
            number: "5555555555554444".into(),
            expiration_date: "12/26".into(),
            cvv: "491".into(),
        }
    }

    fn address() -> BillingAddress {
        BillingAddress {
            street: "Turu".into(),
            city: "Tartu".into(),
            state: "Tartumaa".into(),
            zip: "50701".into(),
            country: "Estonia".into(),
        }
    }

    async fn init_all(f: &Fixture, order_id: OrderId, card: CreditCard, address: BillingAddress) {
        let items = vec![OrderItem::new("Learning Python", 2)];
        assert!(f
            .tv
            .initialize(
                order_id,
                TransactionInit {
                    items,
                    credit_card: card.clone(),
                    billing_address: address.clone(),
                },
            )
            .await
            .is_ok());
        assert!(f
            .fd
            .initialize(
                order_id,
                FraudInit {
                    credit_card: card,
                    billing_address: address,
                },
            )
            .await
            .is_ok());
        assert!(f
            .sg
            .initialize(
                order_id,
                SuggestionsInit {
                    title: Some("Learning Python".into()),
                },
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_verified_clock_covers_whole_chain() {
        let f = fixture();
        let order_id = OrderId::new();
        init_all(&f, order_id, card(), address()).await;

        let clock = f
            .tv
            .verify_transaction(order_id, VectorClock::new())
            .await
            .ok()
            .unwrap();

        // Three checks plus the post-call tick.
        assert_eq!(clock.get(TRANSACTION_VERIFICATION), 4);
        // Two checks plus the post-call tick.
        assert_eq!(clock.get(FRAUD_DETECTION), 3);
        assert_eq!(clock.get(SUGGESTIONS), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_stops_chain() {
        let f = fixture();
        let order_id = OrderId::new();
        let address = BillingAddress {
            zip: "5070".into(),
            ..address()
        };
        init_all(&f, order_id, card(), address).await;

        let outcome = f.tv.verify_transaction(order_id, VectorClock::new()).await;
        let CallOutcome::Rejected(rejection) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert_eq!(rejection.origin, TRANSACTION_VERIFICATION);
        assert_eq!(rejection.reason, "ZIP code should contain exactly 5 numbers.");

        // Fraud detection was never reached, so its clock is untouched.
        let fd_session = f.fd.sessions().lock(order_id).await.unwrap();
        assert_eq!(fd_session.clock, VectorClock::for_service(FRAUD_DETECTION));
        drop(fd_session);

        // The failing participant keeps its session until told to clear.
        assert!(f.tv.sessions().contains(order_id).await);
    }

    #[tokio::test]
    async fn test_downstream_rejection_passes_through_unchanged() {
        let f = fixture();
        let order_id = OrderId::new();
        let card = CreditCard {
            cvv: "000".into(),
            ..card()
        };
        init_all(&f, order_id, card, address()).await;

        let outcome = f.tv.verify_transaction(order_id, VectorClock::new()).await;
        let CallOutcome::Rejected(rejection) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert_eq!(rejection.origin, FRAUD_DETECTION);
        assert_eq!(
            rejection.reason,
            "Suspicious CVV code, potentially fraudulent transaction!"
        );

        // All three transaction checks had passed.
        let tv_session = f.tv.sessions().lock(order_id).await.unwrap();
        assert!(tv_session.clock.get(TRANSACTION_VERIFICATION) >= 3);
    }

    #[tokio::test]
    async fn test_unknown_order_is_rejected() {
        let f = fixture();
        let outcome = f.tv.verify_transaction(OrderId::new(), VectorClock::new()).await;
        let CallOutcome::Rejected(rejection) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert_eq!(rejection.kind, crate::RejectionKind::UnknownOrder);
    }

    #[tokio::test]
    async fn test_clear_requires_dominating_clock() {
        let f = fixture();
        let order_id = OrderId::new();
        init_all(&f, order_id, card(), address()).await;
        let clock = f
            .tv
            .verify_transaction(order_id, VectorClock::new())
            .await
            .ok()
            .unwrap();

        let stale: VectorClock = [(TRANSACTION_VERIFICATION, 1)].into_iter().collect();
        let err = f.tv.clear_data(order_id, Some(stale)).await.unwrap_err();
        assert!(err.is_causality_violation());

        f.tv.clear_data(order_id, Some(clock)).await.unwrap();
        assert!(!f.tv.sessions().contains(order_id).await);
    }
}
