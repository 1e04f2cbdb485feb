//! Fraud detection: the second link of the verification chain.

use async_trait::async_trait;
use common::{OrderId, VectorClock};
use domain::{FraudError, rules};
use session_store::{SagaSession, SessionConfig, SessionStore};

use super::{clear_session, lock_session, open_session, tick};
use crate::error::SagaError;
use crate::outcome::{CallOutcome, Rejection};
use crate::participant::{
    FRAUD_DETECTION, FraudDetectionService, FraudInit, Participant, SuggestionsService,
};

/// Screens the card and billing country, then asks for suggestions.
#[derive(Clone)]
pub struct LocalFraudDetection<S> {
    sessions: SessionStore<FraudInit>,
    suggestions: S,
}

impl<S: SuggestionsService> LocalFraudDetection<S> {
    pub fn new(suggestions: S, config: SessionConfig) -> Self {
        Self {
            sessions: SessionStore::new(FRAUD_DETECTION, config),
            suggestions,
        }
    }

    pub fn sessions(&self) -> &SessionStore<FraudInit> {
        &self.sessions
    }

    fn run_checks(session: &mut SagaSession<FraudInit>) -> Result<(), Rejection> {
        let reject = |e: FraudError| Rejection::fraud(FRAUD_DETECTION, e);

        rules::check_cvv(&session.payload.credit_card).map_err(reject)?;
        tick(&mut session.clock, FRAUD_DETECTION)?;

        rules::check_country(&session.payload.billing_address).map_err(reject)?;
        tick(&mut session.clock, FRAUD_DETECTION)?;
        Ok(())
    }
}

#[async_trait]
impl<S: SuggestionsService> Participant for LocalFraudDetection<S> {
    type Init = FraudInit;

    fn service_key(&self) -> &'static str {
        FRAUD_DETECTION
    }

    async fn initialize(&self, order_id: OrderId, init: FraudInit) -> CallOutcome<()> {
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
impl<S: SuggestionsService> FraudDetectionService for LocalFraudDetection<S> {
    #[tracing::instrument(skip(self, clock), fields(service = FRAUD_DETECTION))]
    async fn detect_fraud(&self, order_id: OrderId, clock: VectorClock) -> CallOutcome<VectorClock> {
        let mut session = match lock_session(&self.sessions, order_id).await {
            Ok(session) => session,
            Err(rejection) => return rejection.into(),
        };
        session.observe(&clock);

        if let Err(rejection) = Self::run_checks(&mut session) {
            tracing::warn!(%order_id, reason = %rejection.reason, "fraud suspected");
            return rejection.into();
        }

        let downstream = self
            .suggestions
            .generate_suggestions(order_id, session.clock.clone())
            .await;
        if let Err(rejection) = tick(&mut session.clock, FRAUD_DETECTION) {
            return rejection.into();
        }

        match downstream {
            CallOutcome::Ok(reply) => {
                session.observe(&reply);
                tracing::info!(%order_id, clock = %session.clock, "no fraud detected");
                CallOutcome::Ok(session.clock.clone())
            }
            failure => failure,
        }
    }
}
