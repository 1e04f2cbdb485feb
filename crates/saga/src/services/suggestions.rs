//! Book suggestions: the last link of the verification chain.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, VectorClock};
use domain::{Book, suggestion_catalog};
use rand::seq::SliceRandom;
use session_store::{SessionConfig, SessionStore};

use super::{clear_session, lock_session, open_session, tick};
use crate::error::SagaError;
use crate::outcome::{CallOutcome, Rejection};
use crate::participant::{
    Participant, SUGGESTIONS, SuggestionsInit, SuggestionsReply, SuggestionsService,
};

/// Number of books suggested per order.
pub const DEFAULT_SUGGESTION_COUNT: usize = 3;

/// Picks random books from a catalog and caches them per order.
#[derive(Clone)]
pub struct LocalSuggestions {
    sessions: SessionStore<SuggestionsInit, Vec<Book>>,
    catalog: Arc<[Book]>,
    count: usize,
}

impl LocalSuggestions {
    /// Creates a service over the bookstore catalog.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_catalog(suggestion_catalog(), DEFAULT_SUGGESTION_COUNT, config)
    }

    pub fn with_catalog(catalog: Vec<Book>, count: usize, config: SessionConfig) -> Self {
        Self {
            sessions: SessionStore::new(SUGGESTIONS, config),
            catalog: catalog.into(),
            count,
        }
    }

    pub fn sessions(&self) -> &SessionStore<SuggestionsInit, Vec<Book>> {
        &self.sessions
    }

    /// Chooses up to `count` distinct books, never the one being ordered.
    fn pick(&self, ordered_title: Option<&str>) -> Vec<Book> {
        let candidates: Vec<&Book> = self
            .catalog
            .iter()
            .filter(|book| Some(book.title.as_str()) != ordered_title)
            .collect();
        candidates
            .choose_multiple(&mut rand::thread_rng(), self.count)
            .map(|&book| book.clone())
            .collect()
    }
}

#[async_trait]
impl Participant for LocalSuggestions {
    type Init = SuggestionsInit;

    fn service_key(&self) -> &'static str {
        SUGGESTIONS
    }

    async fn initialize(&self, order_id: OrderId, init: SuggestionsInit) -> CallOutcome<()> {
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
impl SuggestionsService for LocalSuggestions {
    #[tracing::instrument(skip(self, clock), fields(service = SUGGESTIONS))]
    async fn generate_suggestions(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<VectorClock> {
        let mut session = match lock_session(&self.sessions, order_id).await {
            Ok(session) => session,
            Err(rejection) => return rejection.into(),
        };
        session.observe(&clock);

        let books = self.pick(session.payload.title.as_deref());
        tracing::info!(%order_id, count = books.len(), "suggestions generated");
        session.cached = Some(books);

        if let Err(rejection) = tick(&mut session.clock, SUGGESTIONS) {
            return rejection.into();
        }
        CallOutcome::Ok(session.clock.clone())
    }

    #[tracing::instrument(skip(self, clock), fields(service = SUGGESTIONS))]
    async fn get_suggestions(
        &self,
        order_id: OrderId,
        clock: VectorClock,
    ) -> CallOutcome<SuggestionsReply> {
        let mut session = match lock_session(&self.sessions, order_id).await {
            Ok(session) => session,
            Err(rejection) => return rejection.into(),
        };
        session.observe(&clock);
        if let Err(rejection) = tick(&mut session.clock, SUGGESTIONS) {
            return rejection.into();
        }

        match &session.cached {
            Some(books) => CallOutcome::Ok(SuggestionsReply {
                books: books.clone(),
                clock: session.clock.clone(),
            }),
            None => Rejection::internal(SUGGESTIONS, "Suggestions have not been generated yet.")
                .into(),
        }
    }
}
