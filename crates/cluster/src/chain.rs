//! Store nodes with chain-forwarded writes.
//!
//! A write received by node `n` is offered to `n-1, n-2, ..., 1` in turn.
//! The first node that accepts takes over (and forwards again on its own), so
//! the write travels to the highest-ranked reachable node, the chain tail,
//! which applies it. Unreachable intermediaries are skipped. A hop's deadline
//! covers the retry budget of every forward the target may make in turn (see
//! [`RetryPolicy::chain_deadline`]). Reads are served from the local copy
//! without forwarding.

use std::sync::Arc;

use async_trait::async_trait;
use domain::BookDocument;

use crate::config::RetryPolicy;
use crate::documents::DocumentStore;
use crate::error::Result;
use crate::membership::Membership;
use crate::node::NodeId;
use crate::transport::{DocumentTransport, RpcHandler, call_with_retry};

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A higher-ranked node accepted the write.
    Forwarded(NodeId),
    /// No higher-ranked node was reachable; the write was applied here.
    Applied,
}

/// A document store replica taking part in leader election.
pub struct StoreNode {
    membership: Membership,
    documents: DocumentStore,
    transport: Arc<dyn DocumentTransport>,
    retry: RetryPolicy,
}

impl StoreNode {
    pub fn new(
        membership: Membership,
        documents: DocumentStore,
        transport: Arc<dyn DocumentTransport>,
    ) -> Self {
        let retry = membership.config().retry;
        Self {
            membership,
            documents,
            transport,
            retry,
        }
    }

    pub fn id(&self) -> NodeId {
        self.membership.id()
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Reads the local copy.
    pub async fn read(&self, title: &str) -> Option<BookDocument> {
        self.documents.get(title).await
    }

    #[tracing::instrument(skip(self, document), fields(node = %self.id(), title = %document.title))]
    pub async fn write(&self, document: BookDocument) -> WriteOutcome {
        for target in self.id().higher_ranked() {
            let result = call_with_retry(self.retry.for_chain_write(target), target, || {
                self.transport.update_document(target, document.clone())
            })
            .await;
            match result {
                Ok(()) => {
                    metrics::counter!("chain_forwards_total").increment(1);
                    tracing::debug!(%target, "write forwarded");
                    return WriteOutcome::Forwarded(target);
                }
                Err(e) => tracing::warn!(%target, error = %e, "skipping unreachable chain node"),
            }
        }

        tracing::info!(stock = document.stock, "chain tail applying write");
        self.documents.put(document).await;
        WriteOutcome::Applied
    }
}

#[async_trait]
impl RpcHandler for StoreNode {
    fn node_id(&self) -> NodeId {
        self.id()
    }

    async fn heartbeat(&self, from: NodeId) {
        self.membership.on_heartbeat(from).await;
    }

    async fn election(&self, from: NodeId) {
        self.membership.on_election(from);
    }

    async fn get_document(&self, title: &str) -> Result<Option<BookDocument>> {
        Ok(self.read(title).await)
    }

    async fn update_document(&self, document: BookDocument) -> Result<()> {
        self.write(document).await;
        Ok(())
    }
}
