//! In-process network connecting nodes of one cluster.
//!
//! Nodes register their [`RpcHandler`]; the network routes calls to them and
//! can isolate nodes or delay delivery to exercise failure handling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use domain::BookDocument;
use tokio::sync::RwLock;

use crate::error::{ClusterError, Result};
use crate::node::NodeId;
use crate::transport::{DocumentTransport, PeerTransport, RpcHandler};

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<NodeId, Weak<dyn RpcHandler>>,
    isolated: HashSet<NodeId>,
    delays: HashMap<NodeId, Duration>,
}

/// Routes RPCs between nodes living in the same process.
///
/// The registry holds weak references, so dropping a node's last `Arc`
/// makes it unreachable.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handler: &Arc<dyn RpcHandler>) {
        let id = handler.node_id();
        self.state
            .write()
            .await
            .nodes
            .insert(id, Arc::downgrade(handler));
        tracing::debug!(node = %id, "node registered");
    }

    /// Cuts the node off: calls to it fail, and so do membership calls it sends.
    pub async fn isolate(&self, node: NodeId) {
        self.state.write().await.isolated.insert(node);
        tracing::info!(%node, "node isolated");
    }

    pub async fn restore(&self, node: NodeId) {
        self.state.write().await.isolated.remove(&node);
        tracing::info!(%node, "node restored");
    }

    /// Holds every call to `node` for `delay` before delivering it.
    pub async fn set_delay(&self, node: NodeId, delay: Duration) {
        self.state.write().await.delays.insert(node, delay);
    }

    async fn route(&self, to: NodeId, from: Option<NodeId>) -> Result<Arc<dyn RpcHandler>> {
        let (handler, delay) = {
            let state = self.state.read().await;
            if state.isolated.contains(&to) {
                return Err(ClusterError::unreachable(to, "node isolated"));
            }
            if let Some(from) = from
                && state.isolated.contains(&from)
            {
                return Err(ClusterError::unreachable(to, format!("sender {from} isolated")));
            }
            let handler = state
                .nodes
                .get(&to)
                .and_then(Weak::upgrade)
                .ok_or_else(|| ClusterError::unreachable(to, "no such node"))?;
            (handler, state.delays.get(&to).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(handler)
    }
}

#[async_trait]
impl PeerTransport for InMemoryNetwork {
    async fn heartbeat(&self, to: NodeId, from: NodeId) -> Result<()> {
        self.route(to, Some(from)).await?.heartbeat(from).await;
        Ok(())
    }

    async fn election(&self, to: NodeId, from: NodeId) -> Result<()> {
        self.route(to, Some(from)).await?.election(from).await;
        Ok(())
    }
}

#[async_trait]
impl DocumentTransport for InMemoryNetwork {
    async fn get_document(&self, to: NodeId, title: &str) -> Result<Option<BookDocument>> {
        self.route(to, None).await?.get_document(title).await
    }

    async fn update_document(&self, to: NodeId, document: BookDocument) -> Result<()> {
        self.route(to, None).await?.update_document(document).await
    }
}
