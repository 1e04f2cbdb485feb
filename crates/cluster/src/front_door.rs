//! Leader-aware entry point to the document store cluster.

use std::sync::Arc;

use async_trait::async_trait;
use domain::BookDocument;
use tokio::sync::watch;

use crate::config::RetryPolicy;
use crate::error::{ClusterError, Result};
use crate::node::NodeId;
use crate::transport::{DocumentTransport, HeartbeatObserver, call_with_retry};

/// Tracks the store leader from its heartbeats and sends every document
/// request to it.
pub struct FrontDoor {
    leader: watch::Sender<Option<NodeId>>,
    transport: Arc<dyn DocumentTransport>,
    retry: RetryPolicy,
}

impl FrontDoor {
    pub fn new(transport: Arc<dyn DocumentTransport>, retry: RetryPolicy) -> Self {
        let (leader, _) = watch::channel(None);
        Self {
            leader,
            transport,
            retry,
        }
    }

    /// The last leader seen in a heartbeat.
    pub fn leader(&self) -> Option<NodeId> {
        *self.leader.borrow()
    }

    /// Watches leader changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<NodeId>> {
        self.leader.subscribe()
    }

    pub fn record_heartbeat(&self, leader: NodeId) {
        let previous = self.leader.send_replace(Some(leader));
        if previous != Some(leader) {
            tracing::info!(%leader, "store leader changed");
        }
    }

    fn current_leader(&self) -> Result<NodeId> {
        self.leader().ok_or(ClusterError::NoLeader)
    }

    pub async fn get_document(&self, title: &str) -> Result<Option<BookDocument>> {
        let leader = self.current_leader()?;
        call_with_retry(self.retry, leader, || {
            self.transport.get_document(leader, title)
        })
        .await
    }

    pub async fn update_document(&self, document: BookDocument) -> Result<()> {
        let leader = self.current_leader()?;
        call_with_retry(self.retry.for_chain_write(leader), leader, || {
            self.transport.update_document(leader, document.clone())
        })
        .await
    }
}

#[async_trait]
impl HeartbeatObserver for FrontDoor {
    async fn observe_heartbeat(&self, leader: NodeId) -> Result<()> {
        self.record_heartbeat(leader);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        requests: Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl DocumentTransport for FakeStore {
        async fn get_document(&self, to: NodeId, title: &str) -> Result<Option<BookDocument>> {
            self.requests.lock().unwrap().push(to);
            Ok(Some(BookDocument {
                title: title.to_string(),
                author: "Tove Jansson".into(),
                description: String::new(),
                price: 1.0,
                stock: 1,
            }))
        }

        async fn update_document(&self, to: NodeId, _document: BookDocument) -> Result<()> {
            self.requests.lock().unwrap().push(to);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_leader_yet() {
        let door = FrontDoor::new(Arc::new(FakeStore::default()), RetryPolicy::default());
        assert_eq!(door.leader(), None);
        assert_eq!(
            door.get_document("Moomin").await,
            Err(ClusterError::NoLeader)
        );
    }

    #[tokio::test]
    async fn test_requests_follow_latest_heartbeat() {
        let store = Arc::new(FakeStore::default());
        let door = FrontDoor::new(store.clone(), RetryPolicy::default());
        let mut changes = door.subscribe();

        door.observe_heartbeat(NodeId(1)).await.unwrap();
        assert!(changes.has_changed().unwrap());
        let doc = door.get_document("Moomin").await.unwrap().unwrap();

        door.observe_heartbeat(NodeId(2)).await.unwrap();
        door.update_document(doc).await.unwrap();

        assert_eq!(*store.requests.lock().unwrap(), vec![NodeId(1), NodeId(2)]);
        assert_eq!(door.leader(), Some(NodeId(2)));
    }
}
