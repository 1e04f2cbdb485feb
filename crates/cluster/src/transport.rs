//! The RPC seams between cluster nodes.
//!
//! [`RpcHandler`] is the server side of a node; [`PeerTransport`] and
//! [`DocumentTransport`] are the client side used to reach other nodes.
//! Implementations exist for an in-process network and for HTTP.

use std::future::Future;

use async_trait::async_trait;
use domain::BookDocument;

use crate::config::RetryPolicy;
use crate::error::{ClusterError, Result};
use crate::node::NodeId;

/// Inbound RPCs a node answers.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// A leader announced itself.
    async fn heartbeat(&self, from: NodeId);

    /// A lower-priority node is running an election.
    async fn election(&self, from: NodeId);

    async fn get_document(&self, _title: &str) -> Result<Option<BookDocument>> {
        Err(ClusterError::Unsupported(self.node_id()))
    }

    async fn update_document(&self, _document: BookDocument) -> Result<()> {
        Err(ClusterError::Unsupported(self.node_id()))
    }
}

/// Outbound membership RPCs.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn heartbeat(&self, to: NodeId, from: NodeId) -> Result<()>;

    async fn election(&self, to: NodeId, from: NodeId) -> Result<()>;
}

/// Outbound document RPCs.
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    async fn get_document(&self, to: NodeId, title: &str) -> Result<Option<BookDocument>>;

    async fn update_document(&self, to: NodeId, document: BookDocument) -> Result<()>;
}

/// A process that needs to know who leads a cluster it is not a member of.
#[async_trait]
pub trait HeartbeatObserver: Send + Sync {
    async fn observe_heartbeat(&self, leader: NodeId) -> Result<()>;
}

/// Runs `call` with a per-attempt deadline, retrying up to the policy's budget.
pub async fn call_with_retry<T, F, Fut>(policy: RetryPolicy, target: NodeId, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = ClusterError::unreachable(target, "no attempt made");

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_error = e,
            Err(_) => {
                last_error = ClusterError::Timeout {
                    node: target,
                    after: policy.timeout,
                }
            }
        }
        tracing::debug!(node = %target, attempt, attempts, error = %last_error, "rpc attempt failed");
        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(100),
            attempts,
            backoff: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = call_with_retry(policy(3), NodeId(1), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClusterError::unreachable(NodeId(1), "refused"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = call_with_retry(policy(2), NodeId(2), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ClusterError::unreachable(NodeId(2), "refused")) }
        })
        .await;

        assert!(matches!(result, Err(ClusterError::Unreachable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_turns_into_timeout() {
        let result: Result<()> = call_with_retry(policy(1), NodeId(3), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(ClusterError::Timeout {
                node: NodeId(3),
                after: Duration::from_millis(100),
            })
        );
    }
}
