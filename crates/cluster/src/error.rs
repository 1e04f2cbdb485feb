//! Cluster error types.

use std::time::Duration;

use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur in membership, forwarding and execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The peer could not be reached.
    #[error("Node {node} unreachable: {reason}")]
    Unreachable { node: NodeId, reason: String },

    /// The peer did not answer before the deadline.
    #[error("Node {node} did not answer within {after:?}")]
    Timeout { node: NodeId, after: Duration },

    /// A heartbeat observer could not be reached.
    #[error("Observer {url} unreachable: {reason}")]
    ObserverUnreachable { url: String, reason: String },

    /// No heartbeat has revealed a leader yet.
    #[error("No known leader")]
    NoLeader,

    /// The node does not serve this kind of request.
    #[error("Node {0} does not serve documents")]
    Unsupported(NodeId),

    /// The order queue failed.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    pub fn unreachable(node: NodeId, reason: impl Into<String>) -> Self {
        ClusterError::Unreachable {
            node,
            reason: reason.into(),
        }
    }
}

impl From<saga::SagaError> for ClusterError {
    fn from(err: saga::SagaError) -> Self {
        ClusterError::Queue(err.to_string())
    }
}

/// Convenience type alias for cluster results.
pub type Result<T> = std::result::Result<T, ClusterError>;
