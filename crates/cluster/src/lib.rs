//! Replicated infrastructure around the checkout saga.
//!
//! - [`Membership`]: bully election with leader heartbeats
//! - [`StoreNode`]: book document replica with chain-forwarded writes
//! - [`FrontDoor`]: follows the store leader's heartbeats and routes document
//!   requests to it
//! - [`OrderExecutor`]: drains the order queue on the executor cluster's leader
//!
//! Nodes talk through the [`transport`] traits, implemented in process by
//! [`InMemoryNetwork`] and over HTTP by [`http::HttpTransport`].

pub mod chain;
pub mod config;
pub mod documents;
pub mod error;
pub mod executor;
pub mod front_door;
pub mod http;
pub mod memory;
pub mod membership;
pub mod node;
pub mod transport;

pub use chain::{StoreNode, WriteOutcome};
pub use config::{MembershipConfig, NodeConfig, RetryPolicy};
pub use documents::DocumentStore;
pub use error::{ClusterError, Result};
pub use executor::{ExecutionReport, LineOutcome, OrderExecutor};
pub use front_door::FrontDoor;
pub use memory::InMemoryNetwork;
pub use membership::{ElectionOutcome, Membership};
pub use node::{NodeId, Role};
pub use transport::{DocumentTransport, HeartbeatObserver, PeerTransport, RpcHandler};
