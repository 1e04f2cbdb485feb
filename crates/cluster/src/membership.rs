//! Bully election with leader heartbeats.
//!
//! Rank 1 starts as leader. The leader broadcasts a heartbeat every interval
//! to every other rank and to the configured observers. A follower that has
//! not heard a heartbeat within the failure timeout runs an election: it
//! contacts every higher-ranked node one at a time, nearest first, and backs
//! off as soon as one answers. A node that receives an election message runs
//! its own election in the background. If no higher-ranked node answers, the
//! initiator becomes leader and heartbeats immediately.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::MembershipConfig;
use crate::node::{NodeId, Role};
use crate::transport::{HeartbeatObserver, PeerTransport, RpcHandler, call_with_retry};

#[derive(Debug)]
struct MembershipState {
    role: Role,
    last_heartbeat: Instant,
    leader: Option<NodeId>,
}

/// How an election ended for the node that ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// A higher-ranked node answered and takes over the election.
    Deferred(NodeId),
    /// No higher-ranked node answered; this node is now leader.
    Elected,
}

/// One node's view of the cluster.
///
/// Clones share state, so request handlers and the background checker see
/// the same role and heartbeat timestamp.
#[derive(Clone)]
pub struct Membership {
    config: Arc<MembershipConfig>,
    state: Arc<Mutex<MembershipState>>,
    peers: Arc<dyn PeerTransport>,
    observers: Arc<[Arc<dyn HeartbeatObserver>]>,
}

impl Membership {
    pub fn new(
        config: MembershipConfig,
        peers: Arc<dyn PeerTransport>,
        observers: Vec<Arc<dyn HeartbeatObserver>>,
    ) -> Self {
        let leader_at_start = config.node_id == NodeId(1);
        let state = MembershipState {
            role: if leader_at_start {
                Role::Leader
            } else {
                Role::Follower
            },
            last_heartbeat: Instant::now(),
            leader: leader_at_start.then_some(config.node_id),
        };
        tracing::info!(node = %config.node_id, role = %state.role, "membership initialized");

        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
            peers,
            observers: observers.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub async fn role(&self) -> Role {
        self.state.lock().await.role
    }

    pub async fn is_leader(&self) -> bool {
        self.role().await == Role::Leader
    }

    /// The leader this node last heard from, or itself when leading.
    pub async fn known_leader(&self) -> Option<NodeId> {
        self.state.lock().await.leader
    }

    /// Records a heartbeat; the sender becomes the leader.
    pub async fn on_heartbeat(&self, from: NodeId) {
        let mut state = self.state.lock().await;
        state.last_heartbeat = Instant::now();
        state.leader = Some(from);
        let role = if from == self.config.node_id {
            Role::Leader
        } else {
            Role::Follower
        };
        if state.role != role {
            tracing::info!(node = %self.config.node_id, leader = %from, %role, "role changed on heartbeat");
        }
        state.role = role;
    }

    /// Acknowledges an election message and runs this node's own election in
    /// the background.
    pub fn on_election(&self, from: NodeId) -> JoinHandle<ElectionOutcome> {
        tracing::debug!(node = %self.config.node_id, %from, "election message received");
        let this = self.clone();
        tokio::spawn(async move { this.run_election().await })
    }

    #[tracing::instrument(skip(self), fields(node = %self.config.node_id))]
    pub async fn run_election(&self) -> ElectionOutcome {
        metrics::counter!("elections_started_total").increment(1);
        tracing::info!("running election");

        let me = self.config.node_id;
        for target in me.higher_ranked() {
            let result = call_with_retry(self.config.retry, target, || {
                self.peers.election(target, me)
            })
            .await;
            match result {
                Ok(()) => {
                    tracing::info!(%target, "higher-ranked node answered, deferring");
                    return ElectionOutcome::Deferred(target);
                }
                Err(e) => tracing::warn!(%target, error = %e, "no answer to election"),
            }
        }

        {
            let mut state = self.state.lock().await;
            state.role = Role::Leader;
            state.leader = Some(me);
            state.last_heartbeat = Instant::now();
        }
        metrics::counter!("leader_promotions_total").increment(1);
        tracing::info!("no higher-ranked node answered, becoming leader");
        self.broadcast_heartbeat().await;
        ElectionOutcome::Elected
    }

    /// Sends a heartbeat to every other rank and every observer.
    ///
    /// Unreachable targets are logged and skipped.
    pub async fn broadcast_heartbeat(&self) {
        let me = self.config.node_id;
        tracing::debug!(node = %me, "broadcasting heartbeat");

        for target in self.config.others() {
            let result = call_with_retry(self.config.retry, target, || {
                self.peers.heartbeat(target, me)
            })
            .await;
            match result {
                Ok(()) => metrics::counter!("heartbeats_sent_total").increment(1),
                Err(e) => tracing::warn!(node = %me, %target, error = %e, "heartbeat not delivered"),
            }
        }

        for observer in self.observers.iter() {
            if let Err(e) = observer.observe_heartbeat(me).await {
                tracing::warn!(node = %me, error = %e, "observer heartbeat not delivered");
            }
        }
    }

    /// One pass of the failure detector.
    pub async fn tick(&self) {
        let (role, silent_for) = {
            let state = self.state.lock().await;
            (state.role, state.last_heartbeat.elapsed())
        };

        match role {
            Role::Leader => self.broadcast_heartbeat().await,
            Role::Follower if silent_for > self.config.failure_timeout => {
                tracing::warn!(
                    node = %self.config.node_id,
                    silent_secs = silent_for.as_secs(),
                    "leader heartbeat timed out"
                );
                self.run_election().await;
            }
            Role::Follower => tracing::trace!(node = %self.config.node_id, "nothing to do"),
        }
    }

    /// Runs [`tick`](Self::tick) every heartbeat interval until cancelled.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        let every = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => this.tick().await,
                }
            }
            tracing::debug!(node = %this.config.node_id, "membership checker stopped");
        })
    }
}

#[async_trait]
impl RpcHandler for Membership {
    fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    async fn heartbeat(&self, from: NodeId) {
        self.on_heartbeat(from).await;
    }

    async fn election(&self, from: NodeId) {
        self.on_election(from);
    }
}
