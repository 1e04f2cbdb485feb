//! Cluster configuration loaded from environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ClusterError, Result};
use crate::node::NodeId;

/// Deadline and retry budget for one outbound RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            attempts: 2,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Worst-case time spent on one call whose attempts each take `per_attempt`.
    pub fn budget(&self, per_attempt: Duration) -> Duration {
        let attempts = self.attempts.max(1);
        per_attempt * attempts + self.backoff * (attempts - 1)
    }

    /// Per-attempt deadline for a write sent to `target`.
    ///
    /// The target may forward the write to every node above it before
    /// answering, so its deadline covers the full retry budget of each of
    /// those forwards on top of its own `timeout`.
    pub fn chain_deadline(&self, target: NodeId) -> Duration {
        let mut deadlines: Vec<Duration> = Vec::with_capacity(target.rank() as usize);
        for _ in 1..=target.rank() {
            let downstream: Duration = deadlines.iter().map(|d| self.budget(*d)).sum();
            deadlines.push(self.timeout + downstream);
        }
        deadlines.last().copied().unwrap_or(self.timeout)
    }

    /// This policy with its per-attempt deadline widened for writes to `target`.
    pub fn for_chain_write(&self, target: NodeId) -> Self {
        Self {
            timeout: self.chain_deadline(target),
            ..*self
        }
    }
}

/// Settings for one member of a bully-election cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipConfig {
    pub node_id: NodeId,
    /// Ranks run from 1 to `cluster_size`.
    pub cluster_size: u32,
    pub heartbeat_interval: Duration,
    /// A follower that has not heard from a leader for this long starts an election.
    pub failure_timeout: Duration,
    pub retry: RetryPolicy,
}

impl MembershipConfig {
    pub fn new(node_id: NodeId, cluster_size: u32) -> Self {
        Self {
            node_id,
            cluster_size,
            ..Self::default()
        }
    }

    /// Every other rank in the cluster.
    pub fn others(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..=self.cluster_size)
            .map(NodeId)
            .filter(move |id| *id != self.node_id)
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId(1),
            cluster_size: 3,
            heartbeat_interval: Duration::from_secs(10),
            failure_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Configuration of a standalone store node.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `50056`)
/// - `NODE_ID`: this node's rank (default: `1`)
/// - `CLUSTER_SIZE`: number of ranks (default: `3`)
/// - `HEARTBEAT_INTERVAL_SECS` (default: `10`)
/// - `FAILURE_TIMEOUT_SECS` (default: `30`)
/// - `RPC_TIMEOUT_MS` (default: `500`)
/// - `RPC_ATTEMPTS` (default: `2`)
/// - `PEERS`: `rank=url` pairs, comma separated, e.g.
///   `1=http://dbnode1:50056,2=http://dbnode2:50056`
/// - `OBSERVERS`: comma separated base URLs that receive leader heartbeats
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub membership: MembershipConfig,
    pub peers: BTreeMap<NodeId, String>,
    pub observers: Vec<String>,
}

impl NodeConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let node_id = env_parse("NODE_ID").map(NodeId).unwrap_or(defaults.membership.node_id);
        let cluster_size = env_parse("CLUSTER_SIZE").unwrap_or(defaults.membership.cluster_size);
        if node_id.rank() == 0 || node_id.rank() > cluster_size {
            return Err(ClusterError::Config(format!(
                "NODE_ID {} outside 1..={cluster_size}",
                node_id.rank()
            )));
        }

        let retry = RetryPolicy {
            timeout: env_parse("RPC_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.membership.retry.timeout),
            attempts: env_parse("RPC_ATTEMPTS").unwrap_or(defaults.membership.retry.attempts),
            ..defaults.membership.retry
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            membership: MembershipConfig {
                node_id,
                cluster_size,
                heartbeat_interval: env_parse("HEARTBEAT_INTERVAL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.membership.heartbeat_interval),
                failure_timeout: env_parse("FAILURE_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.membership.failure_timeout),
                retry,
            },
            peers: std::env::var("PEERS")
                .map(|raw| parse_peers(&raw))
                .unwrap_or(Ok(BTreeMap::new()))?,
            observers: std::env::var("OBSERVERS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50056,
            membership: MembershipConfig::default(),
            peers: BTreeMap::new(),
            observers: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Splits a comma separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `rank=url` pairs.
pub fn parse_peers(raw: &str) -> Result<BTreeMap<NodeId, String>> {
    parse_list(raw)
        .into_iter()
        .map(|pair| {
            let (rank, url) = pair
                .split_once('=')
                .ok_or_else(|| ClusterError::Config(format!("peer '{pair}' is not rank=url")))?;
            let rank: NodeId = rank
                .parse()
                .map_err(|_| ClusterError::Config(format!("invalid peer rank '{rank}'")))?;
            Ok((rank, url.trim().trim_end_matches('/').to_string()))
        })
        .collect()
}
