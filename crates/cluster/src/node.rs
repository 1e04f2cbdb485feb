//! Node identity and role.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A node's fixed rank. Lower numbers take precedence in elections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn new(rank: u32) -> Self {
        Self(rank)
    }

    pub fn rank(&self) -> u32 {
        self.0
    }

    /// Nodes that outrank this one, nearest first: `id-1, id-2, ..., 1`.
    pub fn higher_ranked(&self) -> impl Iterator<Item = NodeId> {
        (1..self.0).rev().map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(NodeId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}
