//! Vector clocks for causal ordering between saga participants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by vector clock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// The service key was never initialized in this clock.
    #[error("Unknown service key: {0}")]
    UnknownServiceKey(String),
    /// The service's counter is already at its maximum.
    #[error("Clock counter overflow for service: {0}")]
    Overflow(String),
}

/// A per-service logical counter map.
///
/// A key that is absent from the map reads as `0`. Counters only ever grow:
/// [`merge`](Self::merge) takes the pointwise maximum and
/// [`increment`](Self::increment) adds one to a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<String, u64>);

impl VectorClock {
    /// Creates an empty clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the initial clock of a service: `{service: 0}`.
    pub fn for_service(service: impl Into<String>) -> Self {
        let mut clocks = BTreeMap::new();
        clocks.insert(service.into(), 0);
        Self(clocks)
    }

    /// Returns the counter for `service`, treating a missing key as `0`.
    pub fn get(&self, service: &str) -> u64 {
        self.0.get(service).copied().unwrap_or(0)
    }

    /// Returns true if the clock holds the given key.
    pub fn contains(&self, service: &str) -> bool {
        self.0.contains_key(service)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(service, counter)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns the pointwise maximum of `self` and `other` over the key union.
    #[must_use]
    pub fn merge(&self, other: &VectorClock) -> VectorClock {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    /// Merges `other` into `self` in place.
    pub fn merge_from(&mut self, other: &VectorClock) {
        for (service, &counter) in &other.0 {
            let entry = self.0.entry(service.clone()).or_insert(0);
            *entry = (*entry).max(counter);
        }
    }

    /// Adds one to the counter owned by `service` and returns the new value.
    ///
    /// The key must have been initialized (see [`for_service`](Self::for_service)).
    /// A counter at `u64::MAX` is left untouched and reported as overflow.
    pub fn increment(&mut self, service: &str) -> Result<u64, ClockError> {
        let counter = self
            .0
            .get_mut(service)
            .ok_or_else(|| ClockError::UnknownServiceKey(service.to_string()))?;
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| ClockError::Overflow(service.to_string()))?;
        Ok(*counter)
    }

    /// Returns true if `self[k] >= other[k]` for every key present in `other`.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        other
            .0
            .iter()
            .all(|(service, &counter)| self.get(service) >= counter)
    }

    /// Returns the first key of `other` on which `self` lags, if any,
    /// as `(service, self_counter, other_counter)`.
    pub fn first_lag_behind(&self, other: &VectorClock) -> Option<(String, u64, u64)> {
        other.0.iter().find_map(|(service, &counter)| {
            let ours = self.get(service);
            (ours < counter).then(|| (service.clone(), ours, counter))
        })
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (service, counter)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{service}: {counter}")?;
        }
        write!(f, "}}")
    }
}
