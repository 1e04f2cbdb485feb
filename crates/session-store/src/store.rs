//! TTL-bounded, per-order serialized session storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, VectorClock};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SessionError};
use crate::session::SagaSession;

/// Exclusive access to one order's session.
///
/// Holding the guard serializes every other operation on the same order id,
/// so read-modify-write cycles on the clock cannot lose increments.
pub type SessionGuard<P, R = ()> =
    OwnedMappedMutexGuard<Option<SagaSession<P, R>>, SagaSession<P, R>>;

type Cell<P, R> = Arc<Mutex<Option<SagaSession<P, R>>>>;

struct Slot<P, R> {
    cell: Cell<P, R>,
    expires_at: Instant,
}

/// Tuning for a [`SessionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long an untouched session survives.
    pub ttl: Duration,
    /// Maximum number of live sessions.
    pub capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            capacity: 100,
        }
    }
}

/// In-memory session store owned by a single participant.
///
/// The map lock is only held for lookups; each session sits behind its own
/// mutex so unrelated orders never wait on each other.
pub struct SessionStore<P, R = ()> {
    service: Arc<str>,
    config: SessionConfig,
    slots: Arc<RwLock<HashMap<OrderId, Slot<P, R>>>>,
}

impl<P, R> Clone for SessionStore<P, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            config: self.config,
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<P, R> SessionStore<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Creates an empty store whose sessions start with the clock `{service: 0}`.
    pub fn new(service: impl Into<Arc<str>>, config: SessionConfig) -> Self {
        Self {
            service: service.into(),
            config,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The service key this store initializes clocks with.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Creates the session for `order_id`, replacing any existing one.
    ///
    /// Returns `true` when a live session was overwritten.
    pub async fn insert(&self, order_id: OrderId, payload: P) -> bool {
        let now = Instant::now();
        let session = SagaSession::new(order_id, &self.service, payload);

        let mut slots = self.slots.write().await;
        slots.retain(|_, slot| slot.expires_at > now);

        let replaced = slots.remove(&order_id).is_some();
        if !replaced
            && slots.len() >= self.config.capacity
            && let Some(victim) = slots
                .iter()
                .min_by_key(|(_, slot)| slot.expires_at)
                .map(|(id, _)| *id)
        {
            slots.remove(&victim);
            metrics::counter!("session_evictions_total").increment(1);
            tracing::warn!(service = %self.service, order_id = %victim, "session evicted at capacity");
        }

        slots.insert(
            order_id,
            Slot {
                cell: Arc::new(Mutex::new(Some(session))),
                expires_at: now + self.config.ttl,
            },
        );
        replaced
    }

    /// Locks the session for `order_id`, refreshing its TTL.
    pub async fn lock(&self, order_id: OrderId) -> Result<SessionGuard<P, R>> {
        let cell = self.touch(order_id).await?;
        let guard = cell.lock_owned().await;
        OwnedMutexGuard::try_map(guard, |slot| slot.as_mut())
            .map_err(|_| SessionError::UnknownOrder(order_id))
    }

    /// Removes the session once `final_clock` is shown to dominate it.
    ///
    /// Every key of the stored clock must be matched or exceeded by
    /// `final_clock`; a key missing from `final_clock` counts as `0`. An absent
    /// or empty final clock skips the check and removes unconditionally.
    pub async fn clear(
        &self,
        order_id: OrderId,
        final_clock: Option<&VectorClock>,
    ) -> Result<SagaSession<P, R>> {
        let cell = self.touch(order_id).await?;
        let mut slot = cell.lock().await;

        let session = slot.as_ref().ok_or(SessionError::UnknownOrder(order_id))?;
        if let Some(final_clock) = final_clock.filter(|clock| !clock.is_empty())
            && let Some((service, final_counter, stored_counter)) =
                final_clock.first_lag_behind(&session.clock)
        {
            metrics::counter!("causality_violations_total").increment(1);
            return Err(SessionError::CausalityViolation {
                order_id,
                service,
                final_counter,
                stored_counter,
            });
        }

        let session = slot.take().ok_or(SessionError::UnknownOrder(order_id))?;
        drop(slot);

        let mut slots = self.slots.write().await;
        if slots
            .get(&order_id)
            .is_some_and(|current| Arc::ptr_eq(&current.cell, &cell))
        {
            slots.remove(&order_id);
        }
        Ok(session)
    }

    /// Returns true if a live session exists for `order_id`.
    pub async fn contains(&self, order_id: OrderId) -> bool {
        let now = Instant::now();
        self.slots
            .read()
            .await
            .get(&order_id)
            .is_some_and(|slot| slot.expires_at > now)
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| slot.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired session and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| slot.expires_at > now);
        before - slots.len()
    }

    /// Runs [`purge_expired`](Self::purge_expired) every `every` until `cancel` fires.
    pub fn spawn_sweeper(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = store.purge_expired().await;
                        if purged > 0 {
                            tracing::debug!(service = %store.service, purged, "expired sessions purged");
                        }
                    }
                }
            }
        })
    }

    async fn touch(&self, order_id: OrderId) -> Result<Cell<P, R>> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(&order_id)
            && slot.expires_at > now
        {
            slot.expires_at = now + self.config.ttl;
            return Ok(Arc::clone(&slot.cell));
        }
        if slots.remove(&order_id).is_some() {
            tracing::debug!(service = %self.service, %order_id, "session expired");
        }
        Err(SessionError::UnknownOrder(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore<String> {
        SessionStore::new("TRANSACTION_VERIFICATION", SessionConfig::default())
    }

    fn clock(pairs: &[(&str, u64)]) -> VectorClock {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[tokio::test]
    async fn test_insert_and_lock() {
        let store = store();
        let order_id = OrderId::new();
        assert!(!store.insert(order_id, "payload".to_string()).await);

        let session = store.lock(order_id).await.unwrap();
        assert_eq!(session.payload, "payload");
        assert_eq!(session.clock, VectorClock::for_service("TRANSACTION_VERIFICATION"));
    }

    #[tokio::test]
    async fn test_insert_overwrites_existing_session() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, "first".to_string()).await;
        {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
        }

        assert!(store.insert(order_id, "second".to_string()).await);
        let session = store.lock(order_id).await.unwrap();
        assert_eq!(session.payload, "second");
        assert_eq!(session.clock.get("TRANSACTION_VERIFICATION"), 0);
    }

    #[tokio::test]
    async fn test_lock_unknown_order() {
        let store = store();
        let order_id = OrderId::new();
        let result = store.lock(order_id).await;
        assert!(matches!(result, Err(SessionError::UnknownOrder(id)) if id == order_id));
    }

    #[tokio::test]
    async fn test_mutations_persist_between_locks() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;

        for _ in 0..3 {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
        }

        let session = store.lock(order_id).await.unwrap();
        assert_eq!(session.clock.get("TRANSACTION_VERIFICATION"), 3);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut session = store.lock(order_id).await.unwrap();
                let current = session.clock.get("TRANSACTION_VERIFICATION");
                tokio::task::yield_now().await;
                session.clock.merge_from(&clock(&[("TRANSACTION_VERIFICATION", current + 1)]));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let session = store.lock(order_id).await.unwrap();
        assert_eq!(session.clock.get("TRANSACTION_VERIFICATION"), 32);
    }

    #[tokio::test]
    async fn test_clear_with_dominating_clock() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;
        {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
        }

        let final_clock = clock(&[("TRANSACTION_VERIFICATION", 4), ("FRAUD_DETECTION", 2)]);
        let removed = store.clear(order_id, Some(&final_clock)).await.unwrap();
        assert_eq!(removed.clock.get("TRANSACTION_VERIFICATION"), 1);

        assert!(!store.contains(order_id).await);
        assert!(matches!(
            store.lock(order_id).await,
            Err(SessionError::UnknownOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_with_smaller_clock_is_causality_violation() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;
        {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
        }

        let stale = clock(&[("TRANSACTION_VERIFICATION", 1)]);
        let result = store.clear(order_id, Some(&stale)).await;
        assert_eq!(
            result,
            Err(SessionError::CausalityViolation {
                order_id,
                service: "TRANSACTION_VERIFICATION".to_string(),
                final_counter: 1,
                stored_counter: 2,
            })
        );
        // The session survives a rejected clear.
        assert!(store.contains(order_id).await);
    }

    #[tokio::test]
    async fn test_clear_with_missing_key_counts_as_zero() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;
        {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.merge_from(&clock(&[("SUGGESTIONS", 1)]));
        }

        let final_clock = clock(&[("TRANSACTION_VERIFICATION", 5)]);
        let result = store.clear(order_id, Some(&final_clock)).await;
        assert!(matches!(
            result,
            Err(SessionError::CausalityViolation { ref service, .. }) if service == "SUGGESTIONS"
        ));
    }

    #[tokio::test]
    async fn test_clear_without_clock_is_unconditional() {
        let store = store();
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;
        {
            let mut session = store.lock(order_id).await.unwrap();
            session.clock.increment("TRANSACTION_VERIFICATION").unwrap();
        }

        store.clear(order_id, None).await.unwrap();
        assert!(!store.contains(order_id).await);

        store.insert(order_id, String::new()).await;
        store.clear(order_id, Some(&VectorClock::new())).await.unwrap();
        assert!(!store.contains(order_id).await);
    }

    #[tokio::test]
    async fn test_clear_unknown_order() {
        let store = store();
        let result = store.clear(OrderId::new(), None).await;
        assert!(matches!(result, Err(SessionError::UnknownOrder(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_ttl() {
        let store: SessionStore<String> = SessionStore::new(
            "SUGGESTIONS",
            SessionConfig {
                ttl: Duration::from_secs(60),
                capacity: 10,
            },
        );
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!store.contains(order_id).await);
        assert!(matches!(
            store.lock(order_id).await,
            Err(SessionError::UnknownOrder(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_refreshes_ttl() {
        let store: SessionStore<String> = SessionStore::new("SUGGESTIONS", SessionConfig::default());
        let order_id = OrderId::new();
        store.insert(order_id, String::new()).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        drop(store.lock(order_id).await.unwrap());
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(store.contains(order_id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = store();
        store.insert(OrderId::new(), String::new()).await;
        store.insert(OrderId::new(), String::new()).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = OrderId::new();
        store.insert(fresh, String::new()).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.contains(fresh).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_entry_closest_to_expiry() {
        let store: SessionStore<String> = SessionStore::new(
            "FRAUD_DETECTION",
            SessionConfig {
                ttl: Duration::from_secs(60),
                capacity: 2,
            },
        );
        let oldest = OrderId::new();
        store.insert(oldest, String::new()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let middle = OrderId::new();
        store.insert(middle, String::new()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let newest = OrderId::new();
        store.insert(newest, String::new()).await;

        assert_eq!(store.len().await, 2);
        assert!(!store.contains(oldest).await);
        assert!(store.contains(middle).await);
        assert!(store.contains(newest).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel() {
        let store = store();
        store.insert(OrderId::new(), String::new()).await;
        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(store.slots.read().await.len(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
