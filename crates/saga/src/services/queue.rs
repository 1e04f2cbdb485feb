//! Order queue trait and in-memory priority implementation.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::CheckoutRequest;
use tokio::sync::Mutex;

use crate::error::SagaError;

/// An accepted order waiting to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedOrder {
    pub order_id: OrderId,
    pub request: CheckoutRequest,
}

impl QueuedOrder {
    pub fn new(order_id: OrderId, request: CheckoutRequest) -> Self {
        Self { order_id, request }
    }

    /// Smaller values are served first.
    pub fn priority(&self) -> usize {
        self.request.item_count()
    }
}

/// Trait for the queue between the coordinator and the order executors.
#[async_trait]
pub trait OrderQueue: Send + Sync {
    async fn enqueue(&self, order: QueuedOrder) -> Result<(), SagaError>;

    /// Removes the highest-priority order, if any.
    async fn dequeue(&self) -> Result<Option<QueuedOrder>, SagaError>;
}

#[derive(Debug)]
struct Entry {
    priority: usize,
    sequence: u64,
    order: QueuedOrder,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Reverse<Entry>>,
    next_sequence: u64,
}

/// Priority queue ordered by cart size, FIFO among equal sizes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryOrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderQueue for InMemoryOrderQueue {
    async fn enqueue(&self, order: QueuedOrder) -> Result<(), SagaError> {
        let mut state = self.state.lock().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        tracing::info!(order_id = %order.order_id, priority = order.priority(), "order enqueued");
        state.heap.push(Reverse(Entry {
            priority: order.priority(),
            sequence,
            order,
        }));
        metrics::gauge!("order_queue_depth").set(state.heap.len() as f64);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueuedOrder>, SagaError> {
        let mut state = self.state.lock().await;
        let order = state.heap.pop().map(|Reverse(entry)| entry.order);
        metrics::gauge!("order_queue_depth").set(state.heap.len() as f64);
        if let Some(order) = &order {
            tracing::info!(order_id = %order.order_id, "order dequeued");
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderItem;

    fn order_with_lines(lines: usize) -> QueuedOrder {
        let request = CheckoutRequest {
            items: (0..lines)
                .map(|i| OrderItem::new(format!("Book {i}"), 1))
                .collect(),
            ..Default::default()
        };
        QueuedOrder::new(OrderId::new(), request)
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let queue = InMemoryOrderQueue::new();
        assert!(queue.is_empty().await);
        assert_eq!(queue.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_smaller_carts_first() {
        let queue = InMemoryOrderQueue::new();
        let big = order_with_lines(3);
        let small = order_with_lines(1);
        let medium = order_with_lines(2);

        queue.enqueue(big.clone()).await.unwrap();
        queue.enqueue(small.clone()).await.unwrap();
        queue.enqueue(medium.clone()).await.unwrap();
        assert_eq!(queue.len().await, 3);

        assert_eq!(queue.dequeue().await.unwrap(), Some(small));
        assert_eq!(queue.dequeue().await.unwrap(), Some(medium));
        assert_eq!(queue.dequeue().await.unwrap(), Some(big));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_fifo_among_equal_priority() {
        let queue = InMemoryOrderQueue::new();
        let first = order_with_lines(2);
        let second = order_with_lines(2);

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap(), Some(first));
        assert_eq!(queue.dequeue().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let queue = InMemoryOrderQueue::new();
        let other = queue.clone();
        queue.enqueue(order_with_lines(1)).await.unwrap();
        assert_eq!(other.len().await, 1);
    }
}
