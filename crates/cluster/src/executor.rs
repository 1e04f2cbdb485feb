//! Order execution driven by the executor cluster's leader.

use std::sync::Arc;
use std::time::Duration;

use common::OrderId;
use domain::OrderItem;
use saga::{OrderQueue, QueuedOrder};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::front_door::FrontDoor;
use crate::membership::Membership;

/// Default pause between dequeue attempts.
pub const DEFAULT_EXECUTION_INTERVAL: Duration = Duration::from_secs(5);

/// What happened to one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Stock was decremented to `remaining`.
    Reserved { title: String, remaining: u32 },
    /// The store holds no document for the title.
    UnknownBook { title: String },
    InsufficientStock { title: String, available: u32, requested: u32 },
}

/// A dequeued order and the outcome of each of its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub lines: Vec<LineOutcome>,
}

/// Pulls accepted orders off the queue and updates book stock.
///
/// Only the node that believes it leads the executor cluster dequeues.
#[derive(Clone)]
pub struct OrderExecutor {
    membership: Membership,
    queue: Arc<dyn OrderQueue>,
    documents: Arc<FrontDoor>,
    interval: Duration,
}

impl OrderExecutor {
    pub fn new(membership: Membership, queue: Arc<dyn OrderQueue>, documents: Arc<FrontDoor>) -> Self {
        Self {
            membership,
            queue,
            documents,
            interval: DEFAULT_EXECUTION_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Executes the next queued order if this node leads.
    ///
    /// Returns `None` when this node is a follower, no store leader is known
    /// yet, or the queue is empty.
    #[tracing::instrument(skip(self), fields(node = %self.membership.id()))]
    pub async fn execute_next(&self) -> Result<Option<ExecutionReport>> {
        if !self.membership.is_leader().await {
            tracing::debug!("not the leader, skipping execution");
            return Ok(None);
        }

        if self.documents.leader().is_none() {
            tracing::debug!("store leader unknown, leaving the queue untouched");
            return Ok(None);
        }

        let Some(order) = self.queue.dequeue().await? else {
            tracing::debug!("queue empty");
            return Ok(None);
        };
        let report = self.execute(order).await?;
        metrics::counter!("orders_executed_total").increment(1);
        tracing::info!(order_id = %report.order_id, lines = report.lines.len(), "order executed");
        Ok(Some(report))
    }

    /// Runs every line of `order` against the store.
    ///
    /// When the store fails mid-order, the lines not yet processed go back on
    /// the queue under the same order id; lines already reserved stay applied
    /// and are not retried.
    async fn execute(&self, order: QueuedOrder) -> Result<ExecutionReport> {
        let mut lines = Vec::with_capacity(order.request.items.len());

        for (done, item) in order.request.items.iter().enumerate() {
            match self.execute_line(order.order_id, item).await {
                Ok(line) => lines.push(line),
                Err(e) => {
                    self.requeue_remaining(&order, done).await;
                    return Err(e);
                }
            }
        }

        Ok(ExecutionReport {
            order_id: order.order_id,
            lines,
        })
    }

    async fn execute_line(&self, order_id: OrderId, item: &OrderItem) -> Result<LineOutcome> {
        let Some(mut document) = self.documents.get_document(&item.name).await? else {
            tracing::warn!(%order_id, title = %item.name, "unknown book");
            return Ok(LineOutcome::UnknownBook {
                title: item.name.clone(),
            });
        };

        if document.stock < item.quantity {
            tracing::warn!(
                %order_id,
                title = %item.name,
                available = document.stock,
                requested = item.quantity,
                "insufficient stock"
            );
            return Ok(LineOutcome::InsufficientStock {
                title: item.name.clone(),
                available: document.stock,
                requested: item.quantity,
            });
        }

        document.stock -= item.quantity;
        let remaining = document.stock;
        self.documents.update_document(document).await?;
        Ok(LineOutcome::Reserved {
            title: item.name.clone(),
            remaining,
        })
    }

    async fn requeue_remaining(&self, order: &QueuedOrder, done: usize) {
        let mut request = order.request.clone();
        request.items = order.request.items[done..].to_vec();
        let pending = request.items.len();

        match self.queue.enqueue(QueuedOrder::new(order.order_id, request)).await {
            Ok(()) => {
                metrics::counter!("orders_requeued_total").increment(1);
                tracing::warn!(order_id = %order.order_id, pending, "store unavailable, order requeued");
            }
            Err(e) => {
                tracing::error!(order_id = %order.order_id, pending, error = %e, "order lost, requeue failed");
            }
        }
    }

    /// Calls [`execute_next`](Self::execute_next) every interval until cancelled.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + this.interval;
            let mut interval = tokio::time::interval_at(start, this.interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = this.execute_next().await {
                            tracing::error!(error = %e, "order execution failed");
                        }
                    }
                }
            }
        })
    }
}
