//! Shared application state and the in-process backbone behind it.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use cluster::{
    DocumentStore, FrontDoor, HeartbeatObserver, InMemoryNetwork, Membership, MembershipConfig,
    NodeId, OrderExecutor, RetryPolicy, RpcHandler, StoreNode,
};
use saga::{
    InMemoryOrderQueue, LocalFraudDetection, LocalSuggestions, LocalTransactionVerification,
    SagaCoordinator,
};
use session_store::SessionConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

pub type FraudDetection = LocalFraudDetection<LocalSuggestions>;
pub type TransactionVerification = LocalTransactionVerification<FraudDetection>;

/// The coordinator the gateway runs checkouts through.
pub type Checkout = SagaCoordinator<TransactionVerification, FraudDetection, LocalSuggestions>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: Checkout,
    pub front_door: Arc<FrontDoor>,
}

/// The three participants, chained TV → FD → suggestions.
#[derive(Clone)]
pub struct Participants {
    pub suggestions: LocalSuggestions,
    pub fraud_detection: FraudDetection,
    pub transaction_verification: TransactionVerification,
}

impl Participants {
    pub fn new(config: SessionConfig) -> Self {
        let suggestions = LocalSuggestions::new(config);
        let fraud_detection = LocalFraudDetection::new(suggestions.clone(), config);
        let transaction_verification =
            LocalTransactionVerification::new(fraud_detection.clone(), config);
        Self {
            suggestions,
            fraud_detection,
            transaction_verification,
        }
    }

    /// Pins the date card expiry is checked against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.transaction_verification = self.transaction_verification.with_reference_date(date);
        self
    }

    /// Starts one expiry sweeper per participant session store.
    pub fn spawn_sweepers(&self, every: Duration, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            self.transaction_verification
                .sessions()
                .spawn_sweeper(every, cancel.clone()),
            self.fraud_detection
                .sessions()
                .spawn_sweeper(every, cancel.clone()),
            self.suggestions.sessions().spawn_sweeper(every, cancel.clone()),
        ]
    }

    fn coordinator(&self) -> Checkout {
        SagaCoordinator::new(
            self.transaction_verification.clone(),
            self.fraud_detection.clone(),
            self.suggestions.clone(),
        )
    }
}

/// Everything running behind the gateway: participants, order queue, the
/// document store cluster and the executor cluster.
///
/// Background tasks stop when the cancellation token passed to
/// [`Backbone::start`] is cancelled.
pub struct Backbone {
    pub state: Arc<AppState>,
    pub participants: Participants,
    pub queue: InMemoryOrderQueue,
    pub store_nodes: Vec<Arc<StoreNode>>,
    pub executors: Vec<OrderExecutor>,
    // The networks only hold weak references to their nodes.
    _executor_handlers: Vec<Arc<dyn RpcHandler>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Backbone {
    #[tracing::instrument(skip_all, fields(cluster_size = config.cluster_size))]
    pub async fn start(config: &Config, participants: Participants, cancel: &CancellationToken) -> Self {
        let mut tasks = participants.spawn_sweepers(config.session.ttl, cancel);
        let queue = InMemoryOrderQueue::new();

        let store_network = InMemoryNetwork::new();
        let front_door = Arc::new(FrontDoor::new(
            Arc::new(store_network.clone()),
            RetryPolicy::default(),
        ));

        let mut store_nodes = Vec::new();
        for rank in 1..=config.cluster_size {
            let observers: Vec<Arc<dyn HeartbeatObserver>> = vec![front_door.clone()];
            let membership = Membership::new(
                MembershipConfig::new(NodeId(rank), config.cluster_size),
                Arc::new(store_network.clone()),
                observers,
            );
            let node = Arc::new(StoreNode::new(
                membership,
                DocumentStore::seeded(),
                Arc::new(store_network.clone()),
            ));
            let handler: Arc<dyn RpcHandler> = node.clone();
            store_network.register(&handler).await;
            tasks.push(node.membership().spawn(cancel.clone()));
            store_nodes.push(node);
        }

        let executor_network = InMemoryNetwork::new();
        let mut executors = Vec::new();
        let mut executor_handlers = Vec::new();
        for rank in 1..=config.cluster_size {
            let membership = Membership::new(
                MembershipConfig::new(NodeId(rank), config.cluster_size),
                Arc::new(executor_network.clone()),
                vec![],
            );
            let handler: Arc<dyn RpcHandler> = Arc::new(membership.clone());
            executor_network.register(&handler).await;
            tasks.push(membership.spawn(cancel.clone()));

            let executor = OrderExecutor::new(membership, Arc::new(queue.clone()), front_door.clone())
                .with_interval(config.execution_interval);
            tasks.push(executor.spawn(cancel.clone()));
            executors.push(executor);
            executor_handlers.push(handler);
        }

        let coordinator = participants.coordinator().with_queue(Arc::new(queue.clone()));
        tracing::info!("backbone started");

        Self {
            state: Arc::new(AppState {
                coordinator,
                front_door,
            }),
            participants,
            queue,
            store_nodes,
            executors,
            _executor_handlers: executor_handlers,
            tasks,
        }
    }

    /// Waits for every background task to stop after cancellation.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "background task panicked");
            }
        }
    }
}
