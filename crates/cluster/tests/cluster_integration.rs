//! Integration tests for election, chain forwarding and order execution.

use std::sync::Arc;
use std::time::Duration;

use cluster::{
    DocumentStore, FrontDoor, HeartbeatObserver, InMemoryNetwork, LineOutcome, Membership,
    MembershipConfig, NodeId, OrderExecutor, RetryPolicy, Role, RpcHandler, StoreNode,
    WriteOutcome,
};
use common::OrderId;
use domain::{BookDocument, CheckoutRequest, OrderItem};
use saga::{InMemoryOrderQueue, OrderQueue, QueuedOrder};
use tokio_util::sync::CancellationToken;

const SIZE: u32 = 3;

fn membership_config(node: u32) -> MembershipConfig {
    MembershipConfig::new(NodeId(node), SIZE)
}

/// Plain membership nodes registered on one network.
async fn membership_cluster(network: &InMemoryNetwork) -> (Vec<Membership>, Vec<Arc<dyn RpcHandler>>) {
    let mut members = Vec::new();
    let mut handlers = Vec::new();
    for node in 1..=SIZE {
        let member = Membership::new(membership_config(node), Arc::new(network.clone()), vec![]);
        let handler: Arc<dyn RpcHandler> = Arc::new(member.clone());
        network.register(&handler).await;
        members.push(member);
        handlers.push(handler);
    }
    (members, handlers)
}

struct StoreCluster {
    network: InMemoryNetwork,
    nodes: Vec<Arc<StoreNode>>,
    front_door: Arc<FrontDoor>,
}

impl StoreCluster {
    async fn new() -> Self {
        let network = InMemoryNetwork::new();
        let front_door = Arc::new(FrontDoor::new(
            Arc::new(network.clone()),
            RetryPolicy::default(),
        ));

        let mut nodes = Vec::new();
        for node in 1..=SIZE {
            let observers: Vec<Arc<dyn HeartbeatObserver>> = vec![front_door.clone()];
            let membership =
                Membership::new(membership_config(node), Arc::new(network.clone()), observers);
            let store = Arc::new(StoreNode::new(
                membership,
                DocumentStore::seeded(),
                Arc::new(network.clone()),
            ));
            let handler: Arc<dyn RpcHandler> = store.clone();
            network.register(&handler).await;
            nodes.push(store);
        }

        Self {
            network,
            nodes,
            front_door,
        }
    }

    fn node(&self, rank: u32) -> &StoreNode {
        &self.nodes[rank as usize - 1]
    }

    async fn stock(&self, rank: u32, title: &str) -> u32 {
        self.node(rank).read(title).await.unwrap().stock
    }
}

fn with_stock(mut document: BookDocument, stock: u32) -> BookDocument {
    document.stock = stock;
    document
}

#[tokio::test(start_paused = true)]
async fn test_silenced_leader_is_replaced_by_next_rank() {
    let network = InMemoryNetwork::new();
    let (members, _handlers) = membership_cluster(&network).await;
    let cancels: Vec<CancellationToken> = members
        .iter()
        .map(|member| {
            let cancel = CancellationToken::new();
            member.spawn(cancel.clone());
            cancel
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(members[0].is_leader().await);
    assert_eq!(members[1].known_leader().await, Some(NodeId(1)));
    assert_eq!(members[2].known_leader().await, Some(NodeId(1)));

    // Silence the leader.
    cancels[0].cancel();
    network.isolate(NodeId(1)).await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    let mut leaders = Vec::new();
    for member in &members[1..] {
        if member.is_leader().await {
            leaders.push(member.id());
        }
    }
    assert_eq!(leaders, vec![NodeId(2)]);
    assert_eq!(members[2].role().await, Role::Follower);
    assert_eq!(members[2].known_leader().await, Some(NodeId(2)));

    for cancel in &cancels {
        cancel.cancel();
    }
}

#[tokio::test(start_paused = true)]
async fn test_follower_keeps_quiet_while_leader_is_healthy() {
    let network = InMemoryNetwork::new();
    let (members, _handlers) = membership_cluster(&network).await;
    let cancel = CancellationToken::new();
    for member in &members {
        member.spawn(cancel.clone());
    }

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(members[0].is_leader().await);
    assert!(!members[1].is_leader().await);
    assert!(!members[2].is_leader().await);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_write_lands_on_highest_ranked_node() {
    let cluster = StoreCluster::new().await;
    let document = cluster.node(3).read("Learning Python").await.unwrap();

    let outcome = cluster.node(3).write(with_stock(document, 3)).await;

    assert_eq!(outcome, WriteOutcome::Forwarded(NodeId(2)));
    assert_eq!(cluster.stock(1, "Learning Python").await, 3);
    assert_eq!(cluster.stock(2, "Learning Python").await, 7);
    assert_eq!(cluster.stock(3, "Learning Python").await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_write_skips_unreachable_intermediary() {
    let cluster = StoreCluster::new().await;
    cluster.network.isolate(NodeId(2)).await;
    let document = cluster.node(3).read("Moomin").await;
    assert!(document.is_none());

    let document = cluster.node(3).read("Learning Python").await.unwrap();
    let outcome = cluster.node(3).write(with_stock(document, 1)).await;

    assert_eq!(outcome, WriteOutcome::Forwarded(NodeId(1)));
    assert_eq!(cluster.stock(1, "Learning Python").await, 1);
    assert_eq!(cluster.stock(2, "Learning Python").await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_write_applied_locally_when_nothing_above_is_reachable() {
    let cluster = StoreCluster::new().await;
    cluster.network.isolate(NodeId(1)).await;
    cluster.network.isolate(NodeId(2)).await;

    let document = cluster.node(3).read("Learning Python").await.unwrap();
    let outcome = cluster.node(3).write(with_stock(document, 0)).await;

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(cluster.stock(3, "Learning Python").await, 0);
    assert_eq!(cluster.stock(1, "Learning Python").await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_slow_node_counts_as_unreachable() {
    let cluster = StoreCluster::new().await;
    cluster
        .network
        .set_delay(NodeId(2), Duration::from_secs(5))
        .await;

    let document = cluster.node(3).read("Learning Python").await.unwrap();
    let outcome = cluster.node(3).write(with_stock(document, 2)).await;

    assert_eq!(outcome, WriteOutcome::Forwarded(NodeId(1)));
    assert_eq!(cluster.stock(1, "Learning Python").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_tail_does_not_bypass_healthy_intermediary() {
    let cluster = StoreCluster::new().await;
    cluster
        .network
        .set_delay(NodeId(1), Duration::from_secs(5))
        .await;

    let document = cluster.node(3).read("Learning Python").await.unwrap();
    let outcome = cluster.node(3).write(with_stock(document, 2)).await;

    // Node 2 gives up on node 1 and applies the write itself, within the
    // deadline node 3 allows it.
    assert_eq!(outcome, WriteOutcome::Forwarded(NodeId(2)));
    assert_eq!(cluster.stock(2, "Learning Python").await, 2);
    assert_eq!(cluster.stock(1, "Learning Python").await, 7);
    assert_eq!(cluster.stock(3, "Learning Python").await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_front_door_waits_out_forwarding_of_lower_ranked_leader() {
    let cluster = StoreCluster::new().await;
    cluster.front_door.record_heartbeat(NodeId(2));
    cluster
        .network
        .set_delay(NodeId(1), Duration::from_secs(5))
        .await;

    let document = cluster.node(2).read("Learning Python").await.unwrap();
    cluster
        .front_door
        .update_document(with_stock(document, 4))
        .await
        .unwrap();

    assert_eq!(cluster.stock(2, "Learning Python").await, 4);
}

#[tokio::test(start_paused = true)]
async fn test_front_door_follows_store_leader() {
    let cluster = StoreCluster::new().await;
    assert_eq!(cluster.front_door.leader(), None);

    cluster.node(1).membership().broadcast_heartbeat().await;
    assert_eq!(cluster.front_door.leader(), Some(NodeId(1)));

    let document = cluster
        .front_door
        .get_document("JavaScript - The Good Parts")
        .await
        .unwrap()
        .unwrap();
    cluster
        .front_door
        .update_document(with_stock(document, 14))
        .await
        .unwrap();
    assert_eq!(cluster.stock(1, "JavaScript - The Good Parts").await, 14);
}

fn queued(items: Vec<OrderItem>) -> QueuedOrder {
    QueuedOrder::new(
        OrderId::new(),
        CheckoutRequest {
            items,
            ..Default::default()
        },
    )
}

struct ExecutorCluster {
    executors: Vec<OrderExecutor>,
    _handlers: Vec<Arc<dyn RpcHandler>>,
}

async fn executor_cluster(queue: &InMemoryOrderQueue, front_door: &Arc<FrontDoor>) -> ExecutorCluster {
    let network = InMemoryNetwork::new();
    let (members, handlers) = membership_cluster(&network).await;
    let executors = members
        .into_iter()
        .map(|member| {
            OrderExecutor::new(member, Arc::new(queue.clone()), front_door.clone())
                .with_interval(Duration::from_secs(5))
        })
        .collect();
    ExecutorCluster {
        executors,
        _handlers: handlers,
    }
}

#[tokio::test(start_paused = true)]
async fn test_only_leader_executes() {
    let stores = StoreCluster::new().await;
    stores.node(1).membership().broadcast_heartbeat().await;
    let queue = InMemoryOrderQueue::new();
    queue
        .enqueue(queued(vec![OrderItem::new("Learning Python", 2)]))
        .await
        .unwrap();
    let cluster = executor_cluster(&queue, &stores.front_door).await;

    assert_eq!(cluster.executors[1].execute_next().await.unwrap(), None);
    assert_eq!(cluster.executors[2].execute_next().await.unwrap(), None);
    assert_eq!(queue.len().await, 1);

    let report = cluster.executors[0].execute_next().await.unwrap().unwrap();
    assert_eq!(
        report.lines,
        vec![LineOutcome::Reserved {
            title: "Learning Python".into(),
            remaining: 5,
        }]
    );
    assert_eq!(stores.stock(1, "Learning Python").await, 5);
    assert!(queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_stock_never_goes_negative() {
    let stores = StoreCluster::new().await;
    stores.node(1).membership().broadcast_heartbeat().await;
    let queue = InMemoryOrderQueue::new();
    queue
        .enqueue(queued(vec![
            OrderItem::new("Learning Python", 10),
            OrderItem::new("Moomin", 1),
            OrderItem::new("JavaScript - The Good Parts", 15),
        ]))
        .await
        .unwrap();
    let cluster = executor_cluster(&queue, &stores.front_door).await;

    let report = cluster.executors[0].execute_next().await.unwrap().unwrap();

    assert_eq!(
        report.lines,
        vec![
            LineOutcome::InsufficientStock {
                title: "Learning Python".into(),
                available: 7,
                requested: 10,
            },
            LineOutcome::UnknownBook {
                title: "Moomin".into(),
            },
            LineOutcome::Reserved {
                title: "JavaScript - The Good Parts".into(),
                remaining: 0,
            },
        ]
    );
    assert_eq!(stores.stock(1, "Learning Python").await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_order_survives_store_leader_outage() {
    let stores = StoreCluster::new().await;
    stores.node(1).membership().broadcast_heartbeat().await;
    let queue = InMemoryOrderQueue::new();
    let order = queued(vec![OrderItem::new("Learning Python", 2)]);
    let order_id = order.order_id;
    queue.enqueue(order).await.unwrap();
    let cluster = executor_cluster(&queue, &stores.front_door).await;

    stores.network.isolate(NodeId(1)).await;
    assert!(cluster.executors[0].execute_next().await.is_err());
    assert_eq!(queue.len().await, 1);
    assert_eq!(stores.stock(1, "Learning Python").await, 7);

    stores.network.restore(NodeId(1)).await;
    let report = cluster.executors[0].execute_next().await.unwrap().unwrap();
    assert_eq!(report.order_id, order_id);
    assert_eq!(
        report.lines,
        vec![LineOutcome::Reserved {
            title: "Learning Python".into(),
            remaining: 5,
        }]
    );
    assert!(queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_executor_waits_for_store_leader() {
    let stores = StoreCluster::new().await;
    let queue = InMemoryOrderQueue::new();
    queue
        .enqueue(queued(vec![OrderItem::new("Learning Python", 1)]))
        .await
        .unwrap();
    let cluster = executor_cluster(&queue, &stores.front_door).await;

    assert_eq!(cluster.executors[0].execute_next().await.unwrap(), None);
    assert_eq!(queue.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_loops_drain_queue() {
    let stores = StoreCluster::new().await;
    let queue = InMemoryOrderQueue::new();
    for _ in 0..3 {
        queue
            .enqueue(queued(vec![OrderItem::new("Learning Python", 1)]))
            .await
            .unwrap();
    }
    let cluster = executor_cluster(&queue, &stores.front_door).await;

    let cancel = CancellationToken::new();
    for node in &stores.nodes {
        node.membership().spawn(cancel.clone());
    }
    for executor in &cluster.executors {
        executor.spawn(cancel.clone());
    }

    // The store leader announces itself at 10s; executions follow every 5s.
    tokio::time::sleep(Duration::from_secs(31)).await;
    cancel.cancel();

    assert!(queue.is_empty().await);
    assert_eq!(stores.stock(1, "Learning Python").await, 4);
}
