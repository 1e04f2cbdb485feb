//! Runs one document store node of the cluster.

use std::sync::Arc;

use cluster::http::{HttpObserver, HttpTransport};
use cluster::{
    DocumentStore, HeartbeatObserver, Membership, NodeConfig, NodeId, RpcHandler, StoreNode,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env().expect("invalid cluster configuration");
    let retry = config.membership.retry;
    let timeout = retry.timeout;
    // Per-call deadlines come from the retry policy; the client limit only
    // has to outlast the longest chain write.
    let client_timeout = retry.chain_deadline(NodeId(config.membership.cluster_size));

    let transport = Arc::new(
        HttpTransport::new(config.peers.clone(), client_timeout)
            .expect("failed to build HTTP client"),
    );
    let observers: Vec<Arc<dyn HeartbeatObserver>> = config
        .observers
        .iter()
        .map(|url| {
            HttpObserver::new(url, timeout)
                .map(|observer| Arc::new(observer) as Arc<dyn HeartbeatObserver>)
                .expect("failed to build HTTP client")
        })
        .collect();

    let membership = Membership::new(config.membership.clone(), transport.clone(), observers);
    let node: Arc<dyn RpcHandler> = Arc::new(StoreNode::new(
        membership.clone(),
        DocumentStore::seeded(),
        transport,
    ));

    let cancel = CancellationToken::new();
    let checker = membership.spawn(cancel.clone());

    let addr = config.addr();
    tracing::info!(%addr, node = %membership.id(), "starting store node");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, cluster::http::router(node))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    cancel.cancel();
    if let Err(e) = checker.await {
        tracing::error!(error = %e, "membership checker panicked");
    }
    tracing::info!("store node shut down gracefully");
}
