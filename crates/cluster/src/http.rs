//! Cluster RPC over HTTP.
//!
//! Server side: [`router`] exposes a node's [`RpcHandler`] and
//! [`observer_router`] exposes a [`HeartbeatObserver`]. Client side:
//! [`HttpTransport`] reaches peers by rank, [`HttpObserver`] notifies an
//! observer of leader heartbeats.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use domain::BookDocument;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};
use crate::node::NodeId;
use crate::transport::{DocumentTransport, HeartbeatObserver, PeerTransport, RpcHandler};

/// Body of heartbeat and election messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMessage {
    pub process_id: NodeId,
}

impl IntoResponse for ClusterError {
    fn into_response(self) -> Response {
        let status = match &self {
            ClusterError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            ClusterError::Unreachable { .. }
            | ClusterError::Timeout { .. }
            | ClusterError::ObserverUnreachable { .. }
            | ClusterError::NoLeader => StatusCode::SERVICE_UNAVAILABLE,
            ClusterError::Queue(_) | ClusterError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Routes for a cluster node.
pub fn router(handler: Arc<dyn RpcHandler>) -> Router {
    Router::new()
        .route("/rpc/heartbeat", post(heartbeat))
        .route("/rpc/election", post(election))
        .route("/rpc/documents/{title}", get(get_document))
        .route("/rpc/documents", put(update_document))
        .with_state(handler)
}

/// Routes for a process that only listens to leader heartbeats.
pub fn observer_router(observer: Arc<dyn HeartbeatObserver>) -> Router {
    Router::new()
        .route("/rpc/heartbeat", post(observe_heartbeat))
        .with_state(observer)
}

async fn heartbeat(
    State(handler): State<Arc<dyn RpcHandler>>,
    Json(message): Json<ProcessMessage>,
) -> StatusCode {
    handler.heartbeat(message.process_id).await;
    StatusCode::NO_CONTENT
}

async fn election(
    State(handler): State<Arc<dyn RpcHandler>>,
    Json(message): Json<ProcessMessage>,
) -> StatusCode {
    handler.election(message.process_id).await;
    StatusCode::NO_CONTENT
}

async fn get_document(
    State(handler): State<Arc<dyn RpcHandler>>,
    Path(title): Path<String>,
) -> std::result::Result<Response, ClusterError> {
    Ok(match handler.get_document(&title).await? {
        Some(document) => Json(document).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

async fn update_document(
    State(handler): State<Arc<dyn RpcHandler>>,
    Json(document): Json<BookDocument>,
) -> std::result::Result<StatusCode, ClusterError> {
    handler.update_document(document).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn observe_heartbeat(
    State(observer): State<Arc<dyn HeartbeatObserver>>,
    Json(message): Json<ProcessMessage>,
) -> std::result::Result<StatusCode, ClusterError> {
    observer.observe_heartbeat(message.process_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClusterError::Config(format!("http client: {e}")))
}

/// Reaches peers over HTTP using a rank → base URL table.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    peers: Arc<BTreeMap<NodeId, String>>,
}

impl HttpTransport {
    pub fn new(peers: BTreeMap<NodeId, String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            peers: Arc::new(peers),
        })
    }

    fn url(&self, to: NodeId, segments: &[&str]) -> Result<reqwest::Url> {
        let base = self
            .peers
            .get(&to)
            .ok_or_else(|| ClusterError::unreachable(to, "no address configured"))?;
        let mut url = reqwest::Url::parse(base)
            .map_err(|e| ClusterError::Config(format!("peer {to} url '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ClusterError::Config(format!("peer {to} url '{base}' cannot be a base")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, to: NodeId, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| ClusterError::unreachable(to, e.to_string()))
    }

    async fn post_message(&self, to: NodeId, path: &str, from: NodeId) -> Result<()> {
        let url = self.url(to, &["rpc", path])?;
        let request = self.client.post(url).json(&ProcessMessage { process_id: from });
        self.send(to, request)
            .await?
            .error_for_status()
            .map_err(|e| ClusterError::unreachable(to, e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn heartbeat(&self, to: NodeId, from: NodeId) -> Result<()> {
        self.post_message(to, "heartbeat", from).await
    }

    async fn election(&self, to: NodeId, from: NodeId) -> Result<()> {
        self.post_message(to, "election", from).await
    }
}

#[async_trait]
impl DocumentTransport for HttpTransport {
    async fn get_document(&self, to: NodeId, title: &str) -> Result<Option<BookDocument>> {
        let url = self.url(to, &["rpc", "documents", title])?;
        let response = self.send(to, self.client.get(url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = response
            .error_for_status()
            .map_err(|e| ClusterError::unreachable(to, e.to_string()))?
            .json()
            .await
            .map_err(|e| ClusterError::unreachable(to, format!("invalid document: {e}")))?;
        Ok(Some(document))
    }

    async fn update_document(&self, to: NodeId, document: BookDocument) -> Result<()> {
        let url = self.url(to, &["rpc", "documents"])?;
        self.send(to, self.client.put(url).json(&document))
            .await?
            .error_for_status()
            .map_err(|e| ClusterError::unreachable(to, e.to_string()))?;
        Ok(())
    }
}

/// Sends leader heartbeats to a process outside the cluster.
#[derive(Debug, Clone)]
pub struct HttpObserver {
    client: reqwest::Client,
    url: String,
}

impl HttpObserver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: format!("{}/rpc/heartbeat", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl HeartbeatObserver for HttpObserver {
    async fn observe_heartbeat(&self, leader: NodeId) -> Result<()> {
        let unreachable = |reason: String| ClusterError::ObserverUnreachable {
            url: self.url.clone(),
            reason,
        };
        self.client
            .post(&self.url)
            .json(&ProcessMessage { process_id: leader })
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?
            .error_for_status()
            .map_err(|e| unreachable(e.to_string()))?;
        Ok(())
    }
}
