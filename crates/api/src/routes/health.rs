//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use cluster::NodeId;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Store leader the front door currently routes to.
    pub store_leader: Option<NodeId>,
}

/// GET /health: returns gateway health and the known store leader.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store_leader: state.front_door.leader(),
    })
}
