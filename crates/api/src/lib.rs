//! Checkout gateway for the bookstore backbone.
//!
//! Serves `POST /checkout` on top of the saga coordinator, exposes health and
//! Prometheus metrics, and accepts store-leader heartbeats for the front door
//! so external `cluster-node` processes can announce themselves.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use cluster::HeartbeatObserver;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, Backbone, Participants};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let observer: Arc<dyn HeartbeatObserver> = state.front_door.clone();
    let heartbeat_router = cluster::http::observer_router(observer);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::checkout))
        .with_state(state)
        .merge(metrics_router)
        .merge(heartbeat_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
