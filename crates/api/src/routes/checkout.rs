//! The checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::OrderId;
use domain::{Book, CheckoutRequest};
use saga::OrderStatus;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub suggested_books: Vec<Book>,
}

/// POST /checkout: runs the saga for one order and reports the verdict.
#[tracing::instrument(skip(state, body))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(request) = body?;
    tracing::debug!(items = request.item_count(), "checkout received");

    let order = state.coordinator.checkout(request).await;
    if let Some(failure) = order.failure() {
        return Err(failure.clone().into());
    }

    Ok(Json(CheckoutResponse {
        order_id: order.id(),
        status: OrderStatus::Accepted,
        suggested_books: order.suggested_books().to_vec(),
    }))
}
