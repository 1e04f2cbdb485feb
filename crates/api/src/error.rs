//! API error types with HTTP response mapping.
//!
//! Every error body has the shape `{"error": {"<error instance id>": "<message>"}}`.
//! Business rejections show the participant's message; anything else shows a
//! generic message and the detail stays in the logs under the same id.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{CheckoutFailure, FailureKind};
use serde::Serialize;
use uuid::Uuid;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The saga rejected the order.
    #[error("checkout failed: {}", .0.reason)]
    Checkout(CheckoutFailure),
    /// The request body could not be read as a checkout.
    #[error("malformed request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: BTreeMap<String, String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, Uuid, String) {
        match self {
            ApiError::Checkout(failure) => {
                let (status, message) = match failure.kind {
                    kind if kind.is_business() => (StatusCode::BAD_REQUEST, failure.reason.clone()),
                    FailureKind::Unavailable => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Service temporarily unavailable, please retry.".to_string(),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal error while processing the order.".to_string(),
                    ),
                };
                (status, failure.error_instance_id, message)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Uuid::new_v4(), msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, id, message) = self.parts();
        metrics::counter!("gateway_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(error_instance_id = %id, error = %self, "checkout error");
        }

        let body = ErrorBody {
            error: BTreeMap::from([(id.to_string(), message)]),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutFailure> for ApiError {
    fn from(failure: CheckoutFailure) -> Self {
        ApiError::Checkout(failure)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga::CheckoutState;

    fn failure(kind: FailureKind) -> CheckoutFailure {
        CheckoutFailure {
            error_instance_id: Uuid::new_v4(),
            stage: CheckoutState::Verifying,
            kind,
            origin: Some("transaction_verification".into()),
            reason: "Card is expired.".into(),
        }
    }

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_business_rejection_shows_reason() {
        let failure = failure(FailureKind::Validation);
        let id = failure.error_instance_id.to_string();

        let response = ApiError::from(failure).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_of(response).await;
        assert_eq!(json["error"][&id], "Card is expired.");
    }

    #[tokio::test]
    async fn test_unavailable_maps_to_503_and_hides_detail() {
        let response = ApiError::from(failure(FailureKind::Unavailable)).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_of(response).await;
        let errors = json["error"].as_object().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(!errors.values().any(|m| m == "Card is expired."));
    }

    #[test]
    fn test_internal_kinds_map_to_500() {
        for kind in [
            FailureKind::Initialization,
            FailureKind::UnknownOrder,
            FailureKind::Internal,
        ] {
            let response = ApiError::from(failure(kind)).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
