//! Saga error types.

use common::ClockError;
use session_store::SessionError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    /// A participant's session could not be used (unknown order or causality violation).
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A vector clock operation failed.
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// A participant or collaborator could not be reached.
    #[error("Service '{service}' unavailable: {reason}")]
    Unavailable { service: String, reason: String },
}

impl SagaError {
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        SagaError::Unavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports a clear whose final clock did not
    /// dominate the participant's local clock.
    pub fn is_causality_violation(&self) -> bool {
        matches!(
            self,
            SagaError::Session(SessionError::CausalityViolation { .. })
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
