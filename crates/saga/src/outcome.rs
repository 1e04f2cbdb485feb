//! Outcomes of participant calls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a participant refused to continue the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionKind {
    /// A transaction verification rule failed.
    Validation,
    /// A fraud detection rule failed.
    FraudSuspected,
    /// The participant holds no session for the order.
    UnknownOrder,
    /// The participant could not process the call for another reason.
    Internal,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionKind::Validation => "validation",
            RejectionKind::FraudSuspected => "fraud_suspected",
            RejectionKind::UnknownOrder => "unknown_order",
            RejectionKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A business-level refusal, passed up the chain unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Service key of the participant that produced the rejection.
    pub origin: String,
    pub kind: RejectionKind,
    /// Human-readable message shown to the customer.
    pub reason: String,
}

impl Rejection {
    pub fn new(origin: impl Into<String>, kind: RejectionKind, reason: impl fmt::Display) -> Self {
        Self {
            origin: origin.into(),
            kind,
            reason: reason.to_string(),
        }
    }

    pub fn validation(origin: &str, reason: impl fmt::Display) -> Self {
        Self::new(origin, RejectionKind::Validation, reason)
    }

    pub fn fraud(origin: &str, reason: impl fmt::Display) -> Self {
        Self::new(origin, RejectionKind::FraudSuspected, reason)
    }

    pub fn internal(origin: &str, reason: impl fmt::Display) -> Self {
        Self::new(origin, RejectionKind::Internal, reason)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.origin, self.kind, self.reason)
    }
}

/// Result of a call to a participant.
///
/// Business rejections and transport failures are kept apart so the
/// coordinator can report them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Ok(T),
    Rejected(Rejection),
    /// The participant could not be reached or did not answer in time.
    Unavailable(String),
}

impl<T> CallOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallOutcome::Ok(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Ok(value) => CallOutcome::Ok(f(value)),
            CallOutcome::Rejected(rejection) => CallOutcome::Rejected(rejection),
            CallOutcome::Unavailable(reason) => CallOutcome::Unavailable(reason),
        }
    }

    /// Returns the success value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            CallOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Rejection> for CallOutcome<T> {
    fn from(rejection: Rejection) -> Self {
        CallOutcome::Rejected(rejection)
    }
}
