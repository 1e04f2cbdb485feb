//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The stage a checkout has reached in the coordinator.
///
/// State transitions:
/// ```text
/// Initializing ──► Verifying ──► FetchingSuggestions ──► Clearing ──► Done
///      │               │                  │                  │
///      └───────────────┴──────────────────┴──────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Participants are being initialized for the order.
    #[default]
    Initializing,

    /// The verification chain (transaction verification → fraud detection →
    /// suggestion generation) is running.
    Verifying,

    /// Cached suggestions are being retrieved.
    FetchingSuggestions,

    /// Participant sessions are being cleared with the final clock.
    Clearing,

    /// The order was accepted (terminal state).
    Done,

    /// The order was rejected and compensation was broadcast (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns the state that follows this one on the success path.
    pub fn next(&self) -> Option<CheckoutState> {
        match self {
            CheckoutState::Initializing => Some(CheckoutState::Verifying),
            CheckoutState::Verifying => Some(CheckoutState::FetchingSuggestions),
            CheckoutState::FetchingSuggestions => Some(CheckoutState::Clearing),
            CheckoutState::Clearing => Some(CheckoutState::Done),
            CheckoutState::Done | CheckoutState::Failed => None,
        }
    }

    /// Returns true if moving from this state to `target` is allowed.
    pub fn can_transition_to(&self, target: CheckoutState) -> bool {
        match target {
            CheckoutState::Failed => !self.is_terminal(),
            _ => self.next() == Some(target),
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Done | CheckoutState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Initializing => "Initializing",
            CheckoutState::Verifying => "Verifying",
            CheckoutState::FetchingSuggestions => "FetchingSuggestions",
            CheckoutState::Clearing => "Clearing",
            CheckoutState::Done => "Done",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
