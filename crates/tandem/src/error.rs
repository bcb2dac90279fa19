//! Error types for the store.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by [`Store::dispatch`](crate::Store::dispatch) and by the
/// asynchronous redispatch that follows an effect's settlement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The event name matched neither the actions nor the mutations table.
    #[error("{0} is not an action")]
    NotAnAction(String),

    /// The event produced effects but no tokio runtime was available to drive them.
    /// Returned before any state change is applied.
    #[error("{0} returned effects outside of a tokio runtime")]
    NoRuntime(String),

    /// An effect settled but carried no label for its outcome.
    /// Only raised under [`MissingLabelPolicy::Report`](crate::MissingLabelPolicy::Report).
    #[error("effect {outcome} has no label to dispatch to")]
    UnroutedOutcome { outcome: Settlement, value: Value },
}

/// Which side of an effect settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Success,
    Failure,
}

impl std::fmt::Display for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Settlement::Success => f.write_str("success"),
            Settlement::Failure => f.write_str("failure"),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
