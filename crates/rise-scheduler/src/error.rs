//! Error types for the scheduling engine.

use rise_core::error::RiseError;

/// Errors reported by a trigger adapter.
///
/// The reconciler logs these and carries on; they never escape its public
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Trigger capability unavailable: {0}")]
    Unavailable(String),
    #[error("Trigger {key} rejected: {reason}")]
    Rejected { key: String, reason: String },
    #[error("Trigger state lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<TriggerError> for RiseError {
    fn from(err: TriggerError) -> Self {
        RiseError::Trigger(err.to_string())
    }
}
