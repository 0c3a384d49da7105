//! Push scheduling error types

use thiserror::Error;

/// Errors that can occur while resolving or running push schedulers
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Invalid pushScheduler id: {0}")]
    UnknownScheduler(String),

    #[error("Unknown scheduler kind: {0}")]
    UnknownKind(String),

    #[error("Duplicate pushScheduler id: {0}")]
    DuplicateId(String),

    #[error("Selectable push scheduler has no schedulers")]
    EmptyTable,

    #[error("Selectable push scheduler has no selector")]
    MissingSelector,

    #[error("Scheduler {id} is unusable: {reason}")]
    MissingCapability { id: String, reason: String },

    #[error("Invalid options for {kind}: {source}")]
    InvalidOptions {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Delivery failed for {failed} of {total} sessions")]
    Delivery { failed: usize, total: usize },

    #[error("Session sink closed")]
    SinkClosed,
}

impl PushError {
    /// Whether this error comes from configuration rather than delivery
    pub fn is_config_error(&self) -> bool {
        !matches!(self, PushError::Delivery { .. } | PushError::SinkClosed)
    }
}
