use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer appended to the stream first. The caller must reload
    /// the aggregate and re-run its command.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// An envelope was built without one of its required fields.
    #[error("Event envelope is missing required field `{0}`")]
    MissingField(&'static str),

    /// The batch handed to `append` was malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A payload could not be encoded as JSON.
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
