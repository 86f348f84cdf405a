//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::post::PostError;

/// Errors raised by the generic aggregate machinery.
///
/// All of these mean the event stream and the aggregate code disagree. They
/// are not recoverable by retrying and must be surfaced to the caller.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The aggregate has no application function for this event type.
    #[error("No handler to apply event {event_type} to aggregate {aggregate_type}")]
    HandlerNotFound {
        aggregate_type: &'static str,
        event_type: String,
    },

    /// The event belongs to a different aggregate instance.
    #[error("Event for aggregate {actual} cannot be applied to aggregate {expected}")]
    AggregateIdMismatch {
        expected: AggregateId,
        actual: AggregateId,
    },

    /// Two events in the history claim the same version, or an event is
    /// older than what the aggregate has already applied.
    #[error("Duplicate or out-of-order version {version} in {aggregate_type} history")]
    DuplicateVersion {
        aggregate_type: &'static str,
        version: Version,
    },

    /// Versions in the history are not contiguous.
    #[error("Missing version {expected} in {aggregate_type} history (next stored is {actual})")]
    VersionGap {
        aggregate_type: &'static str,
        expected: Version,
        actual: Version,
    },

    /// The stored event type disagrees with the decoded payload.
    #[error("Event recorded as {recorded} decodes to {decoded}")]
    EventTypeMismatch {
        recorded: String,
        decoded: &'static str,
    },

    /// A stored payload could not be decoded into the aggregate's event type.
    #[error("Event payload could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while executing a command against an aggregate.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The stored history could not be folded into the aggregate.
    #[error("Aggregate error: {0}")]
    Aggregate(#[from] AggregateError),

    /// A business rule of the post aggregate rejected the command.
    #[error("Post error: {0}")]
    Post(PostError),

    /// The command targets an aggregate with no history.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },
}

impl DomainError {
    /// Returns true if the store rejected the write because another writer won.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }

    /// Returns true if a business precondition rejected the command.
    ///
    /// The aggregate was left unchanged and nothing was persisted; the same
    /// input will fail again.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, DomainError::Post(e) if e.is_invariant_violation())
    }
}
