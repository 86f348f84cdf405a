use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at before the append.
    /// If None, only the sequential-version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no expected version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the stream to be at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to be empty (creating a new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Repository the aggregates persist to and are rebuilt from.
///
/// Implementations must enforce optimistic concurrency: an append whose
/// first event is not exactly one past the stored version is rejected with
/// [`EventStoreError::ConcurrencyConflict`].
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to the store.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// Returns the version of the last appended event.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all events for an aggregate.
    ///
    /// The order is not guaranteed; callers sort by version. An unknown
    /// aggregate yields an empty list.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event whose version was assigned by the caller.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
///
/// A batch must be non-empty, target a single aggregate of a single type,
/// and carry sequential versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
