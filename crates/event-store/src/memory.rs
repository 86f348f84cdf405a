use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

/// In-memory event store.
///
/// Cloning yields another handle onto the same log, so several command
/// handlers can race against one store in tests. Events are kept in
/// insertion order and returned unsorted.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    fn stream_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
        events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut store = self.events.write().await;
        let current_version = Self::stream_version(&store, aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(%aggregate_id, %expected, actual = %current_version, "append rejected");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // The batch must continue the stream exactly where it ends.
        if first_new_version != current_version.next() {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(
                %aggregate_id,
                first_new_version = %first_new_version,
                actual = %current_version,
                "append rejected"
            );
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: Version::new(first_new_version.as_i64() - 1),
                actual: current_version,
            });
        }

        let last_version = events.last().map(|e| e.version).unwrap_or(current_version);
        tracing::debug!(%aggregate_id, count = events.len(), %last_version, "events appended");
        store.extend(events);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version = Self::stream_version(&self.events.read().await, aggregate_id);
        Ok((!version.is_initial()).then_some(version))
    }
}
