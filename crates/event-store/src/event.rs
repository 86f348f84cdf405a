use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of an event within its aggregate's stream.
///
/// The first event of a stream has version 0. An aggregate that has not
/// applied any event sits at [`Version::initial`] (-1), so the version of
/// the next event is always `aggregate.version().next()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version of a stream with no events.
    pub fn initial() -> Self {
        Self(-1)
    }

    /// The version of the first event in a stream.
    pub fn first() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true if no event has been applied at this version.
    pub fn is_initial(&self) -> bool {
        *self == Self::initial()
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A persisted domain event.
///
/// This is the storage shape of an event: the `event_type` discriminator,
/// the owning aggregate, its position in the stream and the serialized
/// payload. Aggregates decode the payload back into their own event type
/// when replaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g., "PostCreated", "CommentAdded").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Post").
    pub aggregate_type: String,

    /// Position of this event in the aggregate's stream.
    pub version: Version,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Deserializes the payload into a typed event.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

/// Builder for constructing event envelopes.
///
/// `event_id` and `timestamp` are filled in at build time when not set;
/// every other field is required.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Serializes `payload` into the envelope.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Uses an already-encoded JSON payload.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing with [`EventStoreError::MissingField`]
    /// when a required field was never set.
    pub fn build(self) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: required(self.event_type, "event_type")?,
            aggregate_id: required(self.aggregate_id, "aggregate_id")?,
            aggregate_type: required(self.aggregate_type, "aggregate_type")?,
            version: required(self.version, "version")?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: required(self.payload, "payload")?,
            metadata: self.metadata,
        })
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(EventStoreError::MissingField(field))
}
