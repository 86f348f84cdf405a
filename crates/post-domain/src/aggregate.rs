//! Core aggregate and domain event traits.
//!
//! An aggregate's visible state is the fold of its events. Business methods
//! on a concrete aggregate validate their preconditions and then call
//! `raise_event`, which runs the same application function that
//! [`Aggregate::replay`] runs for stored history, and additionally records
//! the event as an uncommitted change. Only uncommitted changes are handed to
//! the event store.
//!
//! Raising is crate-private, so callers outside this crate can only change
//! an aggregate through its business methods:
//!
//! ```compile_fail
//! use event_store::AggregateId;
//! use post_domain::{Post, PostEvent};
//!
//! let mut post = Post::default();
//! post.raise_event(PostEvent::post_deleted(AggregateId::new())).unwrap();
//! ```

use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AggregateError;

/// Trait for domain events.
///
/// Domain events represent facts that have happened to one aggregate.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + std::fmt::Debug {
    /// Returns the event type name.
    ///
    /// This is the discriminator stored alongside the payload and the key
    /// used to find the aggregate's application function.
    fn event_type(&self) -> &'static str;

    /// Returns the id of the aggregate this event belongs to.
    fn aggregate_id(&self) -> AggregateId;
}

/// Identity, version and change buffer shared by every aggregate.
///
/// Concrete aggregates embed one of these and expose it through
/// [`Aggregate::root`] / [`Aggregate::root_mut`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRoot<E> {
    id: Option<AggregateId>,
    version: Version,
    changes: Vec<E>,
}

impl<E> AggregateRoot<E> {
    pub fn new() -> Self {
        Self {
            id: None,
            version: Version::initial(),
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<AggregateId> {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn changes(&self) -> &[E] {
        &self.changes
    }
}

impl<E> Default for AggregateRoot<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// Implementors provide one application function per event type through
/// [`Aggregate::apply`] and list the event types they handle in
/// [`Aggregate::handled_event_types`]. Replaying and change tracking are
/// provided; raising lives on the crate-private `RaiseEvent`.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's business methods produce.
    type Error: std::error::Error + Send + Sync + From<AggregateError>;

    /// Returns the aggregate type name stored with every event.
    fn aggregate_type() -> &'static str;

    /// Event types this aggregate has an application function for.
    ///
    /// Any event whose type is missing from this table is rejected with
    /// [`AggregateError::HandlerNotFound`].
    fn handled_event_types() -> &'static [&'static str];

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Folds one event into the visible state.
    ///
    /// This method must be pure and deterministic and must not re-check
    /// business preconditions: stored events are facts and are applied
    /// unconditionally.
    fn apply(&mut self, event: &Self::Event);

    /// Returns the aggregate's identifier, None until the first event is applied.
    fn id(&self) -> Option<AggregateId> {
        self.root().id
    }

    /// Returns the version of the last persisted event folded into this aggregate.
    ///
    /// [`Version::initial`] means nothing has been persisted yet.
    fn version(&self) -> Version {
        self.root().version
    }

    /// Rebuilds state from stored events.
    ///
    /// Envelopes may arrive in any order; they are sorted by version before
    /// being applied. Nothing replayed enters the uncommitted buffer. The
    /// whole history is checked before any event is applied, so a rejected
    /// replay leaves the aggregate untouched.
    fn replay(
        &mut self,
        events: impl IntoIterator<Item = EventEnvelope>,
    ) -> Result<(), AggregateError> {
        let mut decoded = Vec::new();
        for envelope in events {
            if envelope.aggregate_type != Self::aggregate_type() {
                return Err(AggregateError::HandlerNotFound {
                    aggregate_type: Self::aggregate_type(),
                    event_type: format!("{}.{}", envelope.aggregate_type, envelope.event_type),
                });
            }
            ensure_handled::<Self>(&envelope.event_type)?;

            let event: Self::Event = envelope.decode()?;
            if event.event_type() != envelope.event_type {
                return Err(AggregateError::EventTypeMismatch {
                    recorded: envelope.event_type,
                    decoded: event.event_type(),
                });
            }
            if event.aggregate_id() != envelope.aggregate_id {
                return Err(AggregateError::AggregateIdMismatch {
                    expected: envelope.aggregate_id,
                    actual: event.aggregate_id(),
                });
            }
            decoded.push((envelope.version, event));
        }

        self.replay_events(decoded)
    }

    /// Rebuilds state from already-decoded events tagged with their versions.
    fn replay_events(
        &mut self,
        events: impl IntoIterator<Item = (Version, Self::Event)>,
    ) -> Result<(), AggregateError> {
        let mut events: Vec<_> = events.into_iter().collect();
        events.sort_by_key(|(version, _)| *version);

        let mut expected_id = self.id();
        let mut last_version = self.version();
        for (version, event) in &events {
            ensure_handled::<Self>(event.event_type())?;

            if *version <= last_version {
                return Err(AggregateError::DuplicateVersion {
                    aggregate_type: Self::aggregate_type(),
                    version: *version,
                });
            }
            if *version != last_version.next() {
                return Err(AggregateError::VersionGap {
                    aggregate_type: Self::aggregate_type(),
                    expected: last_version.next(),
                    actual: *version,
                });
            }
            last_version = *version;

            let event_id = event.aggregate_id();
            match expected_id {
                Some(id) if id != event_id => {
                    return Err(AggregateError::AggregateIdMismatch {
                        expected: id,
                        actual: event_id,
                    });
                }
                _ => expected_id = Some(event_id),
            }
        }

        let count = events.len();
        for (version, event) in events {
            apply_change(self, event, false)?;
            self.root_mut().version = version;
        }

        if count > 0 {
            metrics::counter!("aggregate_events_replayed_total").increment(count as u64);
            tracing::debug!(
                aggregate_type = Self::aggregate_type(),
                aggregate_id = ?self.id(),
                version = %self.version(),
                count,
                "aggregate replayed"
            );
        }

        Ok(())
    }

    /// Returns the events raised since the last commit, in raise order.
    fn uncommitted_changes(&self) -> &[Self::Event] {
        &self.root().changes
    }

    /// Clears the uncommitted buffer once the events have been persisted.
    ///
    /// Committed events occupy the versions directly after the current one,
    /// so the version advances by the number of events drained.
    fn mark_changes_as_committed(&mut self) {
        let root = self.root_mut();
        let committed = root.changes.len() as i64;
        root.version = Version::new(root.version.as_i64() + committed);
        root.changes.clear();
    }
}

/// Raising side of [`Aggregate`], used by business methods inside this crate.
pub(crate) trait RaiseEvent: Aggregate {
    /// Applies a newly produced event and records it as an uncommitted change.
    ///
    /// The event's aggregate id must match the aggregate's id, or initialize
    /// it when this is the first event.
    fn raise_event(&mut self, event: Self::Event) -> Result<(), AggregateError> {
        apply_change(self, event, true)
    }
}

impl<A: Aggregate> RaiseEvent for A {}

fn ensure_handled<A: Aggregate>(event_type: &str) -> Result<(), AggregateError> {
    if A::handled_event_types().contains(&event_type) {
        Ok(())
    } else {
        Err(AggregateError::HandlerNotFound {
            aggregate_type: A::aggregate_type(),
            event_type: event_type.to_string(),
        })
    }
}

fn apply_change<A: Aggregate>(
    aggregate: &mut A,
    event: A::Event,
    is_new: bool,
) -> Result<(), AggregateError> {
    ensure_handled::<A>(event.event_type())?;

    let event_id = event.aggregate_id();
    if let Some(id) = aggregate.id()
        && id != event_id
    {
        return Err(AggregateError::AggregateIdMismatch {
            expected: id,
            actual: event_id,
        });
    }

    aggregate.apply(&event);

    let root = aggregate.root_mut();
    root.id = Some(event_id);
    if is_new {
        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %event_id,
            event_type = event.event_type(),
            "event raised"
        );
        metrics::counter!("aggregate_events_raised_total").increment(1);
        root.changes.push(event);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    enum CounterEvent {
        Opened { id: AggregateId },
        Incremented { id: AggregateId, by: i32 },
        Archived { id: AggregateId },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "Opened",
                CounterEvent::Incremented { .. } => "Incremented",
                CounterEvent::Archived { .. } => "Archived",
            }
        }

        fn aggregate_id(&self) -> AggregateId {
            match self {
                CounterEvent::Opened { id }
                | CounterEvent::Incremented { id, .. }
                | CounterEvent::Archived { id } => *id,
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error(transparent)]
    struct CounterError(#[from] AggregateError);

    #[derive(Debug, Default)]
    struct Counter {
        root: AggregateRoot<CounterEvent>,
        total: i32,
        trail: Vec<i32>,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        // "Archived" deliberately has no entry.
        fn handled_event_types() -> &'static [&'static str] {
            &["Opened", "Incremented"]
        }

        fn root(&self) -> &AggregateRoot<CounterEvent> {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot<CounterEvent> {
            &mut self.root
        }

        fn apply(&mut self, event: &CounterEvent) {
            if let CounterEvent::Incremented { by, .. } = event {
                self.total += by;
                self.trail.push(*by);
            }
        }
    }

    fn envelope(id: AggregateId, version: i64, event: &CounterEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type(Counter::aggregate_type())
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn new_root_has_no_identity() {
        let counter = Counter::default();
        assert_eq!(counter.id(), None);
        assert_eq!(counter.version(), Version::initial());
        assert!(counter.uncommitted_changes().is_empty());
    }

    #[test]
    fn raise_event_applies_and_buffers() {
        let id = AggregateId::new();
        let mut counter = Counter::default();

        counter.raise_event(CounterEvent::Opened { id }).unwrap();
        counter
            .raise_event(CounterEvent::Incremented { id, by: 3 })
            .unwrap();

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.total, 3);
        assert_eq!(
            counter.uncommitted_changes(),
            &[CounterEvent::Opened { id }, CounterEvent::Incremented { id, by: 3 }]
        );
        // Versions are minted on commit, not on raise.
        assert_eq!(counter.version(), Version::initial());
    }

    #[test]
    fn raise_event_rejects_foreign_id() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter.raise_event(CounterEvent::Opened { id }).unwrap();

        let result = counter.raise_event(CounterEvent::Incremented {
            id: AggregateId::new(),
            by: 1,
        });

        assert!(matches!(
            result,
            Err(AggregateError::AggregateIdMismatch { .. })
        ));
        assert_eq!(counter.total, 0);
        assert_eq!(counter.uncommitted_changes().len(), 1);
    }

    #[test]
    fn raise_event_without_handler_fails() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter.raise_event(CounterEvent::Opened { id }).unwrap();

        let result = counter.raise_event(CounterEvent::Archived { id });

        assert!(matches!(
            result,
            Err(AggregateError::HandlerNotFound { ref event_type, .. }) if event_type == "Archived"
        ));
        assert_eq!(counter.uncommitted_changes().len(), 1);
    }

    #[test]
    fn mark_committed_drains_and_advances_version() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter.raise_event(CounterEvent::Opened { id }).unwrap();
        counter
            .raise_event(CounterEvent::Incremented { id, by: 1 })
            .unwrap();

        counter.mark_changes_as_committed();

        assert!(counter.uncommitted_changes().is_empty());
        assert_eq!(counter.version(), Version::new(1));
    }

    #[test]
    fn replay_sorts_by_version() {
        let id = AggregateId::new();
        let events = vec![
            envelope(id, 2, &CounterEvent::Incremented { id, by: 20 }),
            envelope(id, 0, &CounterEvent::Opened { id }),
            envelope(id, 1, &CounterEvent::Incremented { id, by: 10 }),
        ];

        let mut counter = Counter::default();
        counter.replay(events).unwrap();

        assert_eq!(counter.trail, vec![10, 20]);
        assert_eq!(counter.version(), Version::new(2));
        assert_eq!(counter.id(), Some(id));
        assert!(counter.uncommitted_changes().is_empty());
    }

    #[test]
    fn replay_of_empty_history_is_a_no_op() {
        let mut counter = Counter::default();
        counter.replay(Vec::new()).unwrap();
        assert_eq!(counter.id(), None);
        assert_eq!(counter.version(), Version::initial());
    }

    #[test]
    fn replay_rejects_duplicate_versions_atomically() {
        let id = AggregateId::new();
        let events = vec![
            envelope(id, 0, &CounterEvent::Opened { id }),
            envelope(id, 1, &CounterEvent::Incremented { id, by: 1 }),
            envelope(id, 1, &CounterEvent::Incremented { id, by: 2 }),
        ];

        let mut counter = Counter::default();
        let result = counter.replay(events);

        assert!(matches!(
            result,
            Err(AggregateError::DuplicateVersion { version, .. }) if version == Version::new(1)
        ));
        assert_eq!(counter.total, 0);
        assert_eq!(counter.id(), None);
    }

    #[test]
    fn replay_rejects_already_applied_versions() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter
            .replay(vec![envelope(id, 0, &CounterEvent::Opened { id })])
            .unwrap();

        let result = counter.replay(vec![envelope(id, 0, &CounterEvent::Opened { id })]);
        assert!(matches!(result, Err(AggregateError::DuplicateVersion { .. })));
    }

    #[test]
    fn replay_rejects_unknown_event_type() {
        let id = AggregateId::new();
        let events = vec![
            envelope(id, 0, &CounterEvent::Opened { id }),
            envelope(id, 1, &CounterEvent::Archived { id }),
        ];

        let mut counter = Counter::default();
        let result = counter.replay(events);

        assert!(matches!(result, Err(AggregateError::HandlerNotFound { .. })));
        assert_eq!(counter.id(), None);
    }

    #[test]
    fn replay_rejects_payload_that_contradicts_its_tag() {
        let id = AggregateId::new();
        let mut relabelled = envelope(id, 1, &CounterEvent::Incremented { id, by: 9 });
        relabelled.event_type = "Opened".to_string();
        let events = vec![envelope(id, 0, &CounterEvent::Opened { id }), relabelled];

        let mut counter = Counter::default();
        let result = counter.replay(events);

        assert!(matches!(
            result,
            Err(AggregateError::EventTypeMismatch { ref recorded, decoded: "Incremented" })
                if recorded == "Opened"
        ));
        assert_eq!(counter.total, 0);
        assert_eq!(counter.id(), None);
    }

    #[test]
    fn replay_rejects_version_gaps_atomically() {
        let id = AggregateId::new();
        let events = vec![
            envelope(id, 0, &CounterEvent::Opened { id }),
            envelope(id, 2, &CounterEvent::Incremented { id, by: 4 }),
        ];

        let mut counter = Counter::default();
        let result = counter.replay(events);

        assert!(matches!(
            result,
            Err(AggregateError::VersionGap { expected, actual, .. })
                if expected == Version::new(1) && actual == Version::new(2)
        ));
        assert_eq!(counter.total, 0);
        assert_eq!(counter.version(), Version::initial());
    }

    #[test]
    fn replay_must_continue_from_applied_version() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter
            .replay(vec![envelope(id, 0, &CounterEvent::Opened { id })])
            .unwrap();

        let skipped = envelope(id, 3, &CounterEvent::Incremented { id, by: 1 });
        let result = counter.replay(vec![skipped]);
        assert!(matches!(result, Err(AggregateError::VersionGap { .. })));

        counter
            .replay(vec![envelope(id, 1, &CounterEvent::Incremented { id, by: 1 })])
            .unwrap();
        assert_eq!(counter.version(), Version::new(1));
    }

    #[test]
    fn replay_rejects_foreign_aggregate_type() {
        let id = AggregateId::new();
        let mut foreign = envelope(id, 0, &CounterEvent::Opened { id });
        foreign.aggregate_type = "Tally".to_string();

        let mut counter = Counter::default();
        assert!(matches!(
            counter.replay(vec![foreign]),
            Err(AggregateError::HandlerNotFound { .. })
        ));
    }

    #[test]
    fn replay_rejects_mixed_streams() {
        let id = AggregateId::new();
        let other = AggregateId::new();
        let events = vec![
            envelope(id, 0, &CounterEvent::Opened { id }),
            envelope(other, 1, &CounterEvent::Incremented { id: other, by: 1 }),
        ];

        let mut counter = Counter::default();
        assert!(matches!(
            counter.replay(events),
            Err(AggregateError::AggregateIdMismatch { .. })
        ));
    }

    #[test]
    fn replay_then_raise_keeps_only_new_events() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter
            .replay(vec![
                envelope(id, 0, &CounterEvent::Opened { id }),
                envelope(id, 1, &CounterEvent::Incremented { id, by: 5 }),
            ])
            .unwrap();

        counter
            .raise_event(CounterEvent::Incremented { id, by: 2 })
            .unwrap();

        assert_eq!(counter.total, 7);
        assert_eq!(counter.uncommitted_changes().len(), 1);

        counter.mark_changes_as_committed();
        assert_eq!(counter.version(), Version::new(2));
    }
}
