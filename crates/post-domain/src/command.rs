//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::config::HandlerConfig;
use crate::error::{AggregateError, DomainError};

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate, T = ()> {
    /// The aggregate after the new events were committed.
    pub aggregate: A,

    /// The events that were raised and persisted.
    pub events: Vec<A::Event>,

    /// The version of the aggregate after the command.
    pub new_version: Version,

    /// Whatever the business method returned (e.g. a generated comment id).
    pub output: T,
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate by replaying its history
/// 2. Running the business method, which raises events
/// 3. Assigning versions and persisting the raised events
/// 4. Marking the changes as committed
///
/// Each execution owns a freshly loaded aggregate. Two executions racing on
/// the same history mint the same version for their first event, so the
/// store rejects the loser with a concurrency conflict.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    config: HandlerConfig,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self::with_config(store, HandlerConfig::default())
    }

    pub fn with_config(store: S, config: HandlerConfig) -> Self {
        Self {
            store,
            config,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Loads an aggregate from the event store.
    ///
    /// An empty history yields a default (uncreated) aggregate.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        aggregate.replay(events)?;

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the events it raises.
    ///
    /// The command function receives the loaded aggregate and calls its
    /// business methods. On a concurrency conflict the aggregate is reloaded
    /// and the function run again, up to `max_conflict_retries` times.
    pub async fn execute<F, T>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        F: FnMut(&mut A) -> Result<T, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, false, command_fn).await
    }

    /// Like [`execute`](Self::execute), but fails with
    /// [`DomainError::AggregateNotFound`] when the aggregate has no history.
    pub async fn execute_existing<F, T>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        F: FnMut(&mut A) -> Result<T, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, true, command_fn).await
    }

    async fn run<F, T>(
        &self,
        aggregate_id: AggregateId,
        require_existing: bool,
        mut command_fn: F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        F: FnMut(&mut A) -> Result<T, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            match self
                .execute_once(aggregate_id, require_existing, &mut command_fn)
                .await
            {
                Err(e) if e.is_conflict() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    metrics::counter!("command_conflicts_total").increment(1);
                    tracing::warn!(
                        aggregate_type = A::aggregate_type(),
                        %aggregate_id,
                        attempt,
                        "concurrency conflict, reloading aggregate"
                    );
                    if !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
                Err(e) => {
                    if e.is_conflict() {
                        metrics::counter!("command_conflicts_total").increment(1);
                        tracing::warn!(
                            aggregate_type = A::aggregate_type(),
                            %aggregate_id,
                            "concurrency conflict"
                        );
                    }
                    return Err(e);
                }
                Ok(result) => return Ok(result),
            }
        }
    }

    async fn execute_once<F, T>(
        &self,
        aggregate_id: AggregateId,
        require_existing: bool,
        command_fn: &mut F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        F: FnMut(&mut A) -> Result<T, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        if require_existing && aggregate.id().is_none() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            });
        }
        let current_version = aggregate.version();

        let output = command_fn(&mut aggregate)?;
        metrics::counter!("command_executions_total").increment(1);

        let events = aggregate.uncommitted_changes().to_vec();
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
                output,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

        let options = if current_version.is_initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };
        let new_version = self.store.append(envelopes, options).await?;

        aggregate.mark_changes_as_committed();
        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            %aggregate_id,
            %new_version,
            count = events.len(),
            "events committed"
        );

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
            output,
        })
    }

    /// Builds event envelopes from domain events.
    ///
    /// Versions continue from the version the aggregate was loaded at. Every
    /// event must belong to the stream it is written to, or the stream could
    /// never be replayed.
    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            if event.aggregate_id() != aggregate_id {
                return Err(AggregateError::AggregateIdMismatch {
                    expected: aggregate_id,
                    actual: event.aggregate_id(),
                }
                .into());
            }
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
