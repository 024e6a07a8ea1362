//! Command execution pipeline (application-level orchestration).
//!
//! Implements the command dispatch pattern for event-sourced aggregates:
//! load history, rehydrate state, handle the command, and persist the
//! resulting events with an optimistic concurrency check. The engine applies
//! read-model projections synchronously from the returned stored events.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (hub-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events (append-only, optimistic concurrency check)
//! ```
//!
//! This module contains no IO itself; it composes the `EventStore` trait.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use hubledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, HubId};
use hubledger_events::Event;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Hub isolation violation (cross-hub or cross-aggregate stream mixing).
    HubIsolation(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Illegal status transition (deterministic; state unchanged).
    InvalidTransition(String),
    /// Deletion refused while dependents exist.
    HasDependents(String),
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate
    /// event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::HubIsolation(msg) => DispatchError::HubIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidTransition(msg) => DispatchError::InvalidTransition(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::HasDependents(msg) => DispatchError::HasDependents(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

impl From<DispatchError> for DomainError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Concurrency(msg) => DomainError::Conflict(msg),
            DispatchError::HubIsolation(msg) => DomainError::Validation(msg),
            DispatchError::Validation(msg) => DomainError::Validation(msg),
            DispatchError::InvalidTransition(msg) => DomainError::InvalidTransition(msg),
            DispatchError::HasDependents(msg) => DomainError::HasDependents(msg),
            DispatchError::NotFound => DomainError::NotFound,
            DispatchError::Deserialize(msg) => DomainError::Conflict(format!("replay: {msg}")),
            DispatchError::Store(err) => DomainError::Conflict(err.to_string()),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// The dispatcher gives every aggregate the same execution model while
/// keeping domain code pure: hub isolation and optimistic concurrency are
/// enforced here, and in-memory implementations keep it fully testable.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// Returns the committed `StoredEvent`s (with assigned sequence numbers)
    /// on success. On a concurrent modification the append fails with
    /// `DispatchError::Concurrency`; callers retry by re-executing the
    /// command against the reloaded stream.
    pub fn dispatch<A>(
        &self,
        hub_id: HubId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (hub-scoped)
        let history = self.store.load_stream(hub_id, aggregate_id)?;
        validate_loaded_stream(hub_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    hub_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        Ok(committed)
    }

    /// Rehydrate an aggregate from its stream without dispatching anything.
    ///
    /// Returns `NotFound` for empty streams.
    pub fn load<A>(
        &self,
        hub_id: HubId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(hub_id, aggregate_id)?;
        if history.is_empty() {
            return Err(DispatchError::NotFound);
        }
        validate_loaded_stream(hub_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    hub_id: HubId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce hub isolation even if a buggy backend returns cross-hub data.
    // Also ensure the stream is monotonically increasing by sequence number.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.hub_id != hub_id {
            return Err(DispatchError::HubIsolation(format!(
                "loaded stream contains wrong hub_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::HubIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
