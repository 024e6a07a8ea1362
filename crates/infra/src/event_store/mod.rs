//! Append-only event store boundary.
//!
//! Defines an infrastructure-facing abstraction for storing and loading
//! hub-scoped event streams without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
