//! Disposable, rebuildable read models.

pub mod hub_store;

pub use hub_store::{HubStore, InMemoryHubStore};
