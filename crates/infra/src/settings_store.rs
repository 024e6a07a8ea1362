//! Per-hub expense settings, including the expense-number sequence.
//!
//! The expense engine is the sole writer of `next_number_seq`: numbers are
//! handed out by [`InMemorySettingsStore::allocate_number`] inside a write
//! lock, which serializes allocation per process so two concurrent creates
//! can never receive the same number. Settings updates from the outside
//! never touch the sequence.

use std::collections::HashMap;
use std::sync::RwLock;

use hubledger_core::{DomainError, DomainResult, HubId};
use hubledger_expenses::{ExpenseSettings, compose_number};

/// In-memory per-hub settings store.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    inner: RwLock<HashMap<HubId, ExpenseSettings>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a consistent snapshot of the hub's settings, creating defaults
    /// on first access (one settings record per hub).
    pub fn snapshot(&self, hub_id: HubId) -> ExpenseSettings {
        if let Ok(map) = self.inner.read() {
            if let Some(settings) = map.get(&hub_id) {
                return settings.clone();
            }
        }
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(_) => return ExpenseSettings::default(),
        };
        map.entry(hub_id).or_default().clone()
    }

    /// Replace the hub's settings. The number sequence is owned by the
    /// engine and survives updates untouched.
    pub fn update(&self, hub_id: HubId, mut settings: ExpenseSettings) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("settings store lock poisoned"))?;
        let current = map.entry(hub_id).or_default();
        settings.next_number_seq = current.next_number_seq;
        settings.validate()?;
        *current = settings;
        Ok(())
    }

    /// Allocate the next expense number for the hub.
    ///
    /// Increment and read happen under one write lock: the critical section
    /// spec'd for numbering. Returns the composed number and the sequence
    /// value it consumed.
    pub fn allocate_number(&self, hub_id: HubId) -> DomainResult<(String, u64)> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("settings store lock poisoned"))?;
        let settings = map.entry(hub_id).or_default();
        if !settings.auto_numbering {
            return Err(DomainError::validation(
                "auto numbering is disabled for this hub",
            ));
        }
        let seq = settings.next_number_seq;
        settings.next_number_seq += 1;
        Ok((compose_number(&settings.number_prefix, seq), seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn snapshot_creates_defaults_once() {
        let store = InMemorySettingsStore::new();
        let hub_id = HubId::new();
        let first = store.snapshot(hub_id);
        assert_eq!(first.number_prefix, "EXP");
        let second = store.snapshot(hub_id);
        assert_eq!(first, second);
    }

    #[test]
    fn allocate_number_increments_sequence() {
        let store = InMemorySettingsStore::new();
        let hub_id = HubId::new();

        let (first, seq1) = store.allocate_number(hub_id).unwrap();
        let (second, seq2) = store.allocate_number(hub_id).unwrap();
        assert_eq!(first, "EXP-0001");
        assert_eq!(second, "EXP-0002");
        assert_eq!((seq1, seq2), (1, 2));
    }

    #[test]
    fn update_preserves_sequence() {
        let store = InMemorySettingsStore::new();
        let hub_id = HubId::new();
        store.allocate_number(hub_id).unwrap();
        store.allocate_number(hub_id).unwrap();

        let mut settings = ExpenseSettings::default();
        settings.number_prefix = "GAS".to_string();
        // An external caller trying to rewind the sequence is ignored.
        settings.next_number_seq = 1;
        store.update(hub_id, settings).unwrap();

        let (next, seq) = store.allocate_number(hub_id).unwrap();
        assert_eq!(next, "GAS-0003");
        assert_eq!(seq, 3);
    }

    #[test]
    fn allocation_respects_auto_numbering_flag() {
        let store = InMemorySettingsStore::new();
        let hub_id = HubId::new();
        let mut settings = ExpenseSettings::default();
        settings.auto_numbering = false;
        store.update(hub_id, settings).unwrap();

        assert!(store.allocate_number(hub_id).is_err());
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let store = Arc::new(InMemorySettingsStore::new());
        let hub_id = HubId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|_| store.allocate_number(hub_id).unwrap().1)
                    .collect::<Vec<u64>>()
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let expected: Vec<u64> = (1..=400).collect();
        assert_eq!(all, expected);
    }
}
