use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::RwLock;

use hubledger_core::HubId;

/// Hub-isolated key/value store abstraction for disposable read models.
pub trait HubStore<K, V>: Send + Sync {
    fn get(&self, hub_id: HubId, key: &K) -> Option<V>;
    fn upsert(&self, hub_id: HubId, key: K, value: V);
    fn list(&self, hub_id: HubId) -> Vec<V>;
    /// Clear all read-model records for a hub (rebuild support).
    fn clear_hub(&self, hub_id: HubId);
}

impl<K, V, S> HubStore<K, V> for Arc<S>
where
    S: HubStore<K, V> + ?Sized,
{
    fn get(&self, hub_id: HubId, key: &K) -> Option<V> {
        (**self).get(hub_id, key)
    }

    fn upsert(&self, hub_id: HubId, key: K, value: V) {
        (**self).upsert(hub_id, key, value)
    }

    fn list(&self, hub_id: HubId) -> Vec<V> {
        (**self).list(hub_id)
    }

    fn clear_hub(&self, hub_id: HubId) {
        (**self).clear_hub(hub_id)
    }
}

/// In-memory hub-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryHubStore<K, V> {
    inner: RwLock<HashMap<(HubId, K), V>>,
}

impl<K, V> InMemoryHubStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryHubStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HubStore<K, V> for InMemoryHubStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, hub_id: HubId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(hub_id, key.clone())).cloned()
    }

    fn upsert(&self, hub_id: HubId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((hub_id, key), value);
        }
    }

    fn list(&self, hub_id: HubId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((h, _k), v)| if *h == hub_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_hub(&self, hub_id: HubId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(h, _k), _v| *h != hub_id);
        }
    }
}
