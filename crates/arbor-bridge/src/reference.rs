use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use arbor_serializer::{HostValue, Identity};
use tracing::{debug, warn};

/// Default capacity of a bridge's reference store.
pub const DEFAULT_REFERENCE_CAPACITY: usize = 4096;

struct StoreInner {
    by_id: HashMap<u64, HostValue>,
    by_identity: HashMap<Identity, u64>,
    order: VecDeque<u64>,
    next_id: u64,
}

/// Holds the instances handed out as reference handles, keyed by a
/// monotonically assigned object id.
///
/// The store is size-bounded: inserting past capacity evicts the oldest
/// entry, and `invalidate`/`clear` drop entries explicitly. This replaces
/// the unbounded identity-keyed map of the original protocol runtime,
/// whose references were never reclaimed.
pub struct ReferenceStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl ReferenceStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(StoreInner {
                by_id: HashMap::new(),
                by_identity: HashMap::new(),
                order: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    /// Parks a value and returns its object id. Re-inserting a value that
    /// is already parked returns the existing id and refreshes its age.
    pub fn insert(&self, value: &HostValue) -> u64 {
        self.insert_tracked(value).0
    }

    /// Like [`insert`](Self::insert), also reporting the ids evicted to
    /// stay within capacity so the caller can drop its own bookkeeping.
    pub fn insert_tracked(&self, value: &HostValue) -> (u64, Vec<u64>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(identity) = value.identity() {
            if let Some(&id) = inner.by_identity.get(&identity) {
                inner.order.retain(|entry| *entry != id);
                inner.order.push_back(id);
                return (id, Vec::new());
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.by_id.insert(id, value.clone());
        if let Some(identity) = value.identity() {
            inner.by_identity.insert(identity, id);
        }
        inner.order.push_back(id);
        debug!(object_id = id, "added reference");

        let mut evictions = Vec::new();
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                warn!(object_id = evicted, "reference store full, evicting oldest");
                Self::drop_entry(&mut inner, evicted);
                evictions.push(evicted);
            }
        }
        (id, evictions)
    }

    pub fn get(&self, id: u64) -> Option<HostValue> {
        self.inner.lock().unwrap().by_id.get(&id).cloned()
    }

    /// Explicitly drops one reference. Returns whether it was present.
    pub fn invalidate(&self, id: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let present = inner.by_id.contains_key(&id);
        if present {
            inner.order.retain(|entry| *entry != id);
            Self::drop_entry(&mut inner, id);
        }
        present
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.by_id.clear();
        inner.by_identity.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drop_entry(inner: &mut StoreInner, id: u64) {
        if let Some(value) = inner.by_id.remove(&id) {
            if let Some(identity) = value.identity() {
                inner.by_identity.remove(&identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instance_keeps_its_id() {
        let store = ReferenceStore::new(8);
        let value = HostValue::list(vec![]);
        let first = store.insert(&value);
        let second = store.insert(&value.clone());
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = ReferenceStore::new(2);
        let a = store.insert(&HostValue::list(vec![]));
        let b = store.insert(&HostValue::list(vec![]));
        let c = store.insert(&HostValue::list(vec![]));
        assert!(store.get(a).is_none());
        assert!(store.get(b).is_some());
        assert!(store.get(c).is_some());
    }

    #[test]
    fn invalidate_is_explicit_and_final() {
        let store = ReferenceStore::new(8);
        let value = HostValue::map(vec![]);
        let id = store.insert(&value);
        assert!(store.invalidate(id));
        assert!(!store.invalidate(id));
        assert!(store.get(id).is_none());

        // re-inserting after invalidation assigns a fresh id
        let next = store.insert(&value);
        assert_ne!(id, next);
    }
}
