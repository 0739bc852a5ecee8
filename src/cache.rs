use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Process-lifetime memo table.
///
/// One slot per key; the map lock is held only while the slot is looked up,
/// and the slot's `OnceCell` makes concurrent callers for the same key wait
/// on a single load. Failed loads leave the slot empty so the next caller
/// retries. Nothing is ever evicted.
pub struct MemoCache<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    pub fn get_or_try_load<E, F>(&self, key: &K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.slot(key).get_or_try_init(load).cloned()
    }

    /// The cached value, without loading.
    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of keys holding a loaded value.
    pub fn loaded(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|c| c.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn loads_each_key_once() {
        let cache: MemoCache<String, Arc<Vec<u32>>> = MemoCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_try_load::<(), _>(&"a".to_string(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(vec![1, 2, 3]))
                })
                .unwrap();
            assert_eq!(v.len(), 3);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loaded(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: MemoCache<&'static str, u32> = MemoCache::new();
        let first: Result<u32, &str> = cache.get_or_try_load(&"k", || Err("offline"));
        assert!(first.is_err());
        assert_eq!(cache.get(&"k"), None);
        let second: Result<u32, &str> = cache.get_or_try_load(&"k", || Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(cache.get(&"k"), Some(7));
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let cache: Arc<MemoCache<u8, u64>> = Arc::new(MemoCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_try_load::<(), _>(&1, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
