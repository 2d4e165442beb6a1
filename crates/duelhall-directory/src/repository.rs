//! Concurrency-safe key/value repositories.
//!
//! Process-wide lookups (rooms by id, channels by name) are injected as a
//! [`Repository`] instead of living in statics, so tests get their own and
//! the lifecycle is explicit.

use std::hash::Hash;

use dashmap::DashMap;

/// A shared map that many tasks read and write at once.
///
/// Object safe: callers hold `Arc<dyn Repository<K, V>>`.
pub trait Repository<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    /// Inserts or replaces; returns the previous value.
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Returns the existing value, or inserts the one `make` builds.
    /// Check and insert happen atomically.
    fn get_or_put_with(&self, key: K, make: &mut dyn FnMut() -> V) -> V;

    fn delete(&self, key: &K) -> Option<V>;

    /// Visits entries until `visit` returns `false`.
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`Repository`] over a sharded [`DashMap`].
///
/// Values are cloned out, so store cheap handles (`Arc`s, senders).
/// `make` and `visit` run under a shard lock and must not touch the same
/// repository.
pub struct MemoryRepository<K: Eq + Hash, V> {
    map: DashMap<K, V>,
}

impl<K: Eq + Hash, V> MemoryRepository<K, V> {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> Default for MemoryRepository<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Repository<K, V> for MemoryRepository<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    fn get_or_put_with(&self, key: K, make: &mut dyn FnMut() -> V) -> V {
        self.map.entry(key).or_insert_with(make).value().clone()
    }

    fn delete(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for entry in self.map.iter() {
            if !visit(entry.key(), entry.value()) {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_get_delete() {
        let repo = MemoryRepository::new();
        assert!(repo.is_empty());
        assert_eq!(repo.put(1, "a"), None);
        assert_eq!(repo.put(1, "b"), Some("a"));
        assert_eq!(repo.get(&1), Some("b"));
        assert_eq!(repo.delete(&1), Some("b"));
        assert_eq!(repo.get(&1), None);
    }

    #[test]
    fn test_get_or_put_with_builds_once() {
        let repo = MemoryRepository::new();
        let mut built = 0;
        let first = repo.get_or_put_with("k", &mut || {
            built += 1;
            10
        });
        let second = repo.get_or_put_with("k", &mut || {
            built += 1;
            20
        });
        assert_eq!((first, second, built), (10, 10, 1));
    }

    #[test]
    fn test_range_stops_early() {
        let repo = MemoryRepository::new();
        for i in 0..10 {
            repo.put(i, i);
        }
        let mut seen = 0;
        repo.range(&mut |_, _| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_usable_as_trait_object_across_threads() {
        let repo: Arc<dyn Repository<u32, u32>> = Arc::new(MemoryRepository::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        repo.put(t * 100 + i, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(repo.len(), 400);
    }

    #[test]
    fn test_racing_get_or_put_with_builds_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let repo: Arc<dyn Repository<&str, usize>> = Arc::new(MemoryRepository::new());
        let built = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let repo = Arc::clone(&repo);
                let built = Arc::clone(&built);
                std::thread::spawn(move || {
                    repo.get_or_put_with("room", &mut || {
                        built.fetch_add(1, Ordering::SeqCst);
                        t
                    })
                })
            })
            .collect();
        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|&v| v == seen[0]));
    }
}
