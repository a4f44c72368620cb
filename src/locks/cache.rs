use async_std::sync::Mutex;
use hashbrown::HashMap;
use log::*;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use crate::config::LockCacheConfig;
use crate::error::{Error, Result};

/// the per-resource lock handed out by the cache
pub type ResourceLock = Arc<Mutex<()>>;

#[derive(Debug)]
struct Entry {
    lock: ResourceLock,
    tick: u64,
}

impl Entry {
    // the cache owns one reference; any other clone means a caller holds,
    // awaits or is about to lock this resource
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.lock) > 1
    }
}

#[derive(Debug)]
struct Entries<K> {
    map: HashMap<K, Entry>,
    // recency order, lowest tick is least recently used
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Hash + Eq + Clone> Entries<K> {
    fn new() -> Self {
        Entries {
            map: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    fn touch(&mut self, key: K) -> ResourceLock {
        self.tick += 1;
        let tick = self.tick;

        let lock = match self.map.get_mut(&key) {
            Some(entry) => {
                self.order.remove(&entry.tick);
                entry.tick = tick;
                entry.lock.clone()
            }
            None => {
                let lock = Arc::new(Mutex::new(()));
                let entry = Entry {
                    lock: lock.clone(),
                    tick,
                };
                self.map.insert(key.clone(), entry);
                lock
            }
        };

        self.order.insert(tick, key);
        lock
    }

    fn evict(&mut self, max_size: usize) -> usize {
        let mut excess = self.map.len().saturating_sub(max_size);
        if excess == 0 {
            return 0;
        }

        let mut victims = Vec::with_capacity(excess);
        for (tick, key) in self.order.iter() {
            if excess == 0 {
                break;
            }

            if let Some(entry) = self.map.get(key) {
                if !entry.in_use() {
                    victims.push(*tick);
                    excess -= 1;
                }
            }
        }

        for tick in victims.iter() {
            if let Some(key) = self.order.remove(tick) {
                self.map.remove(&key);
            }
        }

        victims.len()
    }
}

/// A bounded map of resource id to async mutex with least-recently-used eviction.
///
/// Entries whose lock is in use (held, awaited, or still referenced by a caller)
/// are skipped by eviction, so every caller working on the same resource id
/// shares the same lock. When all excess entries are in use the cache stays over
/// `max_size` until a later lookup (or `evict_idle`) finds them released.
#[derive(Debug)]
pub struct LockCache<K> {
    max_size: usize,
    entries: StdMutex<Entries<K>>,
}

impl<K: Hash + Eq + Clone + Debug> LockCache<K> {
    pub fn new(max_size: usize) -> Result<LockCache<K>> {
        if max_size == 0 {
            return Err(Error::InvalidCapacity(max_size));
        }

        Ok(LockCache {
            max_size,
            entries: StdMutex::new(Entries::new()),
        })
    }

    pub fn from_config(config: &LockCacheConfig) -> Result<LockCache<K>> {
        config.validate()?;
        LockCache::new(config.max_size)
    }

    /// return the lock for this resource, creating it on first use, and mark
    /// it as the most recently used entry.
    pub fn get_or_create(&self, key: K) -> ResourceLock {
        let mut entries = self.entries();
        let lock = entries.touch(key);

        let evicted = entries.evict(self.max_size);
        if evicted > 0 {
            debug!("evicted {} idle locks, size: {}", evicted, entries.map.len());
        }

        if entries.map.len() > self.max_size {
            debug!(
                "lock cache over capacity, size: {}, max: {}",
                entries.map.len(),
                self.max_size
            );
        }

        lock
    }

    /// run an eviction pass without a lookup; returns the number of evicted entries
    pub fn evict_idle(&self) -> usize {
        self.entries().evict(self.max_size)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries().map.contains_key(key)
    }

    /// the cached keys from most to least recently used
    pub fn keys(&self) -> Vec<K> {
        self.entries().order.values().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // the bookkeeping never panics while locked, so a poisoned map is still consistent
    fn entries(&self) -> MutexGuard<'_, Entries<K>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new() {
        let cache: LockCache<u64> = LockCache::new(10).expect("should create the cache");
        assert_eq!(cache.max_size(), 10);
        assert!(cache.is_empty());

        let result: Result<LockCache<u64>> = LockCache::new(0);
        assert!(matches!(result, Err(Error::InvalidCapacity(0))));
    }

    #[test]
    fn from_config() {
        let config = LockCacheConfig { max_size: 3 };
        let cache: LockCache<String> = LockCache::from_config(&config).unwrap();
        assert_eq!(cache.max_size(), 3);

        let config = LockCacheConfig { max_size: 0 };
        assert!(LockCache::<String>::from_config(&config).is_err());
    }

    #[test]
    fn same_lock_for_same_id() {
        let cache = LockCache::new(10).unwrap();
        let lock1 = cache.get_or_create(1);
        let lock2 = cache.get_or_create(1);
        assert!(Arc::ptr_eq(&lock1, &lock2));
        assert_eq!(cache.len(), 1);

        let other = cache.get_or_create(2);
        assert!(!Arc::ptr_eq(&lock1, &other));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = LockCache::new(2).unwrap();
        cache.get_or_create(1);
        cache.get_or_create(2);
        cache.get_or_create(3);

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn lookup_refreshes_recency() {
        let cache = LockCache::new(2).unwrap();
        cache.get_or_create("a");
        cache.get_or_create("b");
        cache.get_or_create("a");
        assert_eq!(cache.keys(), vec!["a", "b"]);

        cache.get_or_create("c");
        assert_eq!(cache.keys(), vec!["c", "a"]);
        assert!(!cache.contains(&"b"));
    }

    #[test]
    fn never_evicts_held_lock() {
        let cache = LockCache::new(2).unwrap();
        let held = cache.get_or_create(1);
        let guard = held.try_lock().expect("a new lock should be free");

        cache.get_or_create(2);
        cache.get_or_create(3);

        // 1 is the oldest but held, so 2 goes instead
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));

        let again = cache.get_or_create(1);
        assert!(Arc::ptr_eq(&held, &again));
        assert!(again.try_lock().is_none());

        drop(guard);
        assert!(again.try_lock().is_some());
    }

    #[test]
    fn over_capacity_until_released() {
        let cache = LockCache::new(1).unwrap();
        let a = cache.get_or_create(1);
        let b = cache.get_or_create(2);
        assert_eq!(cache.len(), 2);

        // nothing idle to evict
        assert_eq!(cache.evict_idle(), 0);

        drop(a);
        drop(b);
        cache.get_or_create(3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys(), vec![3]);
    }

    #[test]
    fn evict_idle_restores_capacity() {
        let cache = LockCache::new(2).unwrap();
        let handles: Vec<ResourceLock> = (0..4).map(|id| cache.get_or_create(id)).collect();
        assert_eq!(cache.len(), 4);

        drop(handles);
        assert_eq!(cache.evict_idle(), 2);
        assert_eq!(cache.keys(), vec![3, 2]);
    }

    #[test]
    fn bounded_under_many_ids() {
        let cache = LockCache::new(8).unwrap();
        for id in 0..1_000u32 {
            cache.get_or_create(id);
            assert!(cache.len() <= 8);
        }

        assert_eq!(cache.keys().first(), Some(&999));
    }
}
