use log::*;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use super::cache::LockCache;

/// Run `work` while holding the lock for `key`.
///
/// Calls for the same key run one at a time in the mutex's wait order; calls
/// for different keys run concurrently. The lock is released on every exit
/// path, and whatever `work` returns (including an `Err`) is handed back to
/// the caller after release.
pub async fn run_with_lock<K, F, Fut, T>(cache: &LockCache<K>, key: K, work: F) -> T
where
    K: Hash + Eq + Clone + Debug,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let lock = cache.get_or_create(key.clone());
    let guard = lock.lock().await;
    debug!("lock acquired for resource: {:?}", key);

    let result = work().await;

    drop(guard);
    debug!("lock released for resource: {:?}", key);

    result
}

impl<K: Hash + Eq + Clone + Debug> LockCache<K> {
    /// shorthand for [`run_with_lock`] on this cache
    pub async fn run<F, Fut, T>(&self, key: K, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        run_with_lock(self, key, work).await
    }
}
