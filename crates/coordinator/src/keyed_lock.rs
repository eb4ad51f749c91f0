//! Named async locks
//!
//! Each name maps to one lock, created on first use. A group of names is
//! always acquired in sorted order so two callers asking for overlapping
//! groups cannot deadlock each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock over the pending timer registry
pub const TIMER_LOCK: &str = "timer";
/// Lock over the pending change buffer
pub const CHANGED_FILES_LOCK: &str = "changed-files";
/// Lock over chunk reassembly state
pub const CHUNK_LOCK: &str = "chunk-remaining";

/// Every coordinator resource, for critical sections touching all of them
pub const ALL_LOCKS: &[&str] = &[TIMER_LOCK, CHANGED_FILES_LOCK, CHUNK_LOCK];

#[derive(Default)]
pub struct KeyedLock {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds a group of named locks until dropped
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct KeyedGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every named lock
    ///
    /// Duplicate names are ignored. If the returned future is dropped before
    /// completing, locks taken so far are released.
    pub async fn acquire(&self, names: &[&str]) -> KeyedGuard {
        let mut names = names.to_vec();
        names.sort_unstable();
        names.dedup();

        let mutexes: Vec<_> = {
            let mut locks = self.locks.lock();
            names
                .iter()
                .map(|name| locks.entry(name.to_string()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        KeyedGuard { _guards: guards }
    }

    /// Run `f` with every named lock held
    ///
    /// The locks are released when `f` completes, returns early, or unwinds.
    pub async fn with_lock<F, Fut, T>(&self, names: &[&str], f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(names).await;
        f().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let lock = Arc::new(KeyedLock::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            tasks.push(tokio::spawn(async move {
                lock.with_lock(&[TIMER_LOCK], || async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disjoint_names_do_not_block() {
        let lock = KeyedLock::new();
        let _timer = lock.acquire(&[TIMER_LOCK]).await;

        let acquired = tokio::time::timeout(Duration::from_secs(1), lock.acquire(&[CHUNK_LOCK])).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_groups_in_any_order() {
        let lock = Arc::new(KeyedLock::new());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let lock = lock.clone();
            tasks.push(tokio::spawn(async move {
                let names: &[&str] = if i % 2 == 0 {
                    &[CHUNK_LOCK, TIMER_LOCK, CHANGED_FILES_LOCK]
                } else {
                    &[CHANGED_FILES_LOCK, CHUNK_LOCK]
                };
                lock.with_lock(names, || tokio::task::yield_now()).await;
            }));
        }

        let all = futures::future::join_all(tasks);
        let results = tokio::time::timeout(Duration::from_secs(5), all).await.unwrap();
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_duplicate_names_acquire_once() {
        let lock = KeyedLock::new();
        let value = lock.with_lock(&[TIMER_LOCK, TIMER_LOCK], || async { 7 }).await;
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let lock = Arc::new(KeyedLock::new());

        let panicking = lock.clone();
        let result = tokio::spawn(async move {
            panicking
                .with_lock(&[CHANGED_FILES_LOCK], || async { panic!("boom") })
                .await
        })
        .await;
        assert!(result.is_err());

        let reacquired = tokio::time::timeout(Duration::from_secs(1), lock.acquire(&[CHANGED_FILES_LOCK])).await;
        assert!(reacquired.is_ok());
    }
}
