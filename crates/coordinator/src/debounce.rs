//! Per-project quiet-period timers
//!
//! At most one timer is pending per project. Arming replaces the pending
//! timer, so a callback only runs after a full delay with no newer arm, and
//! a cancelled or replaced timer never runs its callback.

use crate::keyed_lock::KeyedLock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Default)]
pub struct DebounceScheduler {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    timers: Mutex<HashMap<String, PendingTimer>>,
    next_generation: AtomicU64,
    /// Held while a timer claims itself and runs its callback
    guard: Option<(Arc<KeyedLock>, &'static [&'static str])>,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler whose callbacks run with the named locks held
    ///
    /// Callers that arm and cancel under the same locks get a consistent
    /// view: a callback never runs concurrently with them, and a timer
    /// cancelled under the locks can no longer fire. Callbacks must not
    /// acquire these locks again.
    pub fn guarded_by(lock: Arc<KeyedLock>, names: &'static [&'static str]) -> Self {
        Self {
            inner: Arc::new(Inner {
                guard: Some((lock, names)),
                ..Default::default()
            }),
        }
    }

    /// Run `on_fire` after `delay` unless re-armed or cancelled first
    pub fn arm<F, Fut>(&self, project_id: &str, delay: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.arm_prepared(project_id, delay, || std::future::ready(()), move |()| on_fire());
    }

    /// Like [`arm`](Self::arm), running `prepare` once the delay elapses
    ///
    /// `prepare` runs before the guard locks are taken and its output is
    /// handed to `on_fire`. The timer stays cancellable while it runs.
    pub fn arm_prepared<P, PFut, T, F, Fut>(&self, project_id: &str, delay: Duration, prepare: P, on_fire: F)
    where
        P: FnOnce() -> PFut + Send + 'static,
        PFut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let id = project_id.to_string();

        let mut timers = self.inner.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let prepared = prepare().await;

            let _guard = match &inner.guard {
                Some((lock, names)) => Some(lock.acquire(names).await),
                None => None,
            };
            if !inner.claim(&id, generation) {
                debug!(project_id = %id, "Superseded timer skipped");
                return;
            }
            debug!(project_id = %id, "Quiet period elapsed");
            on_fire(prepared).await;
        });

        if let Some(previous) = timers.insert(project_id.to_string(), PendingTimer { generation, handle }) {
            previous.handle.abort();
        }
        debug!(project_id, "Timer armed for {:?}", delay);
    }

    /// Drop the pending timer of a project; false if there was none
    pub fn cancel(&self, project_id: &str) -> bool {
        match self.inner.timers.lock().remove(project_id) {
            Some(timer) => {
                timer.handle.abort();
                debug!(project_id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, timer) in self.inner.timers.lock().drain() {
            timer.handle.abort();
        }
    }

    pub fn is_pending(&self, project_id: &str) -> bool {
        self.inner.timers.lock().contains_key(project_id)
    }
}

impl Inner {
    /// Remove the timer entry if it still belongs to `generation`
    fn claim(&self, project_id: &str, generation: u64) -> bool {
        let mut timers = self.timers.lock();
        match timers.get(project_id) {
            Some(timer) if timer.generation == generation => {
                timers.remove(project_id);
                true
            }
            _ => false,
        }
    }
}
