// In-memory registry of running jobs keyed by JobKey

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::models::JobKey;

struct RegisteredJob {
    epoch: u64,
    handle: JoinHandle<()>,
}

/// Serializes all job registration so add-or-replace and cancel stay
/// race-free when timers, manual triggers, and shutdown overlap.
///
/// Every registration gets a fresh epoch. A bounded job that reaches its
/// end retires itself with that epoch; if the slot was re-registered in
/// the meantime the stale retire is a no-op and the replacement survives.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobKey, RegisteredJob>>,
    next_epoch: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, RegisteredJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a job under `key`, replacing and aborting any job
    /// already registered there. `spawn` receives the new epoch and must
    /// return the task handle; it runs under the registry lock, so it
    /// must only spawn, never block.
    pub fn schedule<F>(&self, key: JobKey, spawn: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let mut jobs = self.jobs();
        if let Some(previous) = jobs.remove(&key) {
            previous.handle.abort();
        }
        let handle = spawn(epoch);
        jobs.insert(key, RegisteredJob { epoch, handle });
        epoch
    }

    /// Aborts and removes the job under `key`. Cancelling a key with no
    /// registered job is a no-op.
    pub fn cancel(&self, key: &JobKey) -> bool {
        match self.jobs().remove(key) {
            Some(job) => {
                job.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Removes the entry under `key` only if it still belongs to `epoch`.
    ///
    /// Called by a job task that is ending on its own; the task is not
    /// aborted. Returns false when the slot was already re-registered.
    pub fn retire(&self, key: &JobKey, epoch: u64) -> bool {
        let mut jobs = self.jobs();
        match jobs.get(key) {
            Some(job) if job.epoch == epoch => {
                jobs.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.jobs().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Aborts every registered job and empties the registry.
    pub fn clear(&self) {
        let mut jobs = self.jobs();
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
    }
}
