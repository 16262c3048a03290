//! Advisory run lock shared by the Schedule Runner and schedule administration.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::DaemonConfig;
use crate::error::{Result, UnlockError};
use crate::storage::ScheduleStore;

#[derive(Debug, Clone)]
pub struct RunLock {
    name: String,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(config: &DaemonConfig) -> Self {
        Self {
            name: config.lock_name.clone(),
            stale_after: Duration::from_secs(config.stale_lock_secs),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the lock or fail with `Busy`.
    pub fn acquire(&self, store: &dyn ScheduleStore, now: NaiveDateTime) -> Result<()> {
        if !store.try_acquire_lock(&self.name, now, self.stale_after)? {
            return Err(UnlockError::Busy(format!("'{}' is already running", self.name)));
        }
        log::debug!("Acquired run lock '{}'", self.name);
        Ok(())
    }

    /// Release errors are logged, never returned.
    pub fn release(&self, store: &dyn ScheduleStore) {
        if let Err(e) = store.release_lock(&self.name) {
            log::error!("Failed to release run lock '{}': {}", self.name, e);
        }
    }

    /// Run `f` while holding the lock.
    pub fn hold<T>(&self, store: &dyn ScheduleStore, now: NaiveDateTime, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.acquire(store, now)?;
        let result = f();
        self.release(store);
        result
    }
}
