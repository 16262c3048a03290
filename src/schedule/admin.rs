//! Schedule list administration.
//!
//! Schedules are addressed by 1-based position in the stored list; every
//! change rewrites the whole list under the run lock, so an edit made while a
//! run is in flight fails with `Busy` instead of being overwritten.

use chrono::NaiveDateTime;

use super::lock::RunLock;
use crate::config::DaemonConfig;
use crate::domain::UnlockSchedule;
use crate::error::{Result, UnlockError};
use crate::storage::{ContentStore, ScheduleStore};

fn index_of(schedules: &[UnlockSchedule], position: usize) -> Result<usize> {
    if position == 0 || position > schedules.len() {
        return Err(UnlockError::NotFound(format!(
            "No schedule at position {} ({} configured)",
            position,
            schedules.len()
        )));
    }
    Ok(position - 1)
}

pub struct ScheduleAdmin<'a> {
    content: &'a dyn ContentStore,
    store: &'a dyn ScheduleStore,
    lock: RunLock,
}

impl<'a> ScheduleAdmin<'a> {
    pub fn new(content: &'a dyn ContentStore, store: &'a dyn ScheduleStore, config: &DaemonConfig) -> Self {
        Self {
            content,
            store,
            lock: RunLock::new(config),
        }
    }

    /// Append a schedule for an existing series. Returns its position.
    pub fn add(&self, now: NaiveDateTime, schedule: UnlockSchedule) -> Result<usize> {
        let series = self
            .content
            .get_series(schedule.series_id)?
            .ok_or_else(|| UnlockError::NotFound(format!("Series {} not found", schedule.series_id)))?;

        let mut schedule = schedule;
        schedule.series_name = series.title;
        schedule.validate()?;

        self.lock.hold(self.store, now, || {
            let mut schedules = self.store.load_schedules()?;
            schedules.push(schedule);
            self.store.save_schedules(&schedules)?;
            log::info!("Added schedule #{}", schedules.len());
            Ok(schedules.len())
        })
    }

    pub fn remove(&self, now: NaiveDateTime, position: usize) -> Result<UnlockSchedule> {
        self.lock.hold(self.store, now, || {
            let mut schedules = self.store.load_schedules()?;
            let index = index_of(&schedules, position)?;
            let removed = schedules.remove(index);
            self.store.save_schedules(&schedules)?;
            log::info!("Removed schedule #{} ({})", position, removed.series_name);
            Ok(removed)
        })
    }

    pub fn set_enabled(&self, now: NaiveDateTime, position: usize, enabled: bool) -> Result<()> {
        self.lock.hold(self.store, now, || {
            let mut schedules = self.store.load_schedules()?;
            let index = index_of(&schedules, position)?;
            schedules[index].enabled = enabled;
            self.store.save_schedules(&schedules)
        })
    }

    /// Clear every due date so each schedule re-bootstraps on its next evaluation.
    pub fn reset_due_dates(&self, now: NaiveDateTime) -> Result<usize> {
        self.lock.hold(self.store, now, || {
            let mut schedules = self.store.load_schedules()?;
            let mut cleared = 0;
            for schedule in schedules.iter_mut() {
                if schedule.next_due_at.take().is_some() {
                    cleared += 1;
                }
            }
            self.store.save_schedules(&schedules)?;
            log::info!("Reset {} unlock date(s)", cleared);
            Ok(cleared)
        })
    }
}
