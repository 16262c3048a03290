//! Schedule Runner
//!
//! Evaluates every schedule in stored order. Per schedule:
//!
//! ```text
//! disabled       -> skip
//! uninitialized  -> bootstrap next_due_at (stored unless preview), then re-check
//! not_due        -> report countdown
//! due / forced   -> select episode
//!                     none  -> no-episode-found, next_due_at unchanged (retried next run)
//!                     found -> apply free, advance next_due_at on success
//! ```
//!
//! Preview performs every read and decision but writes nothing. Non-preview
//! runs hold the advisory run lock for their whole duration.

use chrono::NaiveDateTime;

use super::due::{bootstrap_due, compute_next_due, countdown};
use super::lock::RunLock;
use super::report::{ReportRow, RowStatus, RunReport};
use crate::access::{AccessApplier, StepStatus};
use crate::catalog::EpisodeCatalog;
use crate::config::Config;
use crate::domain::{AccessTier, UnlockSchedule};
use crate::error::Result;
use crate::platform::SubscriptionPlatform;
use crate::storage::{ContentStore, ScheduleStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Decide and report, persist nothing
    pub preview: bool,
    /// Treat every enabled schedule as due
    pub force: bool,
}

impl RunOptions {
    pub fn preview() -> Self {
        Self {
            preview: true,
            force: false,
        }
    }

    pub fn forced() -> Self {
        Self {
            preview: false,
            force: true,
        }
    }
}

pub struct ScheduleRunner<'a> {
    content: &'a dyn ContentStore,
    schedules: &'a dyn ScheduleStore,
    platform: &'a dyn SubscriptionPlatform,
    config: &'a Config,
}

impl<'a> ScheduleRunner<'a> {
    pub fn new(
        content: &'a dyn ContentStore,
        schedules: &'a dyn ScheduleStore,
        platform: &'a dyn SubscriptionPlatform,
        config: &'a Config,
    ) -> Self {
        Self {
            content,
            schedules,
            platform,
            config,
        }
    }

    /// Evaluate all schedules at `now`.
    ///
    /// Returns `Busy` when a non-preview run finds the run lock held.
    pub async fn run(&self, now: NaiveDateTime, options: RunOptions) -> Result<RunReport> {
        if options.preview {
            return self.run_unlocked(now, options).await;
        }

        let lock = RunLock::new(&self.config.daemon);
        lock.acquire(self.schedules, now)?;
        let result = self.run_unlocked(now, options).await;
        lock.release(self.schedules);
        result
    }

    async fn run_unlocked(&self, now: NaiveDateTime, options: RunOptions) -> Result<RunReport> {
        let mut schedules = self.schedules.load_schedules()?;
        let mut report = RunReport::new(now, options.preview, options.force);

        log::info!(
            "Evaluating {} schedule(s) at {}{}{}",
            schedules.len(),
            now,
            if options.preview { " [preview]" } else { "" },
            if options.force { " [force]" } else { "" }
        );

        for index in 0..schedules.len() {
            let before = schedules[index].next_due_at;
            let row = match self.evaluate(&mut schedules[index], now, options).await {
                Ok(row) => row,
                Err(e) => {
                    log::error!("Schedule for '{}' failed: {}", schedules[index].series_name, e);
                    let schedule = &schedules[index];
                    let mut row = ReportRow::new(
                        schedule.series_id,
                        schedule.series_name.clone(),
                        schedule.describe(),
                        RowStatus::UnlockFailed,
                    );
                    row.due_at = schedule.next_due_at;
                    row.next_due_at = schedule.next_due_at;
                    row.detail = Some(e.to_string());
                    row
                }
            };

            if !options.preview && schedules[index].next_due_at != before {
                self.schedules.save_schedules(&schedules)?;
            }

            log::info!("{} [{}] due {:?}", row.series_name, row.status, row.due_at);
            report.rows.push(row);
        }

        log::info!("{}", report.summary());
        Ok(report)
    }

    async fn evaluate(&self, schedule: &mut UnlockSchedule, now: NaiveDateTime, options: RunOptions) -> Result<ReportRow> {
        let mut row = ReportRow::new(
            schedule.series_id,
            schedule.series_name.clone(),
            schedule.describe(),
            RowStatus::Disabled,
        );
        row.due_at = schedule.next_due_at;
        row.next_due_at = schedule.next_due_at;

        if !schedule.enabled {
            return Ok(row);
        }

        let Some(series) = self.content.get_series(schedule.series_id)? else {
            row.status = RowStatus::SeriesMissing;
            row.detail = Some(format!("Series {} not found", schedule.series_id));
            return Ok(row);
        };
        row.series_name = series.title.clone();
        let override_term = schedule.search_term.clone().or_else(|| series.search_term.clone());
        let series = series.with_search_term(override_term);

        let due = match schedule.next_due_at {
            Some(due) => due,
            None => {
                let due = bootstrap_due(now, schedule.anchor, schedule.skip_weekends);
                log::info!("Initialized next unlock for '{}' to {}", series.title, due);
                // In preview the list is never saved, so this stays in memory.
                schedule.next_due_at = Some(due);
                due
            }
        };
        row.due_at = Some(due);
        row.next_due_at = Some(due);

        if !options.force && now < due {
            row.status = RowStatus::NotDue;
            row.detail = Some(countdown(now, due));
            return Ok(row);
        }

        let catalog = EpisodeCatalog::new(self.content, &self.config.fields);
        let Some(episode) = catalog.select_next_episode(&series)? else {
            row.status = RowStatus::NoEpisodeFound;
            return Ok(row);
        };

        let next_due = compute_next_due(due, schedule.interval_days, schedule.skip_weekends);
        row.episode = Some(episode.clone());

        if options.preview {
            row.status = RowStatus::WillUnlock;
            row.next_due_at = Some(next_due);
            return Ok(row);
        }

        let applier = AccessApplier::new(
            self.content,
            self.platform,
            &self.config.fields,
            self.config.settings.paid_tier_id(),
        );
        let outcome = applier.apply_access(&episode, AccessTier::Free).await?;

        if outcome.success() {
            schedule.next_due_at = Some(next_due);
            row.status = RowStatus::Unlocked;
            row.next_due_at = Some(next_due);
        } else {
            row.status = RowStatus::UnlockFailed;
            row.detail = outcome
                .steps
                .iter()
                .find(|r| matches!(r.status, StepStatus::Failed(_)))
                .map(|r| r.status.detail().to_string());
        }
        row.access = Some(outcome);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::test_support::RecordingPlatform;
    use crate::catalog::test_support::seed_episode;
    use crate::error::UnlockError;
    use crate::storage::SqliteStore;
    use chrono::{NaiveDate, TimeDelta};
    use std::time::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    struct Fixture {
        store: SqliteStore,
        config: Config,
        platform: RecordingPlatform,
        series_id: i64,
    }

    fn fixture(due: Option<NaiveDateTime>) -> Fixture {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = Config::default();
        let series_id = store.insert_series("Tower").unwrap();
        let mut schedule = UnlockSchedule::new(series_id, "Tower").with_skip_weekends(false);
        schedule.next_due_at = due;
        store.save_schedules(&[schedule]).unwrap();
        Fixture {
            store,
            config,
            platform: RecordingPlatform::default(),
            series_id,
        }
    }

    impl Fixture {
        fn runner(&self) -> ScheduleRunner<'_> {
            ScheduleRunner::new(&self.store, &self.store, &self.platform, &self.config)
        }

        fn due(&self) -> Option<NaiveDateTime> {
            self.store.load_schedules().unwrap()[0].next_due_at
        }
    }

    #[tokio::test]
    async fn test_due_schedule_unlocks_lowest_episode() {
        let due = at(2025, 1, 8, 2, 0);
        let f = fixture(Some(due));
        let fields = &f.config.fields;
        let eight = seed_episode(&f.store, fields, "Tower Episode 8", Some(8), AccessTier::Advance, None);
        let three = seed_episode(&f.store, fields, "Tower Episode 3", Some(3), AccessTier::Advance, None);

        let report = f.runner().run(at(2025, 1, 8, 2, 5), RunOptions::default()).await.unwrap();

        assert_eq!(report.rows[0].status, RowStatus::Unlocked);
        assert_eq!(report.rows[0].episode.as_ref().unwrap().id, three);
        assert_eq!(f.due(), Some(due + TimeDelta::days(1)));
        let catalog = EpisodeCatalog::new(&f.store, fields);
        assert_eq!(catalog.load(three).unwrap().unwrap().access, AccessTier::Free);
        assert_eq!(catalog.load(eight).unwrap().unwrap().access, AccessTier::Advance);
    }

    #[tokio::test]
    async fn test_not_due_reports_countdown_without_mutation() {
        let due = at(2025, 1, 8, 2, 0);
        let f = fixture(Some(due));
        seed_episode(&f.store, &f.config.fields, "Tower Episode 1", Some(1), AccessTier::Advance, None);

        let report = f.runner().run(at(2025, 1, 7, 23, 0), RunOptions::default()).await.unwrap();
        assert_eq!(report.rows[0].status, RowStatus::NotDue);
        assert_eq!(report.rows[0].detail.as_deref(), Some("3 hours"));
        assert_eq!(f.due(), Some(due));
    }

    #[tokio::test]
    async fn test_uninitialized_schedule_is_bootstrapped() {
        let f = fixture(None);
        let report = f.runner().run(at(2025, 1, 8, 1, 30), RunOptions::default()).await.unwrap();
        assert_eq!(report.rows[0].status, RowStatus::NotDue);
        assert_eq!(f.due(), Some(at(2025, 1, 8, 2, 0)));
    }

    #[tokio::test]
    async fn test_preview_does_not_bootstrap_persistently() {
        let f = fixture(None);
        let report = f.runner().run(at(2025, 1, 8, 3, 0), RunOptions::preview()).await.unwrap();
        assert_eq!(report.rows[0].due_at, Some(at(2025, 1, 9, 2, 0)));
        assert_eq!(f.due(), None);
    }

    #[tokio::test]
    async fn test_no_episode_leaves_due_unchanged() {
        let due = at(2025, 1, 8, 2, 0);
        let f = fixture(Some(due));
        seed_episode(&f.store, &f.config.fields, "Other Episode 1", Some(1), AccessTier::Advance, None);

        let report = f.runner().run(at(2025, 1, 9, 2, 0), RunOptions::default()).await.unwrap();
        assert_eq!(report.rows[0].status, RowStatus::NoEpisodeFound);
        assert_eq!(f.due(), Some(due));
    }

    #[tokio::test]
    async fn test_disabled_and_missing_series() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = Config::default();
        let platform = RecordingPlatform::default();
        let series_id = store.insert_series("Tower").unwrap();
        let mut disabled = UnlockSchedule::new(series_id, "Tower");
        disabled.enabled = false;
        let missing = UnlockSchedule::new(999, "Gone");
        store.save_schedules(&[disabled, missing]).unwrap();

        let runner = ScheduleRunner::new(&store, &store, &platform, &config);
        let report = runner.run(at(2025, 1, 8, 2, 0), RunOptions::forced()).await.unwrap();
        assert_eq!(report.rows[0].status, RowStatus::Disabled);
        assert_eq!(report.rows[1].status, RowStatus::SeriesMissing);
        assert_eq!(store.load_schedules().unwrap()[1].next_due_at, None);
    }

    #[tokio::test]
    async fn test_schedule_search_term_overrides_series_title() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = Config::default();
        let platform = RecordingPlatform::default();
        let series_id = store.insert_series("The Tower of Endless Trials").unwrap();
        let schedule = UnlockSchedule::new(series_id, "Tower").with_search_term(Some("Tower".to_string()));
        store.save_schedules(&[schedule]).unwrap();
        let id = seed_episode(&store, &config.fields, "Tower Ep 4", Some(4), AccessTier::Advance, None);

        let runner = ScheduleRunner::new(&store, &store, &platform, &config);
        let report = runner.run(at(2025, 1, 8, 2, 0), RunOptions::forced()).await.unwrap();
        assert_eq!(report.rows[0].episode.as_ref().map(|e| e.id), Some(id));
    }

    #[tokio::test]
    async fn test_held_lock_makes_run_busy() {
        let f = fixture(Some(at(2025, 1, 8, 2, 0)));
        let now = at(2025, 1, 8, 2, 5);
        assert!(f
            .store
            .try_acquire_lock(&f.config.daemon.lock_name, now, Duration::from_secs(3600))
            .unwrap());

        let err = f.runner().run(now, RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, UnlockError::Busy(_)));

        // Preview ignores the lock.
        assert!(f.runner().run(now, RunOptions::preview()).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_released_after_run() {
        let f = fixture(Some(at(2025, 1, 8, 2, 0)));
        let now = at(2025, 1, 8, 2, 5);
        f.runner().run(now, RunOptions::default()).await.unwrap();
        f.runner().run(now, RunOptions::default()).await.unwrap();
    }

    /// Platform that edits the schedule list while the access change is in flight.
    struct EditingPlatform<'a> {
        admin: crate::schedule::ScheduleAdmin<'a>,
        now: NaiveDateTime,
        edit: std::sync::Mutex<Option<Result<UnlockSchedule>>>,
    }

    #[async_trait::async_trait]
    impl crate::platform::SubscriptionPlatform for EditingPlatform<'_> {
        async fn set_post_visibility(&self, _post_id: &str, _public: bool) -> Result<crate::platform::RemoteResponse> {
            let result = self.admin.remove(self.now, 2);
            *self.edit.lock().unwrap() = Some(result);
            Ok(crate::platform::RemoteResponse {
                status: 200,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_schedule_edit_during_run_is_refused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = Config::default();
        let now = at(2025, 1, 8, 2, 5);
        let tower = store.insert_series("Tower").unwrap();
        let other = store.insert_series("Other").unwrap();
        let mut schedule = UnlockSchedule::new(tower, "Tower").with_skip_weekends(false);
        schedule.next_due_at = Some(at(2025, 1, 8, 2, 0));
        store.save_schedules(&[schedule, UnlockSchedule::new(other, "Other")]).unwrap();
        seed_episode(&store, &config.fields, "Tower Episode 1", Some(1), AccessTier::Advance, Some("42"));

        let platform = EditingPlatform {
            admin: crate::schedule::ScheduleAdmin::new(&store, &store, &config.daemon),
            now,
            edit: std::sync::Mutex::new(None),
        };
        let runner = ScheduleRunner::new(&store, &store, &platform, &config);
        let report = runner.run(now, RunOptions::default()).await.unwrap();

        assert_eq!(report.rows[0].status, RowStatus::Unlocked);
        let edit = platform.edit.lock().unwrap().take().unwrap();
        assert!(matches!(edit, Err(UnlockError::Busy(_))));
        assert_eq!(store.load_schedules().unwrap().len(), 2);

        // Once the run is over the same edit goes through.
        platform.admin.remove(now, 2).unwrap();
        assert_eq!(store.load_schedules().unwrap().len(), 1);
    }
}
