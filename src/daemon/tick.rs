//! Tick Loop - daemon main loop
//!
//! Each tick either waits for the next daily fire time or, with no enabled
//! schedule, polls the schedule list again after `idle_poll`.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::DaemonConfig;
use crate::error::{Result, UnlockError};
use crate::schedule::{RunOptions, ScheduleRunner, local_now, next_trigger};
use crate::storage::ScheduleStore;

/// What the next tick waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Fire the runner at this local time
    FireAt(NaiveDateTime),
    /// Nothing enabled; look again later
    Idle,
}

/// Outcome of one fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Runner completed; number of episodes unlocked
    Ran(usize),
    /// Another invocation held the run lock
    Busy,
    /// Runner failed
    Error(String),
}

/// Counters across the daemon's lifetime
#[derive(Debug, Default)]
pub struct TickState {
    pub fires: u64,
    pub total_unlocked: u64,
    pub busy_skips: u64,
    pub errors: u64,
}

impl TickState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &TickResult) {
        self.fires += 1;
        match result {
            TickResult::Ran(n) => self.total_unlocked += *n as u64,
            TickResult::Busy => self.busy_skips += 1,
            TickResult::Error(_) => self.errors += 1,
        }
    }
}

pub struct UnlockDaemon<'a> {
    runner: ScheduleRunner<'a>,
    schedules: &'a dyn ScheduleStore,
    idle_poll: Duration,
    state: TickState,
}

impl<'a> UnlockDaemon<'a> {
    pub fn new(runner: ScheduleRunner<'a>, schedules: &'a dyn ScheduleStore, config: &DaemonConfig) -> Self {
        Self {
            runner,
            schedules,
            idle_poll: Duration::from_secs(config.idle_poll_secs.max(1)),
            state: TickState::new(),
        }
    }

    pub fn state(&self) -> &TickState {
        &self.state
    }

    /// Decide when to fire next
    pub fn plan(&self, now: NaiveDateTime) -> Result<TickPlan> {
        let schedules = self.schedules.load_schedules()?;
        Ok(match next_trigger(&schedules, now) {
            Some(at) => TickPlan::FireAt(at),
            None => TickPlan::Idle,
        })
    }

    /// Run the Schedule Runner once at `now`
    pub async fn fire(&mut self, now: NaiveDateTime) -> TickResult {
        let result = match self.runner.run(now, RunOptions::default()).await {
            Ok(report) => {
                log::info!("Scheduled run finished: {}", report.summary());
                TickResult::Ran(report.count(crate::schedule::RowStatus::Unlocked))
            }
            Err(UnlockError::Busy(msg)) => {
                log::warn!("Skipping scheduled run: {}", msg);
                TickResult::Busy
            }
            Err(e) => {
                log::error!("Scheduled run failed: {}", e);
                TickResult::Error(e.to_string())
            }
        };
        self.state.record(&result);
        result
    }

    /// Loop until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = local_now();
            let plan = match self.plan(now) {
                Ok(plan) => plan,
                Err(e) => {
                    log::error!("Failed to plan next run: {}; retrying in {:?}", e, self.idle_poll);
                    self.state.errors += 1;
                    TickPlan::Idle
                }
            };
            let wait = match plan {
                TickPlan::FireAt(at) => at.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO),
                TickPlan::Idle => self.idle_poll,
            };

            match plan {
                TickPlan::FireAt(at) => log::info!("Next scheduled run at {}", at),
                TickPlan::Idle => log::info!("Nothing to schedule; checking again in {:?}", wait),
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break;
                }
            }

            if let TickPlan::FireAt(_) = plan {
                self.fire(local_now()).await;
            }
        }

        log::info!(
            "Daemon stopped after {} run(s), {} unlock(s)",
            self.state.fires,
            self.state.total_unlocked
        );
        Ok(())
    }
}
