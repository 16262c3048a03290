//! Recurring trigger: one fire per day at the earliest enabled anchor time.

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::{AnchorTime, UnlockSchedule};

/// Earliest anchor across enabled schedules
pub fn earliest_anchor(schedules: &[UnlockSchedule]) -> Option<AnchorTime> {
    schedules.iter().filter(|s| s.enabled).map(|s| s.anchor).min()
}

/// Next occurrence of `anchor` strictly after `now`
pub fn next_fire(now: NaiveDateTime, anchor: AnchorTime) -> NaiveDateTime {
    let today = now.date().and_time(anchor.time());
    if today <= now { today + TimeDelta::days(1) } else { today }
}

/// When the trigger should next fire, or `None` with nothing enabled
pub fn next_trigger(schedules: &[UnlockSchedule], now: NaiveDateTime) -> Option<NaiveDateTime> {
    earliest_anchor(schedules).map(|anchor| next_fire(now, anchor))
}
