//! Due-Date Calculator
//!
//! Pure functions over local wall-clock time. Weekend skipping treats
//! Saturday and Sunday as non-counting days.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Weekday};

use crate::domain::AnchorTime;

/// Saturday or Sunday
pub fn is_weekend(at: NaiveDateTime) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance `current_due` by `interval_days` counting days.
///
/// Steps one calendar day at a time; with `skip_weekends` a Saturday or Sunday
/// is stepped over without counting. Time of day is preserved.
pub fn compute_next_due(current_due: NaiveDateTime, interval_days: u32, skip_weekends: bool) -> NaiveDateTime {
    let mut next = current_due;
    let mut counted = 0;
    while counted < interval_days {
        next += TimeDelta::days(1);
        if skip_weekends && is_weekend(next) {
            continue;
        }
        counted += 1;
    }
    next
}

/// First due time for a schedule that has none yet.
///
/// Today at `anchor` if that is still ahead of `now`, else tomorrow. With
/// `skip_weekends`, a Sunday moves one day and a Saturday two days.
pub fn bootstrap_due(now: NaiveDateTime, anchor: AnchorTime, skip_weekends: bool) -> NaiveDateTime {
    let today = now.date().and_time(anchor.time());
    let mut due = if today <= now { today + TimeDelta::days(1) } else { today };

    if skip_weekends {
        match due.weekday() {
            Weekday::Sun => due += TimeDelta::days(1),
            Weekday::Sat => due += TimeDelta::days(2),
            _ => {}
        }
    }
    due
}

/// Coarse "time until" text for a not-yet-due schedule, e.g. `3 hours`
pub fn countdown(now: NaiveDateTime, due: NaiveDateTime) -> String {
    let remaining = due.signed_duration_since(now);
    if remaining <= TimeDelta::zero() {
        return "now".to_string();
    }

    let minutes = (remaining.num_seconds() + 59) / 60;
    let (value, unit) = if minutes < 60 {
        (minutes.max(1), "min")
    } else if minutes < 60 * 24 {
        ((minutes + 30) / 60, "hour")
    } else {
        ((minutes + 60 * 12) / (60 * 24), "day")
    };

    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}
