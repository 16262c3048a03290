//! Unlock schedule records
//!
//! An `UnlockSchedule` is a recurrence rule bound to one series. The list of
//! schedules is persisted as a whole; `next_due_at` is the only field the
//! engine itself writes.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UnlockError};

/// Longest accepted recurrence interval
pub const MAX_INTERVAL_DAYS: u32 = 365;

/// Time-of-day anchor for a schedule (`HH:MM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnchorTime(NaiveTime);

impl AnchorTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| UnlockError::InvalidSchedule(format!("invalid time {:02}:{:02}", hour, minute)))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl Default for AnchorTime {
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default())
    }
}

impl FromStr for AnchorTime {
    type Err = UnlockError;

    /// Accepts `H`, `HH:MM` and `HH:MM:SS` (seconds are dropped).
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let hour = parts
            .next()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .ok_or_else(|| UnlockError::InvalidSchedule(format!("invalid time '{}'", s)))?;
        let minute = match parts.next() {
            Some(m) => m
                .trim()
                .parse::<u32>()
                .map_err(|_| UnlockError::InvalidSchedule(format!("invalid time '{}'", s)))?,
            None => 0,
        };
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for AnchorTime {
    type Error = UnlockError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AnchorTime> for String {
    fn from(value: AnchorTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AnchorTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

fn default_true() -> bool {
    true
}

/// A per-series unlock recurrence rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockSchedule {
    /// Series this schedule unlocks episodes for
    pub series_id: i64,

    /// Series display name at the time the schedule was saved
    #[serde(default)]
    pub series_name: String,

    /// Episode title substring; the series title is used when unset
    #[serde(default)]
    pub search_term: Option<String>,

    /// Recurrence interval in whole days (1..=365)
    pub interval_days: u32,

    /// Time of day unlocks happen
    pub anchor: AnchorTime,

    /// Saturdays and Sundays do not count toward the interval
    #[serde(default = "default_true")]
    pub skip_weekends: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Next time an unlock is due; empty until first evaluation
    #[serde(default)]
    pub next_due_at: Option<NaiveDateTime>,
}

impl UnlockSchedule {
    /// Create an enabled daily schedule at the default anchor (02:00)
    pub fn new(series_id: i64, series_name: impl Into<String>) -> Self {
        Self {
            series_id,
            series_name: series_name.into(),
            search_term: None,
            interval_days: 1,
            anchor: AnchorTime::default(),
            skip_weekends: true,
            enabled: true,
            next_due_at: None,
        }
    }

    pub fn with_interval(mut self, days: u32) -> Self {
        self.interval_days = days;
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorTime) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_skip_weekends(mut self, skip: bool) -> Self {
        self.skip_weekends = skip;
        self
    }

    pub fn with_search_term(mut self, term: Option<String>) -> Self {
        self.search_term = term.filter(|t| !t.trim().is_empty());
        self
    }

    /// Check field ranges; run once at the storage boundary
    pub fn validate(&self) -> Result<()> {
        if self.series_id <= 0 {
            return Err(UnlockError::InvalidSchedule(format!(
                "series id must be positive, got {}",
                self.series_id
            )));
        }
        if self.interval_days == 0 || self.interval_days > MAX_INTERVAL_DAYS {
            return Err(UnlockError::InvalidSchedule(format!(
                "interval must be between 1 and {} days, got {}",
                MAX_INTERVAL_DAYS, self.interval_days
            )));
        }
        Ok(())
    }

    /// Human-readable recurrence, e.g. `Every 2 day(s) at 02:00, skipping weekends`
    pub fn describe(&self) -> String {
        let mut text = format!("Every {} day(s) at {}", self.interval_days, self.anchor);
        if self.skip_weekends {
            text.push_str(", skipping weekends");
        }
        text
    }
}
