//! Run report types.

use chrono::NaiveDateTime;
use std::fmt;

use crate::access::AccessOutcome;
use crate::domain::Episode;

/// Per-schedule result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Unlocked,
    /// Preview of an unlock that a real run would perform
    WillUnlock,
    NotDue,
    /// Due, but no matching `advance` episode; the due date is left as is
    NoEpisodeFound,
    Disabled,
    /// Schedule points at a series the store no longer has
    SeriesMissing,
    /// Episode selected but the taxonomy change did not apply
    UnlockFailed,
}

impl RowStatus {
    pub fn tag(&self) -> &'static str {
        match self {
            RowStatus::Unlocked => "unlocked",
            RowStatus::WillUnlock => "will-unlock",
            RowStatus::NotDue => "not-due",
            RowStatus::NoEpisodeFound => "no-episode-found",
            RowStatus::Disabled => "disabled",
            RowStatus::SeriesMissing => "series-missing",
            RowStatus::UnlockFailed => "unlock-failed",
        }
    }

    /// Counted as an unlock in the summary
    pub fn is_unlock(&self) -> bool {
        matches!(self, RowStatus::Unlocked | RowStatus::WillUnlock)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub series_id: i64,
    pub series_name: String,
    /// Recurrence description, e.g. `Every 1 day(s) at 02:00`
    pub recurrence: String,
    /// Due date the decision was made against
    pub due_at: Option<NaiveDateTime>,
    /// Due date after the run (computed but not stored in preview)
    pub next_due_at: Option<NaiveDateTime>,
    pub episode: Option<Episode>,
    pub status: RowStatus,
    /// Countdown for not-due rows, failure text for failed rows
    pub detail: Option<String>,
    pub access: Option<AccessOutcome>,
}

impl ReportRow {
    pub(crate) fn new(series_id: i64, series_name: impl Into<String>, recurrence: String, status: RowStatus) -> Self {
        Self {
            series_id,
            series_name: series_name.into(),
            recurrence,
            due_at: None,
            next_due_at: None,
            episode: None,
            status,
            detail: None,
            access: None,
        }
    }

    /// Same schedule decision, ignoring whether it was committed
    pub fn same_decision(&self, other: &ReportRow) -> bool {
        let committed = |s: RowStatus| match s {
            RowStatus::WillUnlock => RowStatus::Unlocked,
            other => other,
        };
        self.series_id == other.series_id
            && self.series_name == other.series_name
            && self.recurrence == other.recurrence
            && self.due_at == other.due_at
            && self.next_due_at == other.next_due_at
            && self.episode.as_ref().map(|e| e.id) == other.episode.as_ref().map(|e| e.id)
            && committed(self.status) == committed(other.status)
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub ran_at: NaiveDateTime,
    pub preview: bool,
    pub forced: bool,
    pub rows: Vec<ReportRow>,
}

impl RunReport {
    pub fn new(ran_at: NaiveDateTime, preview: bool, forced: bool) -> Self {
        Self {
            ran_at,
            preview,
            forced,
            rows: Vec::new(),
        }
    }

    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Unlocked (or, in preview, will-unlock) rows
    pub fn unlock_count(&self) -> usize {
        self.rows.iter().filter(|r| r.status.is_unlock()).count()
    }

    pub fn summary(&self) -> String {
        if self.rows.is_empty() {
            return "No unlock schedules configured.".to_string();
        }
        match (self.preview, self.unlock_count()) {
            (_, 0) => "Nothing to unlock.".to_string(),
            (true, n) => format!("Preview: {} episode(s) will be unlocked.", n),
            (false, n) => format!("Success: {} episode(s) have been unlocked!", n),
        }
    }
}
