//! Episode-number sync - fills the episode-number field from titles.

use regex::Regex;
use std::sync::LazyLock;

use super::{EpisodeCatalog, parse_episode_number};
use crate::error::Result;

/// Title patterns, tried in order; the first match wins.
static NUMBER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Episode\s+(\d+)",
        r"(?i)Ep\s+(\d+)",
        r"(?i)Chapter\s+(\d+)",
        r"\b(\d+)\s*$",
        r"#\s*(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Pull an episode number out of a title.
pub fn extract_episode_number(title: &str) -> Option<i64> {
    NUMBER_PATTERNS.iter().find_map(|re| {
        re.captures(title)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Per-episode sync result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    AlreadySet,
    WillUpdate,
    Updated,
    NoNumberFound,
}

impl SyncStatus {
    pub fn tag(&self) -> &'static str {
        match self {
            SyncStatus::AlreadySet => "already-set",
            SyncStatus::WillUpdate => "will-update",
            SyncStatus::Updated => "updated",
            SyncStatus::NoNumberFound => "no-number-found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRow {
    pub episode_id: i64,
    pub title: String,
    pub current: Option<String>,
    pub detected: Option<i64>,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub applied: bool,
    pub rows: Vec<SyncRow>,
}

impl SyncReport {
    pub fn count(&self, status: SyncStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Scan every episode; with `apply` write detected numbers, otherwise preview.
pub fn sync_episode_numbers(catalog: &EpisodeCatalog<'_>, apply: bool) -> Result<SyncReport> {
    let store = catalog.store();
    let field = &catalog.fields().episode_number;
    let mut report = SyncReport {
        applied: apply,
        rows: Vec::new(),
    };

    for record in store.list_episodes()? {
        let current = store.get_meta(record.id, field)?;
        let detected = extract_episode_number(&record.title);

        let status = match detected {
            None => SyncStatus::NoNumberFound,
            Some(n) if current.as_deref().and_then(parse_episode_number) == Some(n) => SyncStatus::AlreadySet,
            Some(n) if apply => {
                store.set_meta(record.id, field, &n.to_string())?;
                log::info!("Episode {} '{}': {} set to {}", record.id, record.title, field, n);
                SyncStatus::Updated
            }
            Some(_) => SyncStatus::WillUpdate,
        };

        report.rows.push(SyncRow {
            episode_id: record.id,
            title: record.title,
            current,
            detected,
            status,
        });
    }

    Ok(report)
}
