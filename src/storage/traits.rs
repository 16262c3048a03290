//! Storage capability traits.
//!
//! The engine never assumes a storage engine: it talks to the content store
//! and the schedule store through these traits only.

use chrono::NaiveDateTime;
use std::time::Duration;

use crate::domain::{Series, Term, UnlockSchedule};
use crate::error::Result;

/// Raw episode row as held by the content store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
}

/// Query and mutation surface of the content store.
pub trait ContentStore: Send + Sync {
    /// Get a series by ID.
    fn get_series(&self, id: i64) -> Result<Option<Series>>;

    /// List all series ordered by title.
    fn list_series(&self) -> Result<Vec<Series>>;

    /// Get an episode by ID.
    fn get_episode(&self, id: i64) -> Result<Option<EpisodeRecord>>;

    /// List all episodes.
    fn list_episodes(&self) -> Result<Vec<EpisodeRecord>>;

    /// Episodes carrying the term with `slug` in `taxonomy`.
    fn episodes_with_term(&self, taxonomy: &str, slug: &str) -> Result<Vec<EpisodeRecord>>;

    /// Episodes whose metadata `key` equals `value`.
    fn episodes_by_meta(&self, key: &str, value: &str) -> Result<Vec<EpisodeRecord>>;

    /// Full-text search over title and content.
    fn search_episodes(&self, text: &str, limit: usize) -> Result<Vec<EpisodeRecord>>;

    fn term_by_name(&self, taxonomy: &str, name: &str) -> Result<Option<Term>>;

    fn term_by_slug(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>>;

    /// Create a term; the slug is derived from the name.
    fn insert_term(&self, taxonomy: &str, name: &str) -> Result<Term>;

    fn episode_terms(&self, episode_id: i64, taxonomy: &str) -> Result<Vec<Term>>;

    /// Replace the episode's terms in `taxonomy` with `term_ids`.
    fn set_episode_terms(&self, episode_id: i64, taxonomy: &str, term_ids: &[i64]) -> Result<()>;

    fn get_meta(&self, episode_id: i64, key: &str) -> Result<Option<String>>;

    fn set_meta(&self, episode_id: i64, key: &str, value: &str) -> Result<()>;

    fn delete_meta(&self, episode_id: i64, key: &str) -> Result<()>;

    /// Whether the custom structured-field store is present.
    fn supports_custom_fields(&self) -> bool;

    fn get_custom_field(&self, episode_id: i64, field: &str) -> Result<Option<String>>;

    fn set_custom_field(&self, episode_id: i64, field: &str, value: &str) -> Result<()>;
}

/// Whole-list schedule persistence plus the run lock.
pub trait ScheduleStore: Send + Sync {
    /// Load the ordered schedule list (empty if never saved).
    fn load_schedules(&self) -> Result<Vec<UnlockSchedule>>;

    /// Replace the stored schedule list.
    fn save_schedules(&self, schedules: &[UnlockSchedule]) -> Result<()>;

    /// Take the advisory lock `name`. Returns false if another holder has it
    /// and it is younger than `stale_after`.
    fn try_acquire_lock(&self, name: &str, now: NaiveDateTime, stale_after: Duration) -> Result<bool>;

    fn release_lock(&self, name: &str) -> Result<()>;
}

/// Derive a term slug from its display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
