//! SQLite-backed content and schedule store.
//!
//! One database holds series, episodes, taxonomy terms, per-episode metadata,
//! custom fields, an `options` key/value table (the schedule list lives there
//! as a single JSON value) and the advisory `locks` table.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{ContentStore, EpisodeRecord, ScheduleStore, slugify};
use crate::domain::{Series, Term, UnlockSchedule};
use crate::error::{Result, UnlockError};

/// Options key holding the serialized schedule list
const SCHEDULES_OPTION: &str = "unlock_schedules";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite store. `Connection` isn't Sync, so it sits behind a Mutex.
pub struct SqliteStore {
    db: Mutex<Connection>,
    custom_fields: bool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("custom_fields", &self.custom_fields)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path)?;
        Self::from_connection(db)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        Self::init_schema(&db)?;
        Ok(Self {
            db: Mutex::new(db),
            custom_fields: true,
        })
    }

    /// Enable or disable the custom-field capability.
    pub fn with_custom_fields(mut self, enabled: bool) -> Self {
        self.custom_fields = enabled;
        self
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS series (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS terms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                taxonomy TEXT NOT NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL,
                UNIQUE (taxonomy, slug)
            );

            CREATE TABLE IF NOT EXISTS episode_terms (
                episode_id INTEGER NOT NULL,
                term_id INTEGER NOT NULL,
                PRIMARY KEY (episode_id, term_id)
            );

            CREATE TABLE IF NOT EXISTS episode_meta (
                episode_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (episode_id, key)
            );

            CREATE INDEX IF NOT EXISTS idx_episode_meta_key ON episode_meta(key, value);

            CREATE TABLE IF NOT EXISTS custom_fields (
                episode_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (episode_id, field)
            );

            CREATE TABLE IF NOT EXISTS options (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS locks (
                name TEXT PRIMARY KEY,
                acquired_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|e| UnlockError::Storage(e.to_string()))
    }

    /// Add a series, returning its ID.
    pub fn insert_series(&self, title: &str) -> Result<i64> {
        let db = self.conn()?;
        db.execute("INSERT INTO series (title) VALUES (?1)", [title])?;
        Ok(db.last_insert_rowid())
    }

    /// Add an episode, returning its ID.
    pub fn insert_episode(&self, title: &str, content: &str) -> Result<i64> {
        let db = self.conn()?;
        db.execute("INSERT INTO episodes (title, content) VALUES (?1, ?2)", params![title, content])?;
        Ok(db.last_insert_rowid())
    }

    /// Store a schedule list without validating it.
    #[cfg(test)]
    pub(crate) fn write_raw_schedules(&self, json: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO options (key, value) VALUES (?1, ?2)",
            params![SCHEDULES_OPTION, json],
        )?;
        Ok(())
    }

    fn episode_rows<P: rusqlite::Params>(db: &Connection, sql: &str, params: P) -> Result<Vec<EpisodeRecord>> {
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(EpisodeRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn term_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Term> {
        Ok(Term {
            id: row.get(0)?,
            taxonomy: row.get(1)?,
            name: row.get(2)?,
            slug: row.get(3)?,
        })
    }
}

impl ContentStore for SqliteStore {
    fn get_series(&self, id: i64) -> Result<Option<Series>> {
        let db = self.conn()?;
        let series = db
            .query_row("SELECT id, title FROM series WHERE id = ?1", [id], |row| {
                Ok(Series::new(row.get(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;
        Ok(series)
    }

    fn list_series(&self) -> Result<Vec<Series>> {
        let db = self.conn()?;
        let mut stmt = db.prepare("SELECT id, title FROM series ORDER BY title")?;
        let rows = stmt.query_map([], |row| Ok(Series::new(row.get(0)?, row.get::<_, String>(1)?)))?;

        let mut series = Vec::new();
        for row in rows {
            series.push(row?);
        }
        Ok(series)
    }

    fn get_episode(&self, id: i64) -> Result<Option<EpisodeRecord>> {
        let db = self.conn()?;
        Ok(Self::episode_rows(&db, "SELECT id, title, content FROM episodes WHERE id = ?1", [id])?
            .into_iter()
            .next())
    }

    fn list_episodes(&self) -> Result<Vec<EpisodeRecord>> {
        let db = self.conn()?;
        Self::episode_rows(&db, "SELECT id, title, content FROM episodes ORDER BY id DESC", [])
    }

    fn episodes_with_term(&self, taxonomy: &str, slug: &str) -> Result<Vec<EpisodeRecord>> {
        let db = self.conn()?;
        Self::episode_rows(
            &db,
            r#"
            SELECT e.id, e.title, e.content
            FROM episodes e
            JOIN episode_terms et ON et.episode_id = e.id
            JOIN terms t ON t.id = et.term_id
            WHERE t.taxonomy = ?1 AND t.slug = ?2
            ORDER BY e.id
            "#,
            params![taxonomy, slug],
        )
    }

    fn episodes_by_meta(&self, key: &str, value: &str) -> Result<Vec<EpisodeRecord>> {
        let db = self.conn()?;
        Self::episode_rows(
            &db,
            r#"
            SELECT e.id, e.title, e.content
            FROM episodes e
            JOIN episode_meta m ON m.episode_id = e.id
            WHERE m.key = ?1 AND m.value = ?2
            ORDER BY e.id
            "#,
            params![key, value],
        )
    }

    fn search_episodes(&self, text: &str, limit: usize) -> Result<Vec<EpisodeRecord>> {
        let db = self.conn()?;
        let pattern = format!("%{}%", text);
        Self::episode_rows(
            &db,
            r#"
            SELECT id, title, content FROM episodes
            WHERE title LIKE ?1 OR content LIKE ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
            params![pattern, limit as i64],
        )
    }

    fn term_by_name(&self, taxonomy: &str, name: &str) -> Result<Option<Term>> {
        let db = self.conn()?;
        let term = db
            .query_row(
                "SELECT id, taxonomy, name, slug FROM terms WHERE taxonomy = ?1 AND name = ?2",
                params![taxonomy, name],
                Self::term_row,
            )
            .optional()?;
        Ok(term)
    }

    fn term_by_slug(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
        let db = self.conn()?;
        let term = db
            .query_row(
                "SELECT id, taxonomy, name, slug FROM terms WHERE taxonomy = ?1 AND slug = ?2",
                params![taxonomy, slug],
                Self::term_row,
            )
            .optional()?;
        Ok(term)
    }

    fn insert_term(&self, taxonomy: &str, name: &str) -> Result<Term> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(UnlockError::Storage(format!("cannot derive a slug from term name '{}'", name)));
        }
        let db = self.conn()?;
        db.execute(
            "INSERT INTO terms (taxonomy, name, slug) VALUES (?1, ?2, ?3)",
            params![taxonomy, name, slug],
        )?;
        Ok(Term {
            id: db.last_insert_rowid(),
            taxonomy: taxonomy.to_string(),
            name: name.to_string(),
            slug,
        })
    }

    fn episode_terms(&self, episode_id: i64, taxonomy: &str) -> Result<Vec<Term>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            r#"
            SELECT t.id, t.taxonomy, t.name, t.slug
            FROM terms t
            JOIN episode_terms et ON et.term_id = t.id
            WHERE et.episode_id = ?1 AND t.taxonomy = ?2
            ORDER BY t.id
            "#,
        )?;
        let rows = stmt.query_map(params![episode_id, taxonomy], Self::term_row)?;

        let mut terms = Vec::new();
        for row in rows {
            terms.push(row?);
        }
        Ok(terms)
    }

    fn set_episode_terms(&self, episode_id: i64, taxonomy: &str, term_ids: &[i64]) -> Result<()> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        tx.execute(
            r#"
            DELETE FROM episode_terms
            WHERE episode_id = ?1
              AND term_id IN (SELECT id FROM terms WHERE taxonomy = ?2)
            "#,
            params![episode_id, taxonomy],
        )?;
        for term_id in term_ids {
            tx.execute(
                "INSERT OR IGNORE INTO episode_terms (episode_id, term_id) VALUES (?1, ?2)",
                params![episode_id, term_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_meta(&self, episode_id: i64, key: &str) -> Result<Option<String>> {
        let db = self.conn()?;
        let value = db
            .query_row(
                "SELECT value FROM episode_meta WHERE episode_id = ?1 AND key = ?2",
                params![episode_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_meta(&self, episode_id: i64, key: &str, value: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO episode_meta (episode_id, key, value) VALUES (?1, ?2, ?3)",
            params![episode_id, key, value],
        )?;
        Ok(())
    }

    fn delete_meta(&self, episode_id: i64, key: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "DELETE FROM episode_meta WHERE episode_id = ?1 AND key = ?2",
            params![episode_id, key],
        )?;
        Ok(())
    }

    fn supports_custom_fields(&self) -> bool {
        self.custom_fields
    }

    fn get_custom_field(&self, episode_id: i64, field: &str) -> Result<Option<String>> {
        let db = self.conn()?;
        let value = db
            .query_row(
                "SELECT value FROM custom_fields WHERE episode_id = ?1 AND field = ?2",
                params![episode_id, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_custom_field(&self, episode_id: i64, field: &str, value: &str) -> Result<()> {
        if !self.custom_fields {
            return Err(UnlockError::ConfigMissing("custom field store is not enabled".to_string()));
        }
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO custom_fields (episode_id, field, value) VALUES (?1, ?2, ?3)",
            params![episode_id, field, value],
        )?;
        Ok(())
    }
}

impl ScheduleStore for SqliteStore {
    fn load_schedules(&self) -> Result<Vec<UnlockSchedule>> {
        let json: Option<String> = {
            let db = self.conn()?;
            let value = db
                .query_row("SELECT value FROM options WHERE key = ?1", [SCHEDULES_OPTION], |row| {
                    row.get(0)
                })
                .optional()?;
            value
        };

        let Some(json) = json else {
            return Ok(Vec::new());
        };

        let schedules: Vec<UnlockSchedule> = serde_json::from_str(&json)?;
        for (index, schedule) in schedules.iter().enumerate() {
            schedule
                .validate()
                .map_err(|e| UnlockError::InvalidSchedule(format!("schedule #{}: {}", index + 1, e)))?;
        }
        Ok(schedules)
    }

    fn save_schedules(&self, schedules: &[UnlockSchedule]) -> Result<()> {
        for schedule in schedules {
            schedule.validate()?;
        }
        let json = serde_json::to_string(schedules)?;
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO options (key, value) VALUES (?1, ?2)",
            params![SCHEDULES_OPTION, json],
        )?;
        Ok(())
    }

    fn try_acquire_lock(&self, name: &str, now: NaiveDateTime, stale_after: Duration) -> Result<bool> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let held_since: Option<String> = tx
            .query_row("SELECT acquired_at FROM locks WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;

        if let Some(held_since) = held_since {
            let stale = match NaiveDateTime::parse_from_str(&held_since, TIMESTAMP_FORMAT) {
                // A holder stamped in the future means the clock moved back.
                Ok(since) => now
                    .signed_duration_since(since)
                    .to_std()
                    .map(|age| age >= stale_after)
                    .unwrap_or(true),
                Err(_) => true,
            };
            if !stale {
                log::debug!("Lock '{}' held since {}", name, held_since);
                return Ok(false);
            }
            log::warn!("Taking over stale lock '{}' (held since {})", name, held_since);
        }

        tx.execute(
            "INSERT OR REPLACE INTO locks (name, acquired_at) VALUES (?1, ?2)",
            params![name, now.format(TIMESTAMP_FORMAT).to_string()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn release_lock(&self, name: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute("DELETE FROM locks WHERE name = ?1", [name])?;
        Ok(())
    }
}
