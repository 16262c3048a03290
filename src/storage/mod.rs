//! Storage layer for unlockr.
//!
//! Capability traits for the content store and schedule store, and a
//! SQLite-backed implementation of both.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{ContentStore, EpisodeRecord, ScheduleStore, slugify};
