//! Domain types for unlockr
//!
//! - Episode / Series / Term: content-store views
//! - AccessTier: free, advance or unknown
//! - UnlockSchedule / AnchorTime: per-series recurrence rules
//! - Intent: validated command request

pub mod episode;
pub mod intent;
pub mod schedule;

pub use episode::{AccessTier, Episode, Series, Term};
pub use intent::{Confidence, Intent};
pub use schedule::{AnchorTime, MAX_INTERVAL_DAYS, UnlockSchedule};
