//! Daemon - recurring unlock trigger
//!
//! The daemon is the long-running process that:
//! - Sleeps until the earliest enabled anchor time
//! - Runs the Schedule Runner once (non-preview, non-force)
//! - Re-plans after every fire and whenever nothing is enabled

pub mod tick;

pub use tick::*;
