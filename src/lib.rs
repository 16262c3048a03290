//! Unlockr - scheduled access-tier unlocks for serialized episodes
//!
//! Unlockr decides, per series, when the next patron-only episode becomes
//! free, and applies access changes consistently across the content store
//! and the subscription platform.

pub mod access;
pub mod catalog;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod interpret;
pub mod platform;
pub mod schedule;
pub mod storage;

pub use error::{Result, UnlockError};
