//! Unlock scheduling
//!
//! - `due`: Due-Date Calculator
//! - `runner`: Schedule Runner state machine
//! - `report`: per-schedule report rows
//! - `trigger`: daily recurring trigger time
//! - `admin`: add/remove/enable/reset over the stored list
//! - `lock`: advisory run lock guarding schedule-list writes

pub mod admin;
pub mod due;
pub mod lock;
pub mod report;
pub mod runner;
pub mod trigger;

pub use admin::ScheduleAdmin;
pub use due::{bootstrap_due, compute_next_due, countdown, is_weekend};
pub use lock::RunLock;
pub use report::{ReportRow, RowStatus, RunReport};
pub use runner::{RunOptions, ScheduleRunner};
pub use trigger::{earliest_anchor, next_fire, next_trigger};

use chrono::{Local, NaiveDateTime};

/// Current local wall-clock time; all schedule times are local
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
