//! Peak-period load shifting and rule-based calendar schedules for building
//! energy models.

pub mod cli;
/// TOML job configuration and presets.
pub mod config;
pub mod error;
pub mod host;
pub mod runner;
/// Schedule tables, shifting, calendars and storage control schedules.
pub mod schedule;

pub use error::{Result, ScheduleError};
