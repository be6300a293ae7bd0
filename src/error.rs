//! Error taxonomy shared by the schedule store, shifter and calendar engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("toml serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// A retained table cell is not numeric.
    #[error("schedule value must be numeric for column '{column}' (row {row}, got \"{value}\")")]
    Parse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{0}' appears more than once in the header")]
    DuplicateColumn(String),

    #[error("peak period ({begin} - {end}) must be at least one hour long")]
    InvalidWindow { begin: u32, end: u32 },

    #[error(
        "peak period ({begin} - {end}), plus the delay ({delay}), must be no longer than {max} hours"
    )]
    WindowTooLong {
        begin: u32,
        end: u32,
        delay: u32,
        max: u32,
    },

    #[error("invalid time range \"{0}\" (expected \"HH - HH\")")]
    InvalidTimeRange(String),

    #[error("invalid time of day \"{0}\" (expected \"HH:MM\")")]
    InvalidClockTime(String),

    #[error("steps per day must be a positive multiple of 24, got {0}")]
    InvalidStepsPerDay(usize),

    #[error("invalid date range \"{0}\" (expected \"MM/DD-MM/DD\")")]
    InvalidDateRange(String),

    #[error("invalid breakpoint time {0} (must decompose to whole hour and minute within 0-24h)")]
    InvalidBreakpoint(f64),

    #[error("invalid weekday set \"{0}\" (expected e.g. \"Mon/Tue/Wed\")")]
    InvalidWeekdays(String),

    #[error("day profile '{0}' must end with a breakpoint at 24:00")]
    IncompleteProfile(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
