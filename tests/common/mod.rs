//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use loadflex::schedule::table::ScheduleTable;

/// 15-minute resolution.
pub const STEPS_PER_DAY: usize = 96;

/// Days in the default calendar year (2009).
pub const DAYS: usize = 365;

/// January 1st 2009, a Thursday.
pub fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2009, 1, 1).expect("valid date")
}

/// Step index of `hour` on `day` at 15-minute resolution.
pub fn step(day: usize, hour: usize) -> usize {
    day * STEPS_PER_DAY + hour * (STEPS_PER_DAY / 24)
}

/// A full year of zeros at 15-minute resolution.
pub fn zero_year() -> Vec<f64> {
    vec![0.0; DAYS * STEPS_PER_DAY]
}

/// Writes `columns` as a schedule CSV under `dir` and returns its path.
pub fn write_schedule(dir: &Path, name: &str, columns: Vec<(&str, Vec<f64>)>) -> PathBuf {
    let path = dir.join(name);
    ScheduleTable::from_columns(columns)
        .save(&path)
        .expect("write schedule fixture");
    path
}

/// Reads one column back from a schedule CSV.
pub fn read_column(path: &Path, column: &str) -> Vec<f64> {
    ScheduleTable::load(path)
        .expect("load schedule")
        .column(column)
        .map(<[f64]>::to_vec)
        .expect("column present")
}

pub fn file_text(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}
