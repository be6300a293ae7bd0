//! Hour-of-day windows and time-of-day arithmetic.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::error::{Result, ScheduleError};

/// Minutes in a full day; also the encoding of the 24:00 breakpoint.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Policy cap on peak width plus post-peak delay, in hours.
pub const MAX_SHIFT_SPAN_HOURS: u32 = 12;

/// Half-open window `[begin_hour, end_hour)` measured in hours of day.
///
/// Windows parsed from user input stay within 0-24. Windows derived with
/// [`TimeWindow::delayed`] may run past 24, in which case their step range
/// reaches into the following day's block.
///
/// # Examples
///
/// ```
/// use loadflex::schedule::window::TimeWindow;
///
/// let peak = TimeWindow::parse("15 - 18").unwrap();
/// assert_eq!(peak.width_hours(), 3);
/// assert_eq!(peak.delayed(1), TimeWindow::new(19, 22).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First hour inside the window.
    pub begin_hour: u32,
    /// First hour after the window.
    pub end_hour: u32,
}

impl TimeWindow {
    /// Creates a window spanning `[begin_hour, end_hour)`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidWindow`] when `end_hour <= begin_hour`.
    pub fn new(begin_hour: u32, end_hour: u32) -> Result<Self> {
        if end_hour <= begin_hour {
            return Err(ScheduleError::InvalidWindow {
                begin: begin_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            begin_hour,
            end_hour,
        })
    }

    /// Parses a peak period written as `"HH - HH"`.
    ///
    /// The begin hour may be 0 through 23 and the end hour 1 through 24.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTimeRange`] when the string is not two
    /// whole hours separated by `-` or an hour is out of range, and
    /// [`ScheduleError::InvalidWindow`] when the window is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let (begin, end) = parse_time_range(s)?;
        Self::new(begin, end)
    }

    /// Window length in hours.
    pub fn width_hours(&self) -> u32 {
        self.end_hour - self.begin_hour
    }

    /// Returns the window of equal width starting `delay_hours` after this one ends.
    pub fn delayed(&self, delay_hours: u32) -> Self {
        let begin_hour = self.end_hour + delay_hours;
        Self {
            begin_hour,
            end_hour: begin_hour + self.width_hours(),
        }
    }

    /// Absolute step indices covered by this window on `day`.
    pub fn step_range(&self, day: usize, steps_per_day: usize) -> Range<usize> {
        let steps_per_hour = steps_per_day / 24;
        let start = day * steps_per_day + self.begin_hour as usize * steps_per_hour;
        start..start + self.width_hours() as usize * steps_per_hour
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.begin_hour, self.end_hour)
    }
}

/// Splits `"HH - HH"` into its two hours without checking their order.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidTimeRange`] on malformed input or hours above 24.
pub fn parse_time_range(s: &str) -> Result<(u32, u32)> {
    let invalid = || ScheduleError::InvalidTimeRange(s.to_string());
    let parts: Vec<&str> = s.split('-').map(str::trim).collect();
    let [begin, end] = parts.as_slice() else {
        return Err(invalid());
    };
    let begin: u32 = begin.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;
    if begin > 23 || end > 24 {
        return Err(invalid());
    }
    Ok((begin, end))
}

/// Number of steps per hour for a day resolution.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidStepsPerDay`] unless `steps_per_day` is a
/// positive multiple of 24.
pub fn steps_per_hour(steps_per_day: usize) -> Result<usize> {
    if steps_per_day == 0 || steps_per_day % 24 != 0 {
        return Err(ScheduleError::InvalidStepsPerDay(steps_per_day));
    }
    Ok(steps_per_day / 24)
}

/// A time of day with minute resolution, from 00:00 through 24:00 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { minutes: 0 };
    pub const END_OF_DAY: Self = Self {
        minutes: MINUTES_PER_DAY,
    };

    /// Builds a time from whole hours and minutes.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidBreakpoint`] when `minute > 59`,
    /// `hour > 24`, or `hour == 24` with a non-zero minute.
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self> {
        if minute > 59 || hour > 24 || (hour == 24 && minute != 0) {
            return Err(ScheduleError::InvalidBreakpoint(
                f64::from(hour) + f64::from(minute) / 60.0,
            ));
        }
        Ok(Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    /// Decomposes a fractional hour such as `13.5` into 13:30.
    ///
    /// `hour = floor(h)`, `minute = round((h - hour) * 60)`; a minute that
    /// rounds up to 60 carries into the hour.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidBreakpoint`] for negative or
    /// non-finite input and for anything past 24:00.
    pub fn from_hours(h: f64) -> Result<Self> {
        if !h.is_finite() || h < 0.0 {
            return Err(ScheduleError::InvalidBreakpoint(h));
        }
        let hour = h.floor();
        let minute = ((h - hour) * 60.0).round();
        let (hour, minute) = if minute >= 60.0 {
            (hour + 1.0, 0.0)
        } else {
            (hour, minute)
        };
        if hour > 24.0 {
            return Err(ScheduleError::InvalidBreakpoint(h));
        }
        Self::from_hm(hour as u32, minute as u32).map_err(|_| ScheduleError::InvalidBreakpoint(h))
    }

    /// Parses `"HH:MM"`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidClockTime`] on malformed input and
    /// [`ScheduleError::InvalidBreakpoint`] for times past 24:00.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ScheduleError::InvalidClockTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
        let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
        if minute > 59 {
            return Err(invalid());
        }
        Self::from_hm(hour, minute)
    }

    pub fn minutes(&self) -> u16 {
        self.minutes
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minutes / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minutes % 60)
    }

    /// Fractional hours since midnight.
    pub fn hours(&self) -> f64 {
        f64::from(self.minutes) / 60.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}
