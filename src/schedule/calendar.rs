//! Rule-based calendar schedules: a default day, optional design days and
//! date/weekday-scoped override rules.
//!
//! Each day profile is an ordered list of "until" breakpoints: a value holds
//! from the previous breakpoint up to and including its own time. The last
//! breakpoint of every profile sits at 24:00.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::schedule::window::{MINUTES_PER_DAY, TimeOfDay, steps_per_hour};

/// Year used to validate month/day pairs; a leap year so 02/29 is accepted.
const REFERENCE_LEAP_YEAR: i32 = 2000;

/// Value in effect until a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakpoint {
    pub until: TimeOfDay,
    pub value: f64,
}

/// A named day profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayProfile {
    pub name: String,
    breakpoints: Vec<Breakpoint>,
}

impl DayProfile {
    /// Builds a profile from `(fractional hour, value)` pairs.
    ///
    /// Pairs may come in any order. When two pairs decompose to the same
    /// time, the later one wins.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidBreakpoint`] for a time that does not
    /// decompose into 00:00-24:00 and [`ScheduleError::IncompleteProfile`]
    /// when no pair sits at 24:00.
    pub fn from_hours(name: impl Into<String>, pairs: &[(f64, f64)]) -> Result<Self> {
        let name = name.into();
        let mut breakpoints: Vec<Breakpoint> = Vec::with_capacity(pairs.len());
        for &(hours, value) in pairs {
            let until = TimeOfDay::from_hours(hours)?;
            match breakpoints.iter_mut().find(|b| b.until == until) {
                Some(existing) => existing.value = value,
                None => breakpoints.push(Breakpoint { until, value }),
            }
        }
        breakpoints.sort_by_key(|b| b.until);

        if breakpoints.last().map(|b| b.until) != Some(TimeOfDay::END_OF_DAY) {
            return Err(ScheduleError::IncompleteProfile(name));
        }
        Ok(Self { name, breakpoints })
    }

    /// A profile holding `value` all day.
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            breakpoints: vec![Breakpoint {
                until: TimeOfDay::END_OF_DAY,
                value,
            }],
        }
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Value attached to the smallest breakpoint at or after `time`.
    pub fn value_at(&self, time: TimeOfDay) -> f64 {
        self.breakpoints
            .iter()
            .find(|b| b.until >= time)
            .map_or_else(|| self.last_value(), |b| b.value)
    }

    /// Value in effect for the interval that starts at `start`.
    ///
    /// Differs from [`DayProfile::value_at`] exactly on breakpoint times,
    /// where the next segment's value is returned.
    pub fn value_during(&self, start: TimeOfDay) -> f64 {
        self.breakpoints
            .iter()
            .find(|b| b.until > start)
            .map_or_else(|| self.last_value(), |b| b.value)
    }

    /// One value per minute of the day, each taken from
    /// [`DayProfile::value_during`].
    pub fn to_minute_series(&self) -> Vec<f64> {
        let mut series = Vec::with_capacity(usize::from(MINUTES_PER_DAY));
        let mut breakpoints = self.breakpoints.iter().peekable();
        for minute in 0..MINUTES_PER_DAY {
            while breakpoints.next_if(|b| b.until.minutes() <= minute).is_some() {}
            series.push(breakpoints.peek().map_or_else(|| self.last_value(), |b| b.value));
        }
        series
    }

    /// Collapses one value per minute back into breakpoints, one per run of
    /// equal values.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::IncompleteProfile`] unless `minutes` covers
    /// the whole day.
    pub fn from_minute_series(name: impl Into<String>, minutes: &[f64]) -> Result<Self> {
        let name = name.into();
        if minutes.len() != usize::from(MINUTES_PER_DAY) {
            return Err(ScheduleError::IncompleteProfile(name));
        }
        let mut breakpoints = Vec::new();
        for (i, &value) in minutes.iter().enumerate() {
            let run_ends = minutes.get(i + 1).is_none_or(|&next| next != value);
            if run_ends {
                let end = i + 1;
                let until = TimeOfDay::from_hm((end / 60) as u32, (end % 60) as u32)?;
                breakpoints.push(Breakpoint { until, value });
            }
        }
        Ok(Self { name, breakpoints })
    }

    fn last_value(&self) -> f64 {
        self.breakpoints.last().map_or(0.0, |b| b.value)
    }
}

/// Inclusive month/day range; a start after the end wraps over New Year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct DateRange {
    start: (u32, u32),
    end: (u32, u32),
}

impl DateRange {
    /// Parses `"MM/DD-MM/DD"`; whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidDateRange`] unless both halves are
    /// valid month/day pairs.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ScheduleError::InvalidDateRange(s.to_string());
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (start, end) = compact.split_once('-').ok_or_else(invalid)?;
        let start = parse_month_day(start).ok_or_else(invalid)?;
        let end = parse_month_day(end).ok_or_else(invalid)?;
        Ok(Self { start, end })
    }

    /// The whole year.
    pub fn all_year() -> Self {
        Self {
            start: (1, 1),
            end: (12, 31),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let key = (date.month(), date.day());
        if self.start <= self.end {
            self.start <= key && key <= self.end
        } else {
            key >= self.start || key <= self.end
        }
    }

    /// Number of calendar days covered, counted on a leap year.
    pub fn len_days(&self) -> u32 {
        let ordinal = |(m, d): (u32, u32)| {
            NaiveDate::from_ymd_opt(REFERENCE_LEAP_YEAR, m, d).map_or(0, |date| date.ordinal())
        };
        let (start, end) = (ordinal(self.start), ordinal(self.end));
        if start <= end {
            end - start + 1
        } else {
            366 - start + end + 1
        }
    }
}

fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (month, day) = s.split_once('/')?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(REFERENCE_LEAP_YEAR, month, day)?;
    Some((month, day))
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}-{:02}/{:02}",
            self.start.0, self.start.1, self.end.0, self.end.1
        )
    }
}

impl From<DateRange> for String {
    fn from(r: DateRange) -> Self {
        r.to_string()
    }
}

/// Set of weekdays a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const WEEKDAYS: Self = Self(0b0001_1111);
    pub const WEEKEND: Self = Self(0b0110_0000);
    pub const ALL: Self = Self(0b0111_1111);

    /// Parses day tokens separated by `/` or `,`, e.g. `"Mon/Tue/Wed"`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidWeekdays`] for an empty list or an
    /// unknown token.
    pub fn parse(s: &str) -> Result<Self> {
        let mut set = Self::default();
        for token in s.split(['/', ',']).map(str::trim) {
            let day: Weekday = token
                .parse()
                .map_err(|_| ScheduleError::InvalidWeekdays(s.to_string()))?;
            set.insert(day);
        }
        if set.is_empty() {
            return Err(ScheduleError::InvalidWeekdays(s.to_string()));
        }
        Ok(set)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn len(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_subset_of(&self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut day = Weekday::Mon;
        let mut names = Vec::new();
        for _ in 0..7 {
            if self.contains(day) {
                names.push(format!("{day}"));
            }
            day = day.succ();
        }
        write!(f, "{}", names.join("/"))
    }
}

impl From<WeekdaySet> for String {
    fn from(set: WeekdaySet) -> Self {
        set.to_string()
    }
}

/// Raw rule description as written in job files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub label: String,
    /// `"MM/DD-MM/DD"`.
    pub season: String,
    /// `"Mon/Tue/Wed/Thu/Fri"` style list.
    pub days: String,
    /// `(fractional hour, value)` pairs.
    pub breakpoints: Vec<(f64, f64)>,
}

impl RuleSpec {
    pub fn new(
        label: impl Into<String>,
        season: impl Into<String>,
        days: impl Into<String>,
        breakpoints: Vec<(f64, f64)>,
    ) -> Self {
        Self {
            label: label.into(),
            season: season.into(),
            days: days.into(),
            breakpoints,
        }
    }
}

/// A dated, weekday-scoped override of the default day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRule {
    pub label: String,
    pub dates: DateRange,
    pub days: WeekdaySet,
    pub profile: DayProfile,
}

impl ScheduleRule {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.dates.contains(date) && self.days.contains(date.weekday())
    }

    /// Number of (date, weekday) combinations the rule can claim.
    pub fn scope(&self) -> u32 {
        self.dates.len_days() * self.days.len()
    }
}

/// Default day, design days and override rules of one schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarRuleSet {
    pub name: String,
    pub default_day: DayProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winter_design_day: Option<DayProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summer_design_day: Option<DayProfile>,
    pub rules: Vec<ScheduleRule>,
}

impl CalendarRuleSet {
    /// Default day plus winter and summer design days, no dated rules.
    ///
    /// # Errors
    ///
    /// Propagates breakpoint errors from [`DayProfile::from_hours`].
    pub fn build_simple(
        name: &str,
        default: &[(f64, f64)],
        winter_design: &[(f64, f64)],
        summer_design: &[(f64, f64)],
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            default_day: DayProfile::from_hours(format!("{name} Schedule Week Day"), default)?,
            winter_design_day: Some(DayProfile::from_hours(
                format!("{name} Winter Design Day"),
                winter_design,
            )?),
            summer_design_day: Some(DayProfile::from_hours(
                format!("{name} Summer Design Day"),
                summer_design,
            )?),
            rules: Vec::new(),
        })
    }

    /// Default day, optional design days and one rule per [`RuleSpec`], in
    /// list order.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidDateRange`] for a bad season,
    /// [`ScheduleError::InvalidWeekdays`] for a bad day list, and
    /// breakpoint errors from [`DayProfile::from_hours`].
    pub fn build_complex(
        name: &str,
        default_label: &str,
        default: &[(f64, f64)],
        winter_design: Option<&[(f64, f64)]>,
        summer_design: Option<&[(f64, f64)]>,
        rules: &[RuleSpec],
    ) -> Result<Self> {
        let winter_design_day = winter_design
            .map(|pairs| DayProfile::from_hours(format!("{name} Winter Design Day"), pairs))
            .transpose()?;
        let summer_design_day = summer_design
            .map(|pairs| DayProfile::from_hours(format!("{name} Summer Design Day"), pairs))
            .transpose()?;

        let rules = rules
            .iter()
            .map(|spec| {
                Ok(ScheduleRule {
                    label: format!("{name} {} Rule", spec.label),
                    dates: DateRange::parse(&spec.season)?,
                    days: WeekdaySet::parse(&spec.days)?,
                    profile: DayProfile::from_hours(
                        format!("{name} {}", spec.label),
                        &spec.breakpoints,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            default_day: DayProfile::from_hours(format!("{name} {default_label}"), default)?,
            winter_design_day,
            summer_design_day,
            rules,
        })
    }

    /// Rule in effect on `date`: the narrowest matching scope, first listed
    /// on ties.
    pub fn active_rule(&self, date: NaiveDate) -> Option<&ScheduleRule> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(date))
            .min_by_key(|rule| rule.scope())
    }

    pub fn active_profile(&self, date: NaiveDate) -> &DayProfile {
        self.active_rule(date)
            .map_or(&self.default_day, |rule| &rule.profile)
    }

    pub fn value_at(&self, date: NaiveDate, time: TimeOfDay) -> f64 {
        self.active_profile(date).value_at(time)
    }

    /// Expands the ruleset into `days * steps_per_day` samples starting at
    /// `first_day`, each sample taking the value in effect at the start of
    /// its step.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidStepsPerDay`] unless `steps_per_day`
    /// is a positive multiple of 24.
    pub fn to_series(
        &self,
        first_day: NaiveDate,
        days: usize,
        steps_per_day: usize,
    ) -> Result<Vec<f64>> {
        steps_per_hour(steps_per_day)?;
        let mut series = Vec::with_capacity(days * steps_per_day);
        for day in 0..days {
            let Some(date) = first_day.checked_add_days(Days::new(day as u64)) else {
                break;
            };
            let profile = self.active_profile(date);
            for step in 0..steps_per_day {
                let minute = step * usize::from(MINUTES_PER_DAY) / steps_per_day;
                let start = TimeOfDay::from_hm((minute / 60) as u32, (minute % 60) as u32)?;
                series.push(profile.value_during(start));
            }
        }
        Ok(series)
    }
}
