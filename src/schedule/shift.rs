//! Peak-window load shifting with stacking prevention.
//!
//! Each weekday, the samples inside the peak window are moved into a window
//! of equal width that starts `delay_hours` after the peak ends. A day is left
//! alone when the destination already holds load, so running the shift twice
//! never sums load on top of itself.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{Result, ScheduleError};
use crate::schedule::calendar::{CalendarRuleSet, DayProfile, WeekdaySet};
use crate::schedule::diagnostics::{Diagnostic, DiagnosticKind};
use crate::schedule::table::ScheduleTable;
use crate::schedule::window::{MAX_SHIFT_SPAN_HOURS, MINUTES_PER_DAY, TimeWindow, steps_per_hour};

/// Peak window, post-peak delay and the columns the shift applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftSpec {
    pub peak: TimeWindow,
    pub delay_hours: u32,
    pub columns: Vec<String>,
}

impl ShiftSpec {
    pub fn new(peak: TimeWindow, delay_hours: u32, columns: Vec<String>) -> Self {
        Self {
            peak,
            delay_hours,
            columns,
        }
    }

    /// Builds a shift from a `"HH - HH"` peak period and validates it.
    ///
    /// # Errors
    ///
    /// Propagates parse errors from [`TimeWindow::parse`] and the span check
    /// of [`ShiftSpec::validate`].
    pub fn parse(peak_period: &str, delay_hours: u32, columns: Vec<String>) -> Result<Self> {
        let spec = Self::new(TimeWindow::parse(peak_period)?, delay_hours, columns);
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the peak window is non-empty and that its width plus the delay
    /// stays within [`MAX_SHIFT_SPAN_HOURS`].
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidWindow`] or [`ScheduleError::WindowTooLong`].
    pub fn validate(&self) -> Result<()> {
        let TimeWindow {
            begin_hour: begin,
            end_hour: end,
        } = self.peak;
        if end <= begin {
            return Err(ScheduleError::InvalidWindow { begin, end });
        }
        if (end - begin) + self.delay_hours > MAX_SHIFT_SPAN_HOURS {
            return Err(ScheduleError::WindowTooLong {
                begin,
                end,
                delay: self.delay_hours,
                max: MAX_SHIFT_SPAN_HOURS,
            });
        }
        Ok(())
    }

    /// Window the peak load is moved into.
    pub fn destination(&self) -> TimeWindow {
        self.peak.delayed(self.delay_hours)
    }

    pub fn is_enabled(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// What happened to one (column, day) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    Shifted,
    /// Destination already held load.
    Stacked,
    /// A window runs past the end of the series.
    OutOfRange,
}

/// Per-column day counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnShiftSummary {
    pub shifted: usize,
    pub unshifted: usize,
    pub out_of_range: usize,
    pub weekend: usize,
}

/// Result of [`shift`]: per-column counts plus diagnostics for the caller.
#[derive(Debug, Clone, Default)]
pub struct ShiftReport {
    pub columns: IndexMap<String, ColumnShiftSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ShiftReport {
    pub fn summary(&self, column: &str) -> Option<&ColumnShiftSummary> {
        self.columns.get(column)
    }

    /// Days skipped to prevent stacking for `column` (0 if untouched).
    pub fn unshifted(&self, column: &str) -> usize {
        self.summary(column).map_or(0, |s| s.unshifted)
    }

    pub fn total_shifted(&self) -> usize {
        self.columns.values().map(|s| s.shifted).sum()
    }
}

/// Moves each weekday's peak-window samples into the delayed window.
///
/// Columns listed in `spec` but absent from `table` are ignored. Weekend
/// days (Saturday and Sunday, relative to `first_day`) are skipped without
/// being counted as shifted or unshifted.
///
/// # Arguments
///
/// * `table` - Schedules to shift in place
/// * `spec` - Peak window, delay, and enabled columns
/// * `total_days` - Number of days to process from the start of each column
/// * `first_day` - Calendar date of day index 0
/// * `steps_per_day` - Samples per day (a positive multiple of 24)
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidWindow`], [`ScheduleError::WindowTooLong`]
/// or [`ScheduleError::InvalidStepsPerDay`] before touching the table.
pub fn shift(
    table: &mut ScheduleTable,
    spec: &ShiftSpec,
    total_days: usize,
    first_day: NaiveDate,
    steps_per_day: usize,
) -> Result<ShiftReport> {
    spec.validate()?;
    steps_per_hour(steps_per_day)?;

    let peak = spec.peak;
    let dest = spec.destination();
    let mut report = ShiftReport::default();

    for name in &spec.columns {
        if report.columns.contains_key(name) {
            continue;
        }
        let Some(values) = table.column_mut(name) else {
            continue;
        };

        let mut summary = ColumnShiftSummary::default();
        let mut first_out_of_range = None;
        for day in 0..total_days {
            let Some(date) = first_day.checked_add_days(Days::new(day as u64)) else {
                break;
            };
            if is_weekend(date) {
                summary.weekend += 1;
                continue;
            }

            match shift_day(values, day, peak, dest, steps_per_day) {
                DayOutcome::Shifted => summary.shifted += 1,
                DayOutcome::Stacked => {
                    debug!(column = %name, day, "destination window holds load; day not shifted");
                    summary.unshifted += 1;
                }
                DayOutcome::OutOfRange => {
                    summary.out_of_range += 1;
                    first_out_of_range.get_or_insert(day);
                }
            }
        }

        if let Some(first) = first_out_of_range {
            report.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::OutOfRange,
                column: Some(name.clone()),
                day: Some(first),
                message: format!(
                    "{} days of the '{name}' schedule, starting with day {first}, were not \
                     shifted because the shifted window ({dest}) runs past the end of the \
                     schedule.",
                    summary.out_of_range
                ),
            });
        }

        if summary.unshifted > 0 {
            let message = format!(
                "To prevent stacking, {} days were not shifted for the '{name}' schedule.",
                summary.unshifted
            );
            info!("{message}");
            report.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::Stacking,
                column: Some(name.clone()),
                day: None,
                message,
            });
        }
        report.columns.insert(name.clone(), summary);
    }

    Ok(report)
}

/// Shifts a single day of one series.
///
/// `peak` and `dest` are hour windows relative to the start of `day`;
/// `dest` may run past hour 24 into the next day's block.
pub fn shift_day(
    values: &mut [f64],
    day: usize,
    peak: TimeWindow,
    dest: TimeWindow,
    steps_per_day: usize,
) -> DayOutcome {
    let peak_ix = peak.step_range(day, steps_per_day);
    let dest_ix = dest.step_range(day, steps_per_day);

    if peak_ix.end > values.len() || dest_ix.end > values.len() {
        return DayOutcome::OutOfRange;
    }
    if values[dest_ix.clone()].iter().any(|&v| v > 0.0) {
        return DayOutcome::Stacked;
    }

    values.copy_within(peak_ix.clone(), dest_ix.start);
    values[peak_ix].fill(0.0);
    DayOutcome::Shifted
}

/// Day-profile counts for one shifted ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RulesetShiftSummary {
    pub shifted: usize,
    /// Profiles whose destination window already held a non-zero value.
    pub unshifted: usize,
    /// Rules that only apply on Saturday and Sunday.
    pub weekend_only: usize,
}

/// Moves a day profile's peak-window values into the delayed window.
///
/// The profile is expanded to one sample per minute. A destination that runs
/// past 24:00 wraps onto the start of the same profile, since the profile
/// repeats on every day it applies to. The collision check sees the wrapped
/// values too. Only [`DayOutcome::Shifted`] and [`DayOutcome::Stacked`] can
/// be returned; a stacked profile comes back unchanged.
///
/// # Errors
///
/// Returns the validation errors of [`ShiftSpec::validate`].
pub fn shift_profile(profile: &DayProfile, spec: &ShiftSpec) -> Result<(DayProfile, DayOutcome)> {
    spec.validate()?;
    let minutes = usize::from(MINUTES_PER_DAY);
    let day = profile.to_minute_series();
    let mut values = [day.as_slice(), day.as_slice()].concat();

    let dest = spec.destination();
    let outcome = shift_day(&mut values, 0, spec.peak, dest, minutes);
    if outcome != DayOutcome::Shifted {
        return Ok((profile.clone(), outcome));
    }

    let (today, tomorrow) = values.split_at(minutes);
    let mut shifted = today.to_vec();
    for i in dest.step_range(0, minutes).filter(|&i| i >= minutes) {
        shifted[i - minutes] = tomorrow[i - minutes];
    }
    Ok((DayProfile::from_minute_series(profile.name.clone(), &shifted)?, outcome))
}

/// Shifts the default day and every rule that applies on at least one
/// weekday. Design days and weekend-only rules are kept as they are.
///
/// # Errors
///
/// Returns the validation errors of [`ShiftSpec::validate`].
pub fn shift_ruleset(
    ruleset: &CalendarRuleSet,
    spec: &ShiftSpec,
) -> Result<(CalendarRuleSet, RulesetShiftSummary)> {
    spec.validate()?;
    let mut shifted = ruleset.clone();
    let mut summary = RulesetShiftSummary::default();

    shift_profile_in_place(&mut shifted.default_day, spec, &mut summary)?;
    for rule in &mut shifted.rules {
        if rule.days.is_subset_of(WeekdaySet::WEEKEND) {
            summary.weekend_only += 1;
            continue;
        }
        shift_profile_in_place(&mut rule.profile, spec, &mut summary)?;
    }
    Ok((shifted, summary))
}

fn shift_profile_in_place(
    profile: &mut DayProfile,
    spec: &ShiftSpec,
    summary: &mut RulesetShiftSummary,
) -> Result<()> {
    let (next, outcome) = shift_profile(profile, spec)?;
    match outcome {
        DayOutcome::Shifted => summary.shifted += 1,
        _ => summary.unshifted += 1,
    }
    *profile = next;
    Ok(())
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2009-01-05 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2009, 1, 5).expect("valid date")
    }

    fn spec(begin: u32, end: u32, delay: u32, columns: &[&str]) -> ShiftSpec {
        ShiftSpec::new(
            TimeWindow::new(begin, end).expect("valid window"),
            delay,
            columns.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[test]
    fn validation_boundaries() {
        assert!(spec(15, 18, 0, &[]).validate().is_ok());
        assert!(spec(10, 20, 2, &[]).validate().is_ok());
        assert!(matches!(
            spec(10, 20, 3, &[]).validate(),
            Err(ScheduleError::WindowTooLong { delay: 3, .. })
        ));
        let empty = ShiftSpec::new(
            TimeWindow {
                begin_hour: 12,
                end_hour: 12,
            },
            0,
            vec![],
        );
        assert!(matches!(
            empty.validate(),
            Err(ScheduleError::InvalidWindow { .. })
        ));
        assert!(matches!(
            ShiftSpec::parse("12 - 12", 0, vec![]),
            Err(ScheduleError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn single_day_move_hourly() {
        let mut values = vec![0.0; 24];
        values[15] = 1.0;
        values[16] = 2.0;
        values[17] = 3.0;
        let s = spec(15, 18, 0, &[]);
        let outcome = shift_day(&mut values, 0, s.peak, s.destination(), 24);
        assert_eq!(outcome, DayOutcome::Shifted);
        assert_eq!(&values[15..18], &[0.0, 0.0, 0.0]);
        assert_eq!(&values[18..21], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn adjacent_destination_still_checks_collision() {
        let mut values = vec![0.0; 24];
        values[16] = 1.0;
        values[18] = 0.5;
        let s = spec(15, 18, 0, &[]);
        let before = values.clone();
        let outcome = shift_day(&mut values, 0, s.peak, s.destination(), 24);
        assert_eq!(outcome, DayOutcome::Stacked);
        assert_eq!(values, before);
    }

    #[test]
    fn negative_destination_values_do_not_block() {
        let mut values = vec![0.0; 24];
        values[16] = 1.0;
        values[19] = -0.5;
        let s = spec(15, 18, 1, &[]);
        let outcome = shift_day(&mut values, 0, s.peak, s.destination(), 24);
        assert_eq!(outcome, DayOutcome::Shifted);
        assert_eq!(values[20], 1.0);
    }

    #[test]
    fn destination_past_end_is_out_of_range() {
        let mut values = vec![1.0; 24];
        let s = spec(20, 24, 2, &[]);
        let outcome = shift_day(&mut values, 0, s.peak, s.destination(), 24);
        assert_eq!(outcome, DayOutcome::OutOfRange);
        assert!(values.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn destination_crossing_midnight_uses_next_day_block() {
        let mut values = vec![0.0; 48];
        values[22] = 4.0;
        let s = spec(20, 24, 2, &[]);
        let outcome = shift_day(&mut values, 0, s.peak, s.destination(), 24);
        assert_eq!(outcome, DayOutcome::Shifted);
        assert_eq!(values[22], 0.0);
        // hour 26 of day 0 is hour 2 of day 1
        assert_eq!(values[24 + 4], 4.0);
    }

    #[test]
    fn weekends_are_neither_shifted_nor_counted() {
        // Monday through Sunday
        let mut values = vec![0.0; 24 * 7];
        for day in 0..7 {
            values[day * 24 + 16] = 1.0;
        }
        let mut table = ScheduleTable::from_columns([("dishwasher", values)]);
        let s = spec(15, 18, 0, &["dishwasher"]);
        let report = shift(&mut table, &s, 7, monday(), 24).expect("shift succeeds");

        let summary = report.summary("dishwasher").copied().unwrap_or_default();
        assert_eq!(summary.shifted, 5);
        assert_eq!(summary.unshifted, 0);
        assert_eq!(summary.weekend, 2);

        let col = table.column("dishwasher").unwrap_or_default();
        for day in 5..7 {
            assert_eq!(col[day * 24 + 16], 1.0, "weekend day {day} untouched");
            assert_eq!(col[day * 24 + 19], 0.0);
        }
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn absent_and_disabled_columns_untouched() {
        let mut values = vec![0.0; 24];
        values[16] = 1.0;
        let mut table =
            ScheduleTable::from_columns([("a", values.clone()), ("b", values.clone())]);
        let s = spec(15, 18, 0, &["a", "missing"]);
        let report = shift(&mut table, &s, 1, monday(), 24).expect("shift succeeds");
        assert_eq!(table.column("b"), Some(values.as_slice()));
        assert_eq!(table.column("a").map(|c| c[19]), Some(1.0));
        assert!(report.summary("missing").is_none());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn stacking_is_counted_and_reported() {
        let mut values = vec![0.0; 24 * 5];
        for day in 0..5 {
            values[day * 24 + 16] = 1.0;
        }
        let mut table = ScheduleTable::from_columns([("clothes_dryer", values)]);
        let s = spec(15, 18, 1, &["clothes_dryer"]);
        shift(&mut table, &s, 5, monday(), 24).expect("first pass");
        let report = shift(&mut table, &s, 5, monday(), 24).expect("second pass");

        assert_eq!(report.unshifted("clothes_dryer"), 5);
        assert_eq!(report.total_shifted(), 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Stacking);
        assert_eq!(
            report.diagnostics[0].message,
            "To prevent stacking, 5 days were not shifted for the 'clothes_dryer' schedule."
        );
    }

    #[test]
    fn invalid_resolution_fails_before_mutation() {
        let mut values = vec![0.0; 30];
        values[16] = 1.0;
        let mut table = ScheduleTable::from_columns([("a", values.clone())]);
        let s = spec(15, 18, 0, &["a"]);
        assert!(matches!(
            shift(&mut table, &s, 1, monday(), 30),
            Err(ScheduleError::InvalidStepsPerDay(30))
        ));
        assert_eq!(table.column("a"), Some(values.as_slice()));
    }

    #[test]
    fn last_day_overflow_reports_out_of_range() {
        let mut values = vec![0.0; 24 * 2];
        values[22] = 1.0;
        values[24 + 22] = 1.0;
        let mut table = ScheduleTable::from_columns([("a", values)]);
        let s = spec(20, 24, 2, &["a"]);
        let report = shift(&mut table, &s, 2, monday(), 24).expect("shift succeeds");
        let summary = report.summary("a").copied().unwrap_or_default();
        assert_eq!(summary.shifted, 1);
        assert_eq!(summary.out_of_range, 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].day, Some(1));
    }

    #[test]
    fn out_of_range_days_share_one_diagnostic() {
        // one day of data read as ten: every weekday runs past the end
        let mut table = ScheduleTable::from_columns([("a", vec![0.0; 24])]);
        let s = spec(20, 24, 2, &["a"]);
        let report = shift(&mut table, &s, 10, monday(), 24).expect("shift succeeds");
        let summary = report.summary("a").copied().unwrap_or_default();
        assert_eq!(summary.out_of_range, 8);
        assert_eq!(summary.weekend, 2);
        let out_of_range: Vec<_> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::OutOfRange)
            .collect();
        assert_eq!(out_of_range.len(), 1);
        assert_eq!(out_of_range[0].day, Some(0));
        assert!(out_of_range[0].message.starts_with("8 days of the 'a' schedule"));
    }

    fn hm(h: u32, m: u32) -> crate::schedule::window::TimeOfDay {
        crate::schedule::window::TimeOfDay::from_hm(h, m).expect("valid time")
    }

    #[test]
    fn profile_peak_moves_to_delayed_window() {
        let fridge = DayProfile::from_hours(
            "fridge",
            &[(15.0, 0.2), (18.0, 0.8), (24.0, 0.0)],
        )
        .expect("valid profile");
        let s = spec(15, 18, 1, &[]);
        let (shifted, outcome) = shift_profile(&fridge, &s).expect("shift");
        assert_eq!(outcome, DayOutcome::Shifted);
        assert_eq!(shifted.name, "fridge");
        assert_eq!(shifted.value_during(hm(16, 0)), 0.0);
        assert_eq!(shifted.value_during(hm(18, 30)), 0.0);
        assert_eq!(shifted.value_during(hm(19, 0)), 0.8);
        assert_eq!(shifted.value_during(hm(21, 59)), 0.8);
        assert_eq!(shifted.value_during(hm(22, 0)), 0.0);
        assert_eq!(shifted.value_during(hm(3, 0)), 0.2);
        assert_eq!(shifted.breakpoints().len(), 4);
    }

    #[test]
    fn profile_destination_wraps_past_midnight() {
        let p = DayProfile::from_hours("p", &[(20.0, 0.0), (24.0, 1.0)]).expect("valid profile");
        let s = spec(20, 24, 2, &[]);
        let (shifted, outcome) = shift_profile(&p, &s).expect("shift");
        assert_eq!(outcome, DayOutcome::Shifted);
        assert_eq!(shifted.value_during(hm(21, 0)), 0.0);
        assert_eq!(shifted.value_during(hm(1, 0)), 0.0);
        assert_eq!(shifted.value_during(hm(2, 0)), 1.0);
        assert_eq!(shifted.value_during(hm(5, 59)), 1.0);
        assert_eq!(shifted.value_during(hm(6, 0)), 0.0);
    }

    #[test]
    fn profile_with_load_in_destination_is_stacked() {
        let p = DayProfile::from_hours("p", &[(15.0, 0.0), (18.0, 1.0), (24.0, 0.5)])
            .expect("valid profile");
        let (shifted, outcome) = shift_profile(&p, &spec(15, 18, 0, &[])).expect("shift");
        assert_eq!(outcome, DayOutcome::Stacked);
        assert_eq!(shifted, p);
    }
}
