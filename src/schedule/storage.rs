//! Charge/discharge control schedules for ice thermal storage.
//!
//! Builds the availability, tank setpoint, chiller setpoint and loop setpoint
//! rulesets an ice tank needs from four clock times and a seasonal range.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::error::Result;
use crate::schedule::calendar::{CalendarRuleSet, RuleSpec};
use crate::schedule::diagnostics::Diagnostic;
use crate::schedule::window::TimeOfDay;

/// Tank setpoint that keeps the ice tank idle (deg C).
pub const IDLE_TANK_SETPOINT_C: f64 = 99.0;

/// Tolerance used when comparing charge and discharge times, in hours.
const OVERLAP_TOLERANCE_H: f64 = 0.01;

pub const AVAILABILITY_SCHEDULE: &str = "Ice Availability Schedule";
pub const TANK_SETPOINT_SCHEDULE: &str = "Ice Tank Setpoint Schedule";
pub const CHILLER_SETPOINT_SCHEDULE: &str = "Chiller Setpoint Schedule";
pub const LOOP_SETPOINT_SCHEDULE: &str = "Loop Setpoint Schedule";

const WEEKEND_DAYS: &str = "Sat/Sun";
const WEEKDAY_DAYS: &str = "Mon/Tue/Wed/Thu/Fri";

/// Which component sits first on the supply side in partial storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Chiller,
    Storage,
}

/// Storage sizing objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageObjective {
    /// The tank meets the whole load during discharge.
    Full,
    /// Tank and chiller share the load in series.
    Partial(Upstream),
}

/// Inputs for the storage control schedules.
#[derive(Debug, Clone, PartialEq)]
pub struct StoragePlan {
    /// Seasonal availability, `"MM/DD-MM/DD"`.
    pub season: String,
    pub charge_start: TimeOfDay,
    pub charge_end: TimeOfDay,
    pub discharge_start: TimeOfDay,
    pub discharge_end: TimeOfDay,
    /// Apply the weekday charge/discharge cycle on weekends too.
    pub include_weekends: bool,
    pub objective: StorageObjective,
    pub loop_setpoint_c: f64,
    pub intermediate_setpoint_c: f64,
    pub charge_setpoint_c: f64,
}

/// Rulesets produced by [`StoragePlan::build`].
#[derive(Debug, Clone)]
pub struct StorageSchedules {
    pub availability: CalendarRuleSet,
    pub tank_setpoint: CalendarRuleSet,
    pub chiller_setpoint: CalendarRuleSet,
    pub loop_setpoint: CalendarRuleSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl StorageSchedules {
    pub fn into_rulesets(self) -> [CalendarRuleSet; 4] {
        [
            self.availability,
            self.tank_setpoint,
            self.chiller_setpoint,
            self.loop_setpoint,
        ]
    }
}

/// State carried across midnight, attached to the 24:00 breakpoint.
struct MidnightState {
    available: f64,
    chiller: f64,
    tank: f64,
}

impl StoragePlan {
    /// Chiller and tank discharge setpoints for the configured objective.
    fn discharge_setpoints(&self) -> (f64, f64) {
        match self.objective {
            StorageObjective::Full => (self.loop_setpoint_c, self.loop_setpoint_c),
            StorageObjective::Partial(Upstream::Chiller) => {
                (self.intermediate_setpoint_c, self.loop_setpoint_c)
            }
            StorageObjective::Partial(Upstream::Storage) => {
                (self.loop_setpoint_c, self.intermediate_setpoint_c)
            }
        }
    }

    /// Warnings about charge/discharge timing that is legal but suspicious.
    pub fn timing_warnings(&self) -> Vec<Diagnostic> {
        let (cs, ce) = (self.charge_start.hours(), self.charge_end.hours());
        let (ds, de) = (self.discharge_start.hours(), self.discharge_end.hours());
        let mut warnings = Vec::new();

        if ds > de {
            warnings.push(Diagnostic::warning(
                "Discharge start time is later than discharge end time (your ice will \
                 discharge overnight). Verify schedule inputs.",
            ));
        }
        let in_discharge = |t: f64| t >= ds - OVERLAP_TOLERANCE_H && t <= de + OVERLAP_TOLERANCE_H;
        if in_discharge(cs) || in_discharge(ce) {
            warnings.push(Diagnostic::warning(
                "The tank charge and discharge periods overlap. Examine results for \
                 unexpected operation; verify schedule inputs.",
            ));
        }
        warnings
    }

    fn midnight_state(&self) -> MidnightState {
        let (chiller_sp, tank_sp) = self.discharge_setpoints();
        if self.charge_end < self.charge_start {
            MidnightState {
                available: 1.0,
                chiller: self.charge_setpoint_c,
                tank: self.loop_setpoint_c,
            }
        } else if self.discharge_end < self.discharge_start {
            MidnightState {
                available: 1.0,
                chiller: chiller_sp,
                tank: tank_sp,
            }
        } else {
            MidnightState {
                available: 0.0,
                chiller: self.loop_setpoint_c,
                tank: IDLE_TANK_SETPOINT_C,
            }
        }
    }

    /// Builds the four storage control rulesets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ScheduleError::InvalidDateRange`] for a bad
    /// season; breakpoint errors cannot occur for in-range clock times.
    pub fn build(&self) -> Result<StorageSchedules> {
        let cs = self.charge_start.hours();
        let ce = self.charge_end.hours();
        let ds = self.discharge_start.hours();
        let de = self.discharge_end.hours();
        let (chiller_sp, tank_sp) = self.discharge_setpoints();
        let midnight = self.midnight_state();
        let loop_sp = self.loop_setpoint_c;

        let wk_av = sorted(vec![
            (cs, 0.0),
            (ce, 1.0),
            (ds, 0.0),
            (de, 1.0),
            (24.0, midnight.available),
        ]);
        let wk_tank = sorted(vec![
            (cs, IDLE_TANK_SETPOINT_C),
            (ce, loop_sp),
            (ds, IDLE_TANK_SETPOINT_C),
            (de, tank_sp),
            (24.0, midnight.tank),
        ]);
        let wk_chiller = sorted(vec![
            (cs, loop_sp),
            (ce, self.charge_setpoint_c),
            (ds, loop_sp),
            (de, chiller_sp),
            (24.0, midnight.chiller),
        ]);

        let (wknd_av, wknd_tank, wknd_chiller) = if self.include_weekends {
            (wk_av.clone(), wk_tank.clone(), wk_chiller.clone())
        } else {
            (
                sorted(vec![(cs, 0.0), (ce, 1.0), (24.0, midnight.available)]),
                sorted(vec![
                    (cs, IDLE_TANK_SETPOINT_C),
                    (ce, loop_sp),
                    (24.0, midnight.tank),
                ]),
                sorted(vec![
                    (cs, loop_sp),
                    (ce, self.charge_setpoint_c),
                    (24.0, midnight.chiller),
                ]),
            )
        };

        let availability = self.seasonal(AVAILABILITY_SCHEDULE, 0.0, wk_av, wknd_av)?;
        let tank_setpoint =
            self.seasonal(TANK_SETPOINT_SCHEDULE, IDLE_TANK_SETPOINT_C, wk_tank, wknd_tank)?;
        let chiller_setpoint =
            self.seasonal(CHILLER_SETPOINT_SCHEDULE, loop_sp, wk_chiller, wknd_chiller)?;
        let constant = [(24.0, loop_sp)];
        let loop_setpoint =
            CalendarRuleSet::build_simple(LOOP_SETPOINT_SCHEDULE, &constant, &constant, &constant)?;

        Ok(StorageSchedules {
            availability,
            tank_setpoint,
            chiller_setpoint,
            loop_setpoint,
            diagnostics: self.timing_warnings(),
        })
    }

    /// Ruleset with a constant default and winter design day, the weekday
    /// cycle as summer design day, and weekend/weekday rules for the season.
    fn seasonal(
        &self,
        name: &str,
        idle: f64,
        weekday: Vec<(f64, f64)>,
        weekend: Vec<(f64, f64)>,
    ) -> Result<CalendarRuleSet> {
        let idle_day = [(24.0, idle)];
        let rules = [
            RuleSpec::new("Weekend", &self.season, WEEKEND_DAYS, weekend),
            RuleSpec::new("Summer Weekday", &self.season, WEEKDAY_DAYS, weekday.clone()),
        ];
        CalendarRuleSet::build_complex(
            name,
            "AllDays",
            &idle_day,
            Some(&idle_day[..]),
            Some(weekday.as_slice()),
            &rules,
        )
    }
}

/// Orders breakpoints by time, then value, so equal times resolve to the
/// larger value once later duplicates overwrite earlier ones.
fn sorted(mut pairs: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    pairs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    pairs
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).expect("valid clock time")
    }

    fn plan() -> StoragePlan {
        StoragePlan {
            season: "05/01-09/30".to_string(),
            charge_start: t("23:00"),
            charge_end: t("07:00"),
            discharge_start: t("12:00"),
            discharge_end: t("18:00"),
            include_weekends: false,
            objective: StorageObjective::Partial(Upstream::Chiller),
            loop_setpoint_c: 6.7,
            intermediate_setpoint_c: 8.5,
            charge_setpoint_c: -3.9,
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2009, m, d).expect("valid date")
    }

    #[test]
    fn overnight_charge_keeps_tank_available_at_midnight() {
        let s = plan().build().expect("build");
        // 2009-07-15 is a Wednesday
        let av = &s.availability;
        assert_eq!(av.value_at(date(7, 15), t("03:00")), 1.0);
        assert_eq!(av.value_at(date(7, 15), t("09:00")), 0.0);
        assert_eq!(av.value_at(date(7, 15), t("15:00")), 1.0);
        assert_eq!(av.value_at(date(7, 15), t("20:00")), 0.0);
        assert_eq!(av.value_at(date(7, 15), t("23:30")), 1.0);
        // out of season: default day
        assert_eq!(av.value_at(date(1, 14), t("15:00")), 0.0);
    }

    #[test]
    fn setpoints_follow_partial_upstream_chiller() {
        let s = plan().build().expect("build");
        let wed = date(7, 15);
        assert_eq!(s.chiller_setpoint.value_at(wed, t("15:00")), 8.5);
        assert_eq!(s.tank_setpoint.value_at(wed, t("15:00")), 6.7);
        assert_eq!(s.chiller_setpoint.value_at(wed, t("03:00")), -3.9);
        assert_eq!(s.tank_setpoint.value_at(wed, t("09:00")), IDLE_TANK_SETPOINT_C);
        assert_eq!(s.loop_setpoint.value_at(wed, t("09:00")), 6.7);
    }

    #[test]
    fn weekends_only_charge_unless_included() {
        // 2009-07-18 is a Saturday
        let sat = date(7, 18);
        let s = plan().build().expect("build");
        assert_eq!(s.availability.value_at(sat, t("15:00")), 0.0);
        assert_eq!(s.availability.value_at(sat, t("03:00")), 1.0);

        let mut with_weekends = plan();
        with_weekends.include_weekends = true;
        let s = with_weekends.build().expect("build");
        assert_eq!(s.availability.value_at(sat, t("15:00")), 1.0);
    }

    #[test]
    fn design_days_and_rule_order() {
        let s = plan().build().expect("build");
        let av = &s.availability;
        assert_eq!(av.rules.len(), 2);
        assert_eq!(av.rules[0].label, "Ice Availability Schedule Weekend Rule");
        assert_eq!(av.rules[1].label, "Ice Availability Schedule Summer Weekday Rule");
        let winter = av.winter_design_day.as_ref().map(|d| d.value_at(t("15:00")));
        assert_eq!(winter, Some(0.0));
        let summer = av.summer_design_day.as_ref().map(|d| d.value_at(t("15:00")));
        assert_eq!(summer, Some(1.0));
    }

    #[test]
    fn full_storage_uses_loop_setpoint_for_both() {
        let mut p = plan();
        p.objective = StorageObjective::Full;
        assert_eq!(p.discharge_setpoints(), (6.7, 6.7));
        p.objective = StorageObjective::Partial(Upstream::Storage);
        assert_eq!(p.discharge_setpoints(), (6.7, 8.5));
    }

    #[test]
    fn daytime_windows_idle_overnight() {
        let mut p = plan();
        p.charge_start = t("01:00");
        p.charge_end = t("06:00");
        let s = p.build().expect("build");
        let wed = date(7, 15);
        assert_eq!(s.availability.value_at(wed, t("23:00")), 0.0);
        assert_eq!(s.tank_setpoint.value_at(wed, t("23:00")), IDLE_TANK_SETPOINT_C);
        assert!(s.diagnostics.is_empty());
    }

    #[test]
    fn timing_warnings() {
        let mut p = plan();
        p.discharge_start = t("20:00");
        p.discharge_end = t("02:00");
        assert!(
            p.timing_warnings()
                .iter()
                .any(|d| d.message.contains("discharge overnight"))
        );

        let mut p = plan();
        p.charge_start = t("13:00");
        p.charge_end = t("14:00");
        assert!(p.timing_warnings().iter().any(|d| d.message.contains("overlap")));
    }
}
