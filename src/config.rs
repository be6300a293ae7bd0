//! TOML-based job configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Result, ScheduleError};
use crate::runner::ShiftJob;
use crate::schedule::calendar::{CalendarRuleSet, DateRange, RuleSpec};
use crate::schedule::shift::ShiftSpec;
use crate::schedule::storage::{StorageObjective, StoragePlan, Upstream};
use crate::schedule::window::{MAX_SHIFT_SPAN_HOURS, TimeOfDay, TimeWindow, steps_per_hour};

/// Top-level job configuration parsed from TOML.
///
/// All fields have defaults. Load from TOML with
/// [`JobConfig::from_toml_file`] or start from a preset with
/// [`JobConfig::from_preset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Calendar the schedule files are laid out on.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Peak-period shift parameters.
    #[serde(default)]
    pub shift: ShiftConfig,
    /// Ice-storage control schedules; skipped when absent.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    /// Additional rule-based schedules written out in full.
    #[serde(default)]
    pub rulesets: Vec<RulesetConfig>,
}

/// Calendar the schedule files are laid out on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarConfig {
    /// Calendar year; day 0 of every schedule file is January 1st.
    pub year: i32,
    /// Days to process; defaults to the length of `year`.
    pub days: Option<usize>,
    /// Samples per day; inferred from each file when absent.
    pub steps_per_day: Option<usize>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            year: 2009,
            days: None,
            steps_per_day: None,
        }
    }
}

/// Peak-period shift parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShiftConfig {
    /// Peak period as `"HH - HH"`.
    pub peak_period: String,
    /// Hours between the end of the peak and the start of the shifted window.
    pub delay_hours: u32,
    /// Schedule columns to shift.
    pub columns: Vec<String>,
    /// Rule-based schedules whose day profiles are shifted too.
    pub rulesets: Vec<String>,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            peak_period: "15 - 18".to_string(),
            delay_hours: 0,
            columns: Vec::new(),
            rulesets: Vec::new(),
        }
    }
}

/// Ice-storage control schedule parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Seasonal availability as `"MM/DD-MM/DD"`.
    pub season: String,
    pub discharge_start: String,
    pub discharge_end: String,
    pub charge_start: String,
    pub charge_end: String,
    /// Run the weekday cycle on weekends as well.
    pub include_weekends: bool,
    /// `"full"` or `"partial"`.
    pub objective: String,
    /// First component on the supply side for partial storage.
    pub upstream: Upstream,
    /// Loop supply setpoint (deg C).
    pub loop_setpoint_c: f64,
    /// Setpoint between chiller and tank for partial storage (deg C).
    pub intermediate_setpoint_c: f64,
    /// Chiller leaving temperature while charging (deg C).
    pub charge_setpoint_c: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            season: "01/01-12/31".to_string(),
            discharge_start: "12:00".to_string(),
            discharge_end: "18:00".to_string(),
            charge_start: "23:00".to_string(),
            charge_end: "07:00".to_string(),
            include_weekends: false,
            objective: "full".to_string(),
            upstream: Upstream::Chiller,
            loop_setpoint_c: 6.7,
            intermediate_setpoint_c: 8.5,
            charge_setpoint_c: -3.9,
        }
    }
}

impl StorageConfig {
    /// Converts the string fields into a [`StoragePlan`].
    ///
    /// # Errors
    ///
    /// Returns a clock-time or breakpoint error for a bad time, or
    /// [`ScheduleError::InvalidDateRange`] for a bad season.
    pub fn to_plan(&self) -> Result<StoragePlan> {
        DateRange::parse(&self.season)?;
        let objective = match self.objective.as_str() {
            "partial" => StorageObjective::Partial(self.upstream),
            _ => StorageObjective::Full,
        };
        Ok(StoragePlan {
            season: self.season.clone(),
            charge_start: TimeOfDay::parse(&self.charge_start)?,
            charge_end: TimeOfDay::parse(&self.charge_end)?,
            discharge_start: TimeOfDay::parse(&self.discharge_start)?,
            discharge_end: TimeOfDay::parse(&self.discharge_end)?,
            include_weekends: self.include_weekends,
            objective,
            loop_setpoint_c: self.loop_setpoint_c,
            intermediate_setpoint_c: self.intermediate_setpoint_c,
            charge_setpoint_c: self.charge_setpoint_c,
        })
    }
}

/// A rule-based schedule spelled out in the job file.
///
/// ```toml
/// [[rulesets]]
/// name = "Fan Availability"
/// default_day = [[24.0, 0.0]]
///
/// [[rulesets.rules]]
/// label = "Summer Weekday"
/// season = "06/01-08/31"
/// days = "Mon/Tue/Wed/Thu/Fri"
/// breakpoints = [[8.0, 0.0], [18.0, 1.0], [24.0, 0.0]]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesetConfig {
    pub name: String,
    /// Label of the default day profile.
    #[serde(default = "default_day_label")]
    pub default_label: String,
    /// `(fractional hour, value)` pairs for days no rule claims.
    pub default_day: Vec<(f64, f64)>,
    #[serde(default)]
    pub winter_design_day: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    pub summer_design_day: Option<Vec<(f64, f64)>>,
    /// Rules in precedence order for equal scopes.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

fn default_day_label() -> String {
    "AllDays".to_string()
}

impl RulesetConfig {
    /// Builds the ruleset with [`CalendarRuleSet::build_complex`].
    ///
    /// # Errors
    ///
    /// Propagates date-range, weekday and breakpoint errors.
    pub fn build(&self) -> Result<CalendarRuleSet> {
        CalendarRuleSet::build_complex(
            &self.name,
            &self.default_label,
            &self.default_day,
            self.winter_design_day.as_deref(),
            self.summer_design_day.as_deref(),
            &self.rules,
        )
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"shift.peak_period"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

/// Appliance end uses shifted by the appliance presets.
const APPLIANCE_COLUMNS: &[&str] = &[
    "clothes_dryer",
    "clothes_washer",
    "dishwasher",
    "cooking_range",
];

impl JobConfig {
    /// Returns the baseline job: 15 - 18 peak, no delay, no columns enabled.
    pub fn baseline() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            shift: ShiftConfig::default(),
            storage: None,
            rulesets: Vec::new(),
        }
    }

    /// Returns the appliances preset: wet appliances and cooking moved out
    /// of a 15 - 18 peak.
    pub fn appliances() -> Self {
        Self {
            shift: ShiftConfig {
                columns: APPLIANCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                ..ShiftConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the evening-delay preset: 17 - 19 peak with a one-hour delay.
    pub fn evening_delay() -> Self {
        Self {
            shift: ShiftConfig {
                peak_period: "17 - 19".to_string(),
                delay_hours: 1,
                columns: APPLIANCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                ..ShiftConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the ice-storage preset: appliances plus summer partial storage.
    pub fn ice_storage() -> Self {
        Self {
            storage: Some(StorageConfig {
                season: "05/01-09/30".to_string(),
                objective: "partial".to_string(),
                ..StorageConfig::default()
            }),
            ..Self::appliances()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "appliances", "evening_delay", "ice_storage"];

    /// Loads a job from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "appliances" => Ok(Self::appliances()),
            "evening_delay" => Ok(Self::evening_delay()),
            "ice_storage" => Ok(Self::ice_storage()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a job from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "job".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a job from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// January 1st of the configured year.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.calendar.year, 1, 1)
    }

    /// Configured day count, or the number of days in the year.
    pub fn total_days(&self) -> usize {
        if let Some(days) = self.calendar.days {
            return days;
        }
        let year = self.calendar.year;
        match (
            NaiveDate::from_ymd_opt(year, 1, 1),
            year.checked_add(1).and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
        ) {
            (Some(start), Some(end)) => (end - start).num_days() as usize,
            _ => 365,
        }
    }

    /// Builds the runner job for the `[shift]` section.
    ///
    /// # Errors
    ///
    /// Returns the first window error, or [`ScheduleError::InvalidDateRange`]
    /// when the year has no January 1st.
    pub fn shift_job(&self) -> Result<ShiftJob> {
        let spec = ShiftSpec::parse(
            &self.shift.peak_period,
            self.shift.delay_hours,
            self.shift.columns.clone(),
        )?;
        let first_day = self
            .first_day()
            .ok_or_else(|| ScheduleError::InvalidDateRange(format!("year {}", self.calendar.year)))?;
        Ok(ShiftJob {
            spec,
            first_day,
            total_days: self.total_days(),
            steps_per_day: self.calendar.steps_per_day,
            rulesets: self.shift.rulesets.clone(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let cal = &self.calendar;

        if self.first_day().is_none() {
            errors.push(ConfigError {
                field: "calendar.year".into(),
                message: format!("{} is not a supported year", cal.year),
            });
        }
        if cal.days == Some(0) {
            errors.push(ConfigError {
                field: "calendar.days".into(),
                message: "must be > 0".into(),
            });
        }
        if let Some(steps) = cal.steps_per_day {
            if steps_per_hour(steps).is_err() {
                errors.push(ConfigError {
                    field: "calendar.steps_per_day".into(),
                    message: format!("must be a positive multiple of 24, got {steps}"),
                });
            }
        }

        let sh = &self.shift;
        match TimeWindow::parse(&sh.peak_period) {
            Ok(peak) => {
                if peak.width_hours() + sh.delay_hours > MAX_SHIFT_SPAN_HOURS {
                    errors.push(ConfigError {
                        field: "shift.delay_hours".into(),
                        message: format!(
                            "peak period ({peak}) plus the delay ({}) must be no longer than \
                             {MAX_SHIFT_SPAN_HOURS} hours",
                            sh.delay_hours
                        ),
                    });
                }
            }
            Err(e) => errors.push(ConfigError {
                field: "shift.peak_period".into(),
                message: e.to_string(),
            }),
        }
        if sh.columns.iter().any(|c| c.trim().is_empty()) {
            errors.push(ConfigError {
                field: "shift.columns".into(),
                message: "column names must not be empty".into(),
            });
        }
        if sh.rulesets.iter().any(|c| c.trim().is_empty()) {
            errors.push(ConfigError {
                field: "shift.rulesets".into(),
                message: "schedule names must not be empty".into(),
            });
        }

        if let Some(st) = &self.storage {
            if let Err(e) = DateRange::parse(&st.season) {
                errors.push(ConfigError {
                    field: "storage.season".into(),
                    message: e.to_string(),
                });
            }
            for (field, value) in [
                ("storage.discharge_start", &st.discharge_start),
                ("storage.discharge_end", &st.discharge_end),
                ("storage.charge_start", &st.charge_start),
                ("storage.charge_end", &st.charge_end),
            ] {
                if let Err(e) = TimeOfDay::parse(value) {
                    errors.push(ConfigError {
                        field: field.into(),
                        message: e.to_string(),
                    });
                }
            }
            if st.objective != "full" && st.objective != "partial" {
                errors.push(ConfigError {
                    field: "storage.objective".into(),
                    message: format!("must be \"full\" or \"partial\", got \"{}\"", st.objective),
                });
            }
        }

        for (i, rs) in self.rulesets.iter().enumerate() {
            if rs.name.trim().is_empty() {
                errors.push(ConfigError {
                    field: format!("rulesets[{i}].name"),
                    message: "must not be empty".into(),
                });
            }
            if let Err(e) = rs.build() {
                errors.push(ConfigError {
                    field: format!("rulesets[{i}]"),
                    message: e.to_string(),
                });
            }
        }

        errors
    }
}
