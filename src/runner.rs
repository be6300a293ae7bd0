//! Measure orchestration: walk the host's schedule files, shift them, and
//! build storage control schedules.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::{Result, ScheduleError};
use crate::host::ScheduleHost;
use crate::schedule::calendar::CalendarRuleSet;
use crate::schedule::diagnostics::{Diagnostic, DiagnosticKind};
use crate::schedule::shift::{RulesetShiftSummary, ShiftReport, ShiftSpec, shift, shift_ruleset};
use crate::schedule::storage::StoragePlan;
use crate::schedule::table::ScheduleTable;
use crate::schedule::window::steps_per_hour;

/// Everything [`run_peak_shift`] needs besides the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftJob {
    pub spec: ShiftSpec,
    /// Calendar date of the first row block in every file.
    pub first_day: NaiveDate,
    pub total_days: usize,
    /// Samples per day; inferred per file as `rows / total_days` when `None`.
    pub steps_per_day: Option<usize>,
    /// Rule-based schedules whose day profiles are shifted as well.
    pub rulesets: Vec<String>,
}

/// Final state of a measure run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureStatus {
    Success,
    /// Nothing to do with the given inputs.
    NotApplicable,
}

/// Shift result for one schedule file.
#[derive(Debug, Clone)]
pub struct FileShiftReport {
    pub path: PathBuf,
    pub steps_per_day: usize,
    pub report: ShiftReport,
}

/// Shift result for one rule-based schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetShiftReport {
    pub name: String,
    pub summary: RulesetShiftSummary,
}

/// Status plus every diagnostic raised along the way.
#[derive(Debug, Clone)]
pub struct MeasureOutcome {
    pub status: MeasureStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub files: Vec<FileShiftReport>,
    pub rulesets: Vec<RulesetShiftReport>,
}

impl MeasureOutcome {
    fn success(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            status: MeasureStatus::Success,
            diagnostics,
            files: Vec::new(),
            rulesets: Vec::new(),
        }
    }

    fn not_applicable(message: &str) -> Self {
        Self {
            status: MeasureStatus::NotApplicable,
            ..Self::success(vec![Diagnostic::info(message)])
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

/// Unique column names across all schedule files, sorted.
pub fn schedule_column_names<H: ScheduleHost + ?Sized>(host: &H) -> Vec<String> {
    host.schedule_files()
        .iter()
        .flat_map(|f| f.columns.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Shifts the enabled columns of every schedule file the host references,
/// writes the files back and replaces the selected rule-based schedules with
/// shifted copies.
///
/// Every file is loaded and parsed, and every ruleset shifted in memory,
/// before the first file is written. A file is only rewritten when at least
/// one day moved. Enabled columns that appear in no file, files without data
/// rows and ruleset names the host does not know produce warnings.
///
/// # Errors
///
/// Returns window, resolution, load and parse errors before touching any
/// file. A save error leaves the files written before it changed.
pub fn run_peak_shift<H: ScheduleHost + ?Sized>(
    host: &mut H,
    job: &ShiftJob,
) -> Result<MeasureOutcome> {
    if job.spec.columns.is_empty() && job.rulesets.is_empty() {
        return Ok(MeasureOutcome::not_applicable(
            "Did not select any schedule columns or rule-based schedules to shift.",
        ));
    }
    job.spec.validate()?;

    let mut diagnostics = Vec::new();
    let known = schedule_column_names(&*host);
    for column in &job.spec.columns {
        if known.binary_search(column).is_err() {
            warn!(column = %column, "enabled column not found in any schedule file");
            diagnostics.push(
                Diagnostic::warning(format!(
                    "Column '{column}' was selected for shifting but no schedule file contains it."
                ))
                .for_column(column.clone()),
            );
        }
    }

    let mut loaded = Vec::new();
    for file in host.schedule_files() {
        if !file.columns.iter().any(|c| job.spec.is_enabled(c)) {
            continue;
        }
        let table = ScheduleTable::load(&file.path)?;
        if table.row_count() == 0 {
            warn!(path = %file.path.display(), "schedule file has no data rows");
            diagnostics.push(Diagnostic::warning(format!(
                "Schedule file '{}' has no data rows and was not shifted.",
                file.path.display()
            )));
            continue;
        }
        let steps_per_day = match job.steps_per_day {
            Some(steps) => steps,
            None => infer_steps_per_day(&table, job.total_days)?,
        };
        steps_per_hour(steps_per_day)?;
        loaded.push((file.path.clone(), table, steps_per_day));
    }

    let (shifted_rulesets, ruleset_reports) = shift_host_rulesets(&*host, job, &mut diagnostics)?;

    let mut files = Vec::with_capacity(loaded.len());
    let mut changed = Vec::new();
    for (path, mut table, steps_per_day) in loaded {
        let report = shift(
            &mut table,
            &job.spec,
            job.total_days,
            job.first_day,
            steps_per_day,
        )?;
        diagnostics.push(Diagnostic::info(format!(
            "Shifted {} column-days in '{}' ({} to {}).",
            report.total_shifted(),
            path.display(),
            job.spec.peak,
            job.spec.destination()
        )));
        diagnostics.extend(report.diagnostics.iter().cloned());
        if report.total_shifted() > 0 {
            changed.push((path.clone(), table, report.total_shifted()));
        }
        files.push(FileShiftReport {
            path,
            steps_per_day,
            report,
        });
    }

    for (path, table, shifted) in changed {
        table.save(&path)?;
        info!(path = %path.display(), shifted, "shifted schedule file");
    }
    for ruleset in shifted_rulesets {
        host.materialize_ruleset(ruleset)?;
    }

    Ok(MeasureOutcome {
        files,
        rulesets: ruleset_reports,
        ..MeasureOutcome::success(diagnostics)
    })
}

/// Shifts each selected ruleset in memory. Only rulesets with at least one
/// moved profile are returned for materializing.
fn shift_host_rulesets<H: ScheduleHost + ?Sized>(
    host: &H,
    job: &ShiftJob,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(Vec<CalendarRuleSet>, Vec<RulesetShiftReport>)> {
    let mut shifted = Vec::new();
    let mut reports = Vec::new();
    for name in &job.rulesets {
        let ruleset = match host.ruleset(name) {
            Ok(ruleset) => ruleset,
            Err(ScheduleError::NotFound { .. }) => {
                warn!(ruleset = %name, "selected rule-based schedule not found");
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "Rule-based schedule '{name}' was selected for shifting but the model \
                         has no schedule by that name."
                    ))
                    .for_column(name.clone()),
                );
                continue;
            }
            Err(e) => return Err(e),
        };

        let (next, summary) = shift_ruleset(ruleset, &job.spec)?;
        diagnostics.push(Diagnostic::info(format!(
            "Shifted {} day profiles of rule-based schedule '{name}' ({} to {}).",
            summary.shifted,
            job.spec.peak,
            job.spec.destination()
        )));
        if summary.unshifted > 0 {
            let message = format!(
                "To prevent stacking, {} day profiles were not shifted for the '{name}' schedule.",
                summary.unshifted
            );
            info!("{message}");
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::Stacking,
                column: Some(name.clone()),
                day: None,
                message,
            });
        }
        if summary.shifted > 0 {
            shifted.push(next);
        }
        reports.push(RulesetShiftReport {
            name: name.clone(),
            summary,
        });
    }
    Ok((shifted, reports))
}

/// Hands finished rulesets to the host.
///
/// # Errors
///
/// Returns the first host rejection; rulesets before it stay materialized.
pub fn run_calendar_rulesets<H: ScheduleHost + ?Sized>(
    host: &mut H,
    rulesets: Vec<CalendarRuleSet>,
) -> Result<MeasureOutcome> {
    if rulesets.is_empty() {
        return Ok(MeasureOutcome::not_applicable("No rule-based schedules to add."));
    }
    Ok(MeasureOutcome::success(vec![materialize_all(host, rulesets)?]))
}

/// Builds the ice-storage control rulesets and hands them to the host.
///
/// # Errors
///
/// Returns calendar construction errors or a host rejection.
pub fn run_storage_schedules<H: ScheduleHost + ?Sized>(
    host: &mut H,
    plan: &StoragePlan,
) -> Result<MeasureOutcome> {
    let schedules = plan.build()?;
    let mut diagnostics = schedules.diagnostics.clone();
    for d in &diagnostics {
        warn!("{}", d.message);
    }
    diagnostics.push(materialize_all(host, schedules.into_rulesets())?);

    Ok(MeasureOutcome::success(diagnostics))
}

fn materialize_all<H, I>(host: &mut H, rulesets: I) -> Result<Diagnostic>
where
    H: ScheduleHost + ?Sized,
    I: IntoIterator<Item = CalendarRuleSet>,
{
    let mut list = String::new();
    for ruleset in rulesets {
        list.push_str("\n   * ");
        list.push_str(&ruleset.name);
        host.materialize_ruleset(ruleset)?;
    }
    info!("added rule-based schedules:{list}");
    Ok(Diagnostic::info(format!(
        "The following schedules were added to the model:{list}"
    )))
}

fn infer_steps_per_day(table: &ScheduleTable, total_days: usize) -> Result<usize> {
    let rows = table.row_count();
    if total_days == 0 || rows % total_days != 0 {
        return Err(ScheduleError::InvalidStepsPerDay(
            rows.checked_div(total_days).unwrap_or(0),
        ));
    }
    Ok(rows / total_days)
}
