/// Rule-based calendar schedules.
pub mod calendar;
pub mod diagnostics;
/// Peak-window load shifting.
pub mod shift;
/// Ice-storage control schedule construction.
pub mod storage;
/// CSV-backed schedule tables.
pub mod table;
pub mod window;

pub use calendar::{CalendarRuleSet, DayProfile, RuleSpec};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use shift::{ShiftReport, ShiftSpec, shift};
pub use table::ScheduleTable;
pub use window::{TimeOfDay, TimeWindow};
