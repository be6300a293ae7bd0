//! Structured diagnostic records returned by the shifter, the storage
//! builder and the runner.

use std::fmt;

/// Category of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Informational message.
    Info,
    /// Something the user should look at; the operation still succeeded.
    Warning,
    /// Days left unshifted because the destination window already held load.
    Stacking,
    /// Days whose destination window runs past the end of the series.
    OutOfRange,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Info => write!(f, "info"),
            DiagnosticKind::Warning => write!(f, "warning"),
            DiagnosticKind::Stacking => write!(f, "stacking"),
            DiagnosticKind::OutOfRange => write!(f, "out-of-range"),
        }
    }
}

/// One diagnostic message, optionally tied to a column and a day index.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub column: Option<String>,
    pub day: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Info,
            column: None,
            day: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            column: None,
            day: None,
            message: message.into(),
        }
    }

    /// Attaches a column name.
    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attaches a day index.
    pub fn on_day(mut self, day: usize) -> Self {
        self.day = Some(day);
        self
    }

    pub fn is_warning(&self) -> bool {
        self.kind == DiagnosticKind::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
