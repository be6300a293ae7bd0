//! Capability interface to the building-model host, plus a file-backed host.
//!
//! The shifting and calendar code never reaches into a host object graph;
//! it asks a [`ScheduleHost`] for schedule files and hands finished rulesets
//! back to it.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, ScheduleError};
use crate::schedule::calendar::CalendarRuleSet;
use crate::schedule::table::read_column_names;

/// An external schedule file and the column names declared in its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFileRef {
    pub path: PathBuf,
    pub columns: Vec<String>,
}

/// What the engine needs from the host building model.
pub trait ScheduleHost {
    /// Schedule files referenced by the model.
    fn schedule_files(&self) -> &[ScheduleFileRef];

    /// Names of the rule-based schedules known to the model.
    fn ruleset_names(&self) -> Vec<String>;

    /// Looks up a rule-based schedule by name.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NotFound`] when no schedule has that name.
    fn ruleset(&self, name: &str) -> Result<&CalendarRuleSet>;

    /// Adds a ruleset to the model as a native schedule, replacing any
    /// schedule of the same name.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the host rejects the schedule.
    fn materialize_ruleset(&mut self, ruleset: CalendarRuleSet) -> Result<()>;
}

/// Host backed by CSV schedule files on disk and an in-memory ruleset store.
#[derive(Debug, Default)]
pub struct FileHost {
    files: Vec<ScheduleFileRef>,
    rulesets: IndexMap<String, CalendarRuleSet>,
}

#[derive(Serialize)]
struct RulesetExport<'a> {
    rulesets: Vec<&'a CalendarRuleSet>,
}

impl FileHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers each path, reading its header row for the column names.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error for a file that cannot be read.
    pub fn from_paths<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut host = Self::new();
        for path in paths {
            host.add_file(path)?;
        }
        Ok(host)
    }

    /// Registers one schedule file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the header cannot be read.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let columns = read_column_names(&path)?;
        self.files.push(ScheduleFileRef { path, columns });
        Ok(())
    }

    /// Serializes every materialized ruleset as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Toml`] if serialization fails.
    pub fn rulesets_toml(&self) -> Result<String> {
        let export = RulesetExport {
            rulesets: self.rulesets.values().collect(),
        };
        Ok(toml::to_string(&export)?)
    }

    /// Writes [`FileHost::rulesets_toml`] to `path`.
    ///
    /// # Errors
    ///
    /// Returns a serialization or I/O error.
    pub fn write_rulesets(&self, path: &Path) -> Result<()> {
        fs::write(path, self.rulesets_toml()?)?;
        info!(path = %path.display(), count = self.rulesets.len(), "wrote rulesets");
        Ok(())
    }
}

impl ScheduleHost for FileHost {
    fn schedule_files(&self) -> &[ScheduleFileRef] {
        &self.files
    }

    fn ruleset_names(&self) -> Vec<String> {
        self.rulesets.keys().cloned().collect()
    }

    fn ruleset(&self, name: &str) -> Result<&CalendarRuleSet> {
        self.rulesets.get(name).ok_or_else(|| ScheduleError::NotFound {
            kind: "schedule ruleset",
            name: name.to_string(),
        })
    }

    fn materialize_ruleset(&mut self, ruleset: CalendarRuleSet) -> Result<()> {
        self.rulesets.insert(ruleset.name.clone(), ruleset);
        Ok(())
    }
}
