//! Column-oriented schedule time series backed by a CSV file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, ScheduleError};

/// Named numeric columns, one sample per time step.
///
/// Column order is the order of the header row the table was loaded from and
/// is the order written back by [`ScheduleTable::save`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTable {
    columns: IndexMap<String, Vec<f64>>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, samples)` pairs, keeping their order.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, values)| (name.into(), values))
                .collect(),
        }
    }

    /// Loads a table from a CSV file.
    ///
    /// Row 0 holds column names, every following row holds one time step.
    /// Names and cells are trimmed of surrounding whitespace, so a header
    /// `" dishwasher "` is looked up and saved back as `dishwasher`.
    /// Trailing blank cells in a column are dropped; every other cell must
    /// parse as a finite number.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Parse`] naming the column of the first
    /// non-numeric cell, [`ScheduleError::DuplicateColumn`] for a repeated
    /// header name, or an I/O / CSV error. Nothing is imported on failure.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let table = Self::read_from(io::BufReader::new(file))?;
        debug!(
            path = %path.display(),
            columns = table.len(),
            rows = table.row_count(),
            "loaded schedule table"
        );
        Ok(table)
    }

    /// Parses a table from any CSV reader. See [`ScheduleTable::load`].
    pub fn read_from(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        let Some(header) = records.next().transpose()? else {
            return Ok(Self::new());
        };
        let names: Vec<String> = header.iter().map(|s| s.trim().to_string()).collect();

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in records {
            let record = record?;
            for (i, cells) in raw.iter_mut().enumerate() {
                cells.push(record.get(i).unwrap_or("").trim().to_string());
            }
        }

        let mut columns = IndexMap::with_capacity(names.len());
        for (name, mut cells) in names.into_iter().zip(raw) {
            while cells.last().is_some_and(String::is_empty) {
                cells.pop();
            }
            let values = parse_cells(&name, &cells)?;
            if columns.insert(name.clone(), values).is_some() {
                return Err(ScheduleError::DuplicateColumn(name));
            }
        }
        Ok(Self { columns })
    }

    /// Writes the table back to `path`, replacing the file.
    ///
    /// The data goes to a sibling `<path>.tmp` first and is renamed over
    /// `path`, so an interrupted write leaves the original intact. The
    /// temporary file is removed again when writing or renaming fails.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if writing or renaming fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path);
        let saved = self
            .write_file(&tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(ScheduleError::from));
        if saved.is_err() {
            if let Err(e) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %e, "could not remove temporary file");
            }
        }
        saved?;
        debug!(path = %path.display(), rows = self.row_count(), "saved schedule table");
        Ok(())
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the header row followed by one row per sample index.
    ///
    /// Values use the shortest representation that parses back to the same
    /// `f64`. Columns shorter than the longest one get empty cells.
    ///
    /// # Errors
    ///
    /// Returns a CSV error if writing fails.
    pub fn write_to(&self, writer: impl Write) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(self.columns.keys())?;

        for row in 0..self.row_count() {
            wtr.write_record(self.columns.values().map(|values| {
                values
                    .get(row)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }))?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Column names in stored order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        self.columns.get_mut(name)
    }

    /// Inserts or replaces a column, returning the previous samples.
    ///
    /// A new column is appended after the existing ones.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Option<Vec<f64>> {
        self.columns.insert(name.into(), values)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// Reads only the header row of a schedule file.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be read.
pub fn read_column_names(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut record = csv::StringRecord::new();
    if !rdr.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(|s| s.trim().to_string()).collect())
}

fn parse_cells(column: &str, cells: &[String]) -> Result<Vec<f64>> {
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ScheduleError::Parse {
                    column: column.to_string(),
                    // 1-based file line; the header is line 1
                    row: i + 2,
                    value: cell.clone(),
                })
        })
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "occupants,dishwasher,ceiling_fan\n\
                          0.5,0,1\n\
                          0.25,0.1,1\n\
                          1,,0.75\n\
                          ,,0.5\n";

    fn sample() -> ScheduleTable {
        ScheduleTable::read_from(SAMPLE.as_bytes()).expect("sample should parse")
    }

    #[test]
    fn header_order_is_preserved() {
        let table = sample();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["occupants", "dishwasher", "ceiling_fan"]);
    }

    #[test]
    fn trailing_blanks_are_dropped_per_column() {
        let table = sample();
        assert_eq!(table.column("occupants"), Some(&[0.5, 0.25, 1.0][..]));
        assert_eq!(table.column("dishwasher"), Some(&[0.0, 0.1][..]));
        assert_eq!(table.column("ceiling_fan").map(<[f64]>::len), Some(4));
        assert_eq!(table.row_count(), 4);
    }

    #[test]
    fn non_numeric_cell_names_column() {
        let csv = "a,b\n1,2\n3,oops\n";
        let err = ScheduleTable::read_from(csv.as_bytes()).expect_err("should fail");
        match err {
            ScheduleError::Parse { column, row, value } => {
                assert_eq!(column, "b");
                assert_eq!(row, 3);
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn interior_blank_is_a_parse_error() {
        let csv = "a,b\n1,1\n,1\n2,1\n";
        assert!(matches!(
            ScheduleTable::read_from(csv.as_bytes()),
            Err(ScheduleError::Parse { column, row: 3, .. }) if column == "a"
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let csv = "a\nNaN\n";
        assert!(matches!(
            ScheduleTable::read_from(csv.as_bytes()),
            Err(ScheduleError::Parse { .. })
        ));
    }

    #[test]
    fn duplicate_header_is_rejected() {
        let csv = "a,a\n1,2\n";
        assert!(matches!(
            ScheduleTable::read_from(csv.as_bytes()),
            Err(ScheduleError::DuplicateColumn(name)) if name == "a"
        ));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = ScheduleTable::read_from("".as_bytes()).expect("empty is fine");
        assert!(table.is_empty());
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn write_pads_short_columns() {
        let table = sample();
        let mut out = Vec::new();
        table.write_to(&mut out).expect("write should succeed");
        let text = String::from_utf8(out).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "occupants,dishwasher,ceiling_fan");
        assert_eq!(lines[1], "0.5,0,1");
        assert_eq!(lines[3], "1,,0.75");
        assert_eq!(lines[4], ",,0.5");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn written_table_reads_back_identically() {
        let mut table = sample();
        table.insert_column("tiny", vec![1e-9, 0.1 + 0.2, 123456.789]);
        let mut out = Vec::new();
        table.write_to(&mut out).expect("write should succeed");
        let back = ScheduleTable::read_from(out.as_slice()).expect("read back");
        assert_eq!(back, table);
    }

    #[test]
    fn save_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("schedules.csv");
        fs::write(&path, SAMPLE).expect("seed file");

        let mut table = ScheduleTable::load(&path).expect("load");
        if let Some(col) = table.column_mut("occupants") {
            col[0] = 0.0;
        }
        table.save(&path).expect("save");

        let back = ScheduleTable::load(&path).expect("reload");
        assert_eq!(back.column("occupants").map(|c| c[0]), Some(0.0));
        assert!(!temp_path(&path).exists());
        assert_eq!(
            read_column_names(&path).expect("header"),
            vec!["occupants", "dishwasher", "ceiling_fan"]
        );
    }

    #[test]
    fn header_names_are_trimmed_on_load_and_save() {
        let table = ScheduleTable::read_from(" dishwasher ,occupants\n1, 2\n".as_bytes())
            .expect("should parse");
        assert_eq!(table.column("dishwasher"), Some(&[1.0][..]));
        let mut out = Vec::new();
        table.write_to(&mut out).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "dishwasher,occupants\n1,2\n");
    }

    #[test]
    fn failed_save_removes_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        // renaming a file over a non-empty directory fails
        let path = dir.path().join("schedules.csv");
        fs::create_dir(&path).expect("create dir");
        fs::write(path.join("keep"), "x").expect("seed dir");

        assert!(sample().save(&path).is_err());
        assert!(!temp_path(&path).exists());
        assert!(path.join("keep").exists());
    }
}
