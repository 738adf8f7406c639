//! Core data structures for PCR export processing.
//!
//! Raw export structure, the canonical schema both normalizers produce,
//! merged records and per-file processing outcomes.

use crate::constants::{columns, METADATA_COLUMNS, REQUIRED_COLUMNS, RUN_END_TIME_FORMAT};
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::PathBuf;

/// One instrument export split into its two sections
#[derive(Debug, Clone)]
pub struct RawExport {
    /// Metadata lines in file order, key/value split and trimmed
    pub metadata: Vec<(String, String)>,
    /// The tab-delimited table following the `[Results]` marker
    pub table: ResultTable,
}

/// Rectangular result table with instrument-specific headers
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Metadata reduced to the required canonical keys
///
/// One per source file, broadcast onto every row by the merger. The struct
/// itself is the required-key set; construction fails when a key is missing
/// after renaming.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMetadata {
    /// Base filename as reported by the instrument, directories stripped
    pub file_name: String,
    pub instrument_type: String,
    pub block_type: String,
    /// Absolute run end timestamp in the configured reference zone
    pub run_end_time: DateTime<Tz>,
}

impl CanonicalMetadata {
    /// Metadata value for one canonical metadata column, rendered for output
    pub fn field(&self, column: &str) -> String {
        match column {
            "file_name" => self.file_name.clone(),
            "instrument_type" => self.instrument_type.clone(),
            "block_type" => self.block_type.clone(),
            "run_end_time" => self.run_end_time.format(RUN_END_TIME_FORMAT).to_string(),
            _ => String::new(),
        }
    }
}

/// One normalized result record, one per (well, target, reporter)
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub well: String,
    pub well_position: String,
    pub sample_name: String,
    pub target_name: String,
    /// Integer-valued string, empty when the sample carries no test number
    pub test_number: String,
    pub reporter: String,
    /// None marks a value the instrument could not report
    pub ct_threshold: Option<f64>,
    /// Integer-valued string, "0" when absent
    pub baseline_start: String,
    pub baseline_end: String,
    /// None for unparsable values, 99.0 for "Undetermined"
    pub ct: Option<f64>,
}

impl CanonicalRow {
    /// Row value for one canonical column, rendered for output
    pub fn field(&self, column: &str) -> String {
        match column {
            columns::WELL => self.well.clone(),
            columns::WELL_POSITION => self.well_position.clone(),
            columns::SAMPLE_NAME => self.sample_name.clone(),
            columns::TARGET_NAME => self.target_name.clone(),
            columns::TEST_NUMBER => self.test_number.clone(),
            columns::REPORTER => self.reporter.clone(),
            columns::CT_THRESHOLD => format_float(self.ct_threshold),
            columns::BASELINE_START => self.baseline_start.clone(),
            columns::BASELINE_END => self.baseline_end.clone(),
            columns::CT => format_float(self.ct),
            _ => String::new(),
        }
    }

    /// Rows without a test number reach the analysis artifact only
    pub fn has_test_number(&self) -> bool {
        !self.test_number.is_empty()
    }
}

/// One canonical row with its file's metadata broadcast onto it
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub row: CanonicalRow,
    pub metadata: CanonicalMetadata,
}

impl MergedRecord {
    /// Full output schema: required row columns then metadata columns
    pub fn all_columns() -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .chain(METADATA_COLUMNS.iter())
            .copied()
            .collect()
    }

    /// Value for any row or metadata column
    pub fn field(&self, column: &str) -> String {
        if METADATA_COLUMNS.contains(&column) {
            self.metadata.field(column)
        } else {
            self.row.field(column)
        }
    }
}

/// Render an optional numeric the way the artifacts expect it
///
/// Whole numbers keep one decimal ("99.0"), missing values render empty.
pub fn format_float(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{:.1}", v),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

/// Map an instrument type to its LIMS display name, passing unmapped
/// values through unchanged
pub fn display_instrument<'a>(map: &'a HashMap<String, String>, raw: &'a str) -> &'a str {
    map.get(raw).map(String::as_str).unwrap_or(raw)
}

/// Result of processing one inbound file
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Processed(FileReport),
    Quarantined { reason: String },
}

/// What a successful run of the pipeline produced for one file
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    /// Rows written to the analysis artifact
    pub rows: usize,
    /// Rows carrying a test number (warehouse / LIMS rows)
    pub lims_rows: usize,
    /// Every artifact written for this file
    pub artifacts: Vec<PathBuf>,
}

/// Aggregate counters for a watch session or a one-shot drain
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchStats {
    pub files_processed: usize,
    pub files_quarantined: usize,
}
