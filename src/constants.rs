//! Application constants for the PCR export processor
//!
//! Section markers, canonical column names, coercion sentinels and
//! artifact naming used throughout the pipeline.

// =============================================================================
// Raw export structure
// =============================================================================

/// Marker line separating the metadata block from the result table
pub const RESULTS_SECTION_MARKER: &str = "[Results]";

/// Line prefixes identifying metadata lines before the results marker
pub const METADATA_LINE_PREFIXES: &[&str] = &["* ", "# "];

/// Glob matched against the inbound directory when no pattern is configured
pub const DEFAULT_FILE_PATTERN: &str = "*.txt";

// =============================================================================
// Canonical columns
// =============================================================================

/// Canonical result-table column names
pub mod columns {
    pub const WELL: &str = "well";
    pub const WELL_POSITION: &str = "well position";
    pub const SAMPLE_NAME: &str = "sample name";
    pub const TARGET_NAME: &str = "target name";
    pub const TEST_NUMBER: &str = "test number";
    pub const REPORTER: &str = "reporter";
    pub const CT_THRESHOLD: &str = "ct threshold";
    pub const BASELINE_START: &str = "baseline start";
    pub const BASELINE_END: &str = "baseline end";
    pub const CT: &str = "ct";
}

/// Required columns of a normalized result table, in output order
pub const REQUIRED_COLUMNS: &[&str] = &[
    columns::WELL,
    columns::WELL_POSITION,
    columns::SAMPLE_NAME,
    columns::TARGET_NAME,
    columns::TEST_NUMBER,
    columns::REPORTER,
    columns::CT_THRESHOLD,
    columns::BASELINE_START,
    columns::BASELINE_END,
    columns::CT,
];

/// Metadata columns broadcast onto every row, in output order
pub const METADATA_COLUMNS: &[&str] =
    &["file_name", "instrument_type", "block_type", "run_end_time"];

/// Columns stripped from the LIMS import artifact (presentation only)
pub const LIMS_DROP_COLUMNS: &[&str] = &[
    columns::SAMPLE_NAME,
    columns::TARGET_NAME,
    columns::WELL,
    columns::WELL_POSITION,
    "file_name",
    "block_type",
    "run_end_time",
];

// =============================================================================
// Coercion
// =============================================================================

/// Literal the instruments report for a reaction that never crossed threshold
pub const CT_UNDETERMINED: &str = "undetermined";

/// Sentinel Ct value substituted for "Undetermined"
pub const CT_UNDETERMINED_SENTINEL: f64 = 99.0;

/// Cyrillic lookalike emitted in column headers by one instrument family
pub const CYRILLIC_TE: char = '\u{0442}';

// =============================================================================
// LIMSML
// =============================================================================

/// Per-row measurements emitted as RESULT entities: (label, source column)
pub const LIMSML_MEASUREMENTS: &[(&str, &str)] = &[
    ("Ct Threshold", columns::CT_THRESHOLD),
    ("Baseline Start", columns::BASELINE_START),
    ("Baseline End", columns::BASELINE_END),
    ("Ct", columns::CT),
];

// =============================================================================
// Artifact naming
// =============================================================================

/// Get the analysis artifact filename for a source file stem
pub fn analysis_filename(stem: &str) -> String {
    format!("{}_analysis.txt", stem)
}

/// Get the warehouse artifact filename for a source file stem
pub fn warehouse_filename(stem: &str) -> String {
    format!("{}_wh.csv", stem)
}

/// Get the LIMSML artifact filename for a source file stem
pub fn limsml_filename(stem: &str) -> String {
    format!("{}.limsml.xml", stem)
}

/// Timestamp rendering for merged records and artifacts
pub const RUN_END_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";
