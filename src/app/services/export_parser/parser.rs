//! Section splitting and table tokenization for instrument exports

use crate::app::models::{RawExport, ResultTable};
use crate::constants::{METADATA_LINE_PREFIXES, RESULTS_SECTION_MARKER};
use crate::error::{PcrError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read and parse one instrument export file
pub fn parse_export_file(path: &Path) -> Result<RawExport> {
    let content = fs::read_to_string(path)?;
    parse_export(&content, path)
}

/// Split export content into the metadata block and the result table
///
/// Fails when no metadata line precedes the `[Results]` marker, when the
/// marker is absent, or when no table line follows it.
pub fn parse_export(content: &str, path: &Path) -> Result<RawExport> {
    let mut metadata = Vec::new();
    let mut table_lines: Vec<&str> = Vec::new();
    let mut in_results = false;

    for line in content.lines() {
        if !in_results && line.trim() == RESULTS_SECTION_MARKER {
            in_results = true;
            continue;
        }

        if in_results {
            if !line.trim().is_empty() {
                table_lines.push(line);
            }
        } else if let Some(rest) = strip_metadata_prefix(line) {
            let (key, value) = split_metadata_line(rest).ok_or_else(|| {
                PcrError::parse(
                    path,
                    format!("metadata line missing '=' or ':' separator: '{}'", line.trim()),
                )
            })?;
            metadata.push((key, value));
        }
    }

    if metadata.is_empty() {
        return Err(PcrError::parse(path, "no metadata found"));
    }
    if !in_results {
        return Err(PcrError::parse(path, "no [Results] section marker"));
    }
    if table_lines.is_empty() {
        return Err(PcrError::parse(path, "no data table"));
    }

    let table = parse_table(&table_lines.join("\n"), path)?;
    debug!(
        "Parsed {}: {} metadata keys, {} table rows",
        path.display(),
        metadata.len(),
        table.rows.len()
    );

    Ok(RawExport { metadata, table })
}

/// Strip one of the known metadata prefixes, if the line carries one
fn strip_metadata_prefix(line: &str) -> Option<&str> {
    METADATA_LINE_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
}

/// Split a metadata line on the first `=`, falling back to the first `:`
fn split_metadata_line(rest: &str) -> Option<(String, String)> {
    let (key, value) = if rest.contains('=') {
        rest.split_once('=')?
    } else {
        rest.split_once(':')?
    };
    Some((key.trim().to_string(), value.trim().to_string()))
}

/// Parse collected table text as tab-delimited with a header row
fn parse_table(text: &str, path: &Path) -> Result<ResultTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| PcrError::Table {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PcrError::Table {
            path: path.to_path_buf(),
            source: e,
        })?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(ResultTable { columns, rows })
}
