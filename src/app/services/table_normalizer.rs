//! Result table normalization
//!
//! Reconciles the three instrument families' column conventions into the
//! canonical row schema: header cleanup (including the Cyrillic "т" the
//! StepOne family emits in "Cт"), column aliasing via the configured rename
//! table, derivation of columns one family embeds elsewhere, and numeric
//! coercion with the documented edge-case policy.

use crate::app::models::{CanonicalRow, ResultTable};
use crate::config::NormalizationConfig;
use crate::constants::{columns, CT_UNDETERMINED, CT_UNDETERMINED_SENTINEL, CYRILLIC_TE};
use crate::error::{PcrError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Normalize one result table into canonical rows
///
/// Rows without a sample name are empty wells and are dropped. Fails with a
/// schema error naming the first required column that cannot be resolved
/// from the headers, the alias table or a derivation.
pub fn normalize_table(
    table: &ResultTable,
    config: &NormalizationConfig,
) -> Result<Vec<CanonicalRow>> {
    let index = clean_header_index(&table.columns);

    let resolve = |canonical: &str| -> Option<usize> {
        if let Some(&i) = index.get(canonical) {
            return Some(i);
        }
        config
            .column_map
            .iter()
            .filter(|(_, dst)| dst.as_str() == canonical)
            .find_map(|(src, _)| index.get(src.as_str()).copied())
    };
    let require = |canonical: &'static str| -> Result<usize> {
        resolve(canonical).ok_or_else(|| PcrError::schema(canonical))
    };

    let sample_idx = require(columns::SAMPLE_NAME)?;
    let well_position_idx = require(columns::WELL_POSITION)?;
    // one family only reports plate positions, duplicate them as the well id
    let well_idx = index
        .get(columns::WELL)
        .copied()
        .unwrap_or(well_position_idx);
    let target_idx = require(columns::TARGET_NAME)?;
    let reporter_idx = require(columns::REPORTER)?;
    let ct_threshold_idx = require(columns::CT_THRESHOLD)?;
    let baseline_start_idx = require(columns::BASELINE_START)?;
    let baseline_end_idx = require(columns::BASELINE_END)?;
    let ct_idx = require(columns::CT)?;
    // absent on the family that embeds the test number in the sample name
    let test_number_idx = resolve(columns::TEST_NUMBER);

    let mut rows = Vec::new();
    for row in &table.rows {
        let get = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

        let raw_sample = get(sample_idx);
        if raw_sample.is_empty() {
            continue;
        }

        let (sample_name, raw_test_number) = match test_number_idx {
            Some(i) => (raw_sample.to_string(), get(i).to_string()),
            None => split_composite_sample(raw_sample),
        };

        rows.push(CanonicalRow {
            well: get(well_idx).to_string(),
            well_position: get(well_position_idx).to_string(),
            sample_name,
            target_name: get(target_idx).to_string(),
            test_number: coerce_test_number(&raw_test_number),
            reporter: get(reporter_idx).to_string(),
            ct_threshold: parse_numeric(get(ct_threshold_idx)),
            baseline_start: coerce_integer_string(get(baseline_start_idx)),
            baseline_end: coerce_integer_string(get(baseline_end_idx)),
            ct: parse_ct(get(ct_idx)),
        });
    }

    debug!(
        "Normalized table: {} of {} rows kept",
        rows.len(),
        table.rows.len()
    );
    Ok(rows)
}

/// Header cleanup: Cyrillic "т" -> "t", trim, lowercase. First occurrence
/// wins on duplicate headers.
fn clean_header_index(headers: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        let cleaned = header
            .replace(CYRILLIC_TE, "t")
            .trim()
            .to_lowercase();
        index.entry(cleaned).or_insert(i);
    }
    index
}

/// Split a composite "sample@test" sample name
///
/// Text before the first `@` is the sample name, text after is the test
/// number. Without an `@` the whole value is the sample name and the row
/// carries no test number.
fn split_composite_sample(raw: &str) -> (String, String) {
    match raw.split_once('@') {
        Some((sample, test)) => (sample.trim().to_string(), test.trim().to_string()),
        None => (raw.to_string(), String::new()),
    }
}

/// Ct coercion: "undetermined" in any case maps to the 99.0 sentinel, any
/// other unparsable value is a missing marker, never an error
fn parse_ct(raw: &str) -> Option<f64> {
    if raw.eq_ignore_ascii_case(CT_UNDETERMINED) {
        return Some(CT_UNDETERMINED_SENTINEL);
    }
    raw.parse::<f64>().ok()
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok()
}

/// Administrative integers arrive as floats or blanks; render them as
/// integer-valued strings, defaulting the unusable to "0". Idempotent.
fn coerce_integer_string(raw: &str) -> String {
    raw.parse::<f64>()
        .map(|v| (v as i64).to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Like [`coerce_integer_string`], but an absent test number stays empty so
/// the row can be routed to the analysis artifact only
fn coerce_test_number(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    coerce_integer_string(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> ResultTable {
        ResultTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|f| f.to_string()).collect())
                .collect(),
        }
    }

    fn quantstudio_columns() -> Vec<&'static str> {
        vec![
            "Well",
            "Well Position",
            "Sample Name",
            "Target Name",
            "Comments",
            "Reporter",
            "Ct Threshold",
            "Baseline Start",
            "Baseline End",
            "CT",
        ]
    }

    #[test]
    fn test_composite_sample_name_scenario() {
        // sample name "S1@7" with an undetermined Ct, per the pro family
        let t = table(
            &[
                "Well Position",
                "Sample Name",
                "Target Name",
                "Reporter",
                "Ct Threshold",
                "Baseline Start",
                "Baseline End",
                "Ct",
            ],
            &[&["A1", "S1@7", "TargetX", "FAM", "0.2", "3", "15", "Undetermined"]],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.test_number, "7");
        assert_eq!(row.sample_name, "S1");
        assert_eq!(row.ct, Some(99.0));
        assert_eq!(row.well_position, "A1");
        // well derived from well position
        assert_eq!(row.well, "A1");
    }

    #[test]
    fn test_cyrillic_header_artifact() {
        let t = table(
            &[
                "Well",
                "Sample Name",
                "Target Name",
                "Reporter",
                "C\u{0442} Threshold",
                "Baseline Start",
                "Baseline End",
                "C\u{0442}",
                "Comments",
            ],
            &[&["1", "S1", "T", "FAM", "0.2", "3", "15", "21.55", "44"]],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows[0].ct, Some(21.55));
        assert_eq!(rows[0].ct_threshold, Some(0.2));
        assert_eq!(rows[0].test_number, "44");
        // well position derived from well via the alias table
        assert_eq!(rows[0].well_position, "1");
    }

    #[test]
    fn test_empty_sample_rows_dropped() {
        let mut cols = quantstudio_columns();
        cols.truncate(10);
        let t = table(
            &cols,
            &[
                &["1", "A1", "", "T", "7", "FAM", "0.2", "3", "15", "20.0"],
                &["2", "A2", "S2", "T", "8", "FAM", "0.2", "3", "15", "21.0"],
            ],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample_name, "S2");
    }

    #[test]
    fn test_undetermined_variants_map_to_sentinel() {
        for raw in ["Undetermined", "UNDETERMINED", "undetermined", "  Undetermined  "] {
            assert_eq!(parse_ct(raw.trim()), Some(99.0), "variant {:?}", raw);
        }
        // other junk is a missing marker, not an error
        assert_eq!(parse_ct("n/a"), None);
        assert_eq!(parse_ct(""), None);
        assert_eq!(parse_ct("21.5"), Some(21.5));
    }

    #[test]
    fn test_integer_coercion_idempotent() {
        for raw in ["7", "7.0", "", "junk", "0"] {
            let once = coerce_integer_string(raw);
            assert_eq!(coerce_integer_string(&once), once, "input {:?}", raw);

            let once = coerce_test_number(raw);
            assert_eq!(coerce_test_number(&once), once, "input {:?}", raw);
        }
        assert_eq!(coerce_integer_string("3.0"), "3");
        assert_eq!(coerce_integer_string(""), "0");
        assert_eq!(coerce_test_number(""), "");
        assert_eq!(coerce_test_number("8.0"), "8");
        assert_eq!(coerce_test_number("junk"), "0");
    }

    #[test]
    fn test_float_test_number_from_comments() {
        let t = table(
            &quantstudio_columns(),
            &[&["1", "A1", "S1", "T", "12.0", "FAM", "0.2", "", "", "20.1"]],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows[0].test_number, "12");
        assert_eq!(rows[0].baseline_start, "0");
        assert_eq!(rows[0].baseline_end, "0");
    }

    #[test]
    fn test_empty_comments_keeps_row_without_test_number() {
        let t = table(
            &quantstudio_columns(),
            &[&["1", "A1", "S1", "T", "", "FAM", "0.2", "3", "15", "20.1"]],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows[0].test_number, "");
        assert!(!rows[0].has_test_number());
    }

    #[test]
    fn test_sample_without_at_keeps_full_name() {
        let t = table(
            &[
                "Well Position",
                "Sample Name",
                "Target Name",
                "Reporter",
                "Ct Threshold",
                "Baseline Start",
                "Baseline End",
                "Ct",
            ],
            &[&["A1", "PlainSample", "T", "FAM", "0.2", "3", "15", "20.1"]],
        );
        let rows = normalize_table(&t, &NormalizationConfig::default()).unwrap();
        assert_eq!(rows[0].sample_name, "PlainSample");
        assert_eq!(rows[0].test_number, "");
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let t = table(
            &["Well", "Sample Name", "Target Name", "Reporter"],
            &[&["1", "S1", "T", "FAM"]],
        );
        let err = normalize_table(&t, &NormalizationConfig::default()).unwrap_err();
        assert!(matches!(err, PcrError::Schema { ref column } if column == "ct threshold"));
    }

    #[test]
    fn test_missing_sample_name_column_is_schema_error() {
        let t = table(&["Well", "Target Name"], &[&["1", "T"]]);
        let err = normalize_table(&t, &NormalizationConfig::default()).unwrap_err();
        assert!(matches!(err, PcrError::Schema { ref column } if column == "sample name"));
    }
}
