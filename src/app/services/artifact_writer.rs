//! Downstream artifact serialization and source relocation
//!
//! One merged record set fans out to up to four artifacts. The analysis TSV
//! always carries every row, including those without a test number, because
//! manual reconciliation happens there. Warehouse, LIMS import and LIMSML
//! only receive rows with a test number; the LIMS import additionally drops
//! presentation columns and display-maps the instrument type.

use crate::app::models::{display_instrument, MergedRecord};
use crate::app::services::limsml_builder::build_limsml;
use crate::config::Config;
use crate::constants::{
    analysis_filename, limsml_filename, warehouse_filename, LIMS_DROP_COLUMNS,
};
use crate::error::{PcrError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Paths of everything written for one source file
#[derive(Debug, Clone, Default)]
pub struct WrittenArtifacts {
    pub analysis: Option<PathBuf>,
    pub warehouse: Option<PathBuf>,
    pub lims_import: Option<PathBuf>,
    pub limsml: Option<PathBuf>,
}

impl WrittenArtifacts {
    pub fn paths(&self) -> Vec<PathBuf> {
        [&self.analysis, &self.warehouse, &self.lims_import, &self.limsml]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Write all artifacts for one source file's merged record set
pub fn write_artifacts(
    records: &[MergedRecord],
    stem: &str,
    config: &Config,
) -> Result<WrittenArtifacts> {
    let all_columns = MergedRecord::all_columns();
    let mut written = WrittenArtifacts::default();

    let analysis_path = config.analysis_dir().join(analysis_filename(stem));
    write_delimited(&analysis_path, b'\t', &all_columns, records.iter(), |column, record| {
        record.field(column)
    })?;
    written.analysis = Some(analysis_path);

    let lims_records: Vec<&MergedRecord> = records
        .iter()
        .filter(|r| r.row.has_test_number())
        .collect();

    if lims_records.is_empty() {
        debug!("No rows with a test number, analysis artifact only");
        return Ok(written);
    }

    let warehouse_path = config.warehouse_dir().join(warehouse_filename(stem));
    write_delimited(
        &warehouse_path,
        b',',
        &all_columns,
        lims_records.iter().copied(),
        |column, record| record.field(column),
    )?;
    written.warehouse = Some(warehouse_path);

    let lims_columns: Vec<&str> = all_columns
        .iter()
        .filter(|column| !LIMS_DROP_COLUMNS.contains(column))
        .copied()
        .collect();
    let lims_path = config
        .lims_import_dir()
        .join(config.lims.import_naming.filename(stem));
    write_delimited(
        &lims_path,
        b',',
        &lims_columns,
        lims_records.iter().copied(),
        |column, record| {
            if column == "instrument_type" {
                display_instrument(&config.lims.instrument_map, &record.metadata.instrument_type)
                    .to_string()
            } else {
                record.field(column)
            }
        },
    )?;
    written.lims_import = Some(lims_path);

    let limsml_path = config.lims_import_dir().join(limsml_filename(stem));
    let document = build_limsml(&lims_records, &config.lims.instrument_map)?;
    fs::write(&limsml_path, document)?;
    info!("LIMSML file created: {}", limsml_path.display());
    written.limsml = Some(limsml_path);

    Ok(written)
}

/// Serialize records to one delimited file with a header row
fn write_delimited<'a, I, F>(
    path: &Path,
    delimiter: u8,
    columns: &[&str],
    records: I,
    field: F,
) -> Result<()>
where
    I: IntoIterator<Item = &'a MergedRecord>,
    F: Fn(&str, &MergedRecord) -> String,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;

    writer.write_record(columns)?;
    for record in records {
        let row: Vec<String> = columns.iter().map(|column| field(column, record)).collect();
        writer.write_record(&row)?;
    }
    writer.flush().map_err(PcrError::Io)?;
    Ok(())
}

/// Move a file into a directory, keeping its name
///
/// Rename is atomic within one filesystem; across filesystems fall back to
/// copy then remove, so the source disappears only once the copy is
/// complete.
pub fn relocate(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = src.file_name().ok_or_else(|| {
        PcrError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("source path has no file name: {}", src.display()),
        ))
    })?;
    let dest = dest_dir.join(file_name);

    match fs::rename(src, &dest) {
        Ok(()) => Ok(dest),
        Err(_) => {
            fs::copy(src, &dest)?;
            fs::remove_file(src)?;
            Ok(dest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{CanonicalMetadata, CanonicalRow};
    use crate::config::LimsImportNaming;
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.directories.base_dir = dir.path().to_path_buf();
        config.ensure_directories().unwrap();
        config
    }

    fn record(sample: &str, test_number: &str) -> MergedRecord {
        let zone: Tz = "Europe/Stockholm".parse().unwrap();
        MergedRecord {
            row: CanonicalRow {
                well: "1".to_string(),
                well_position: "A1".to_string(),
                sample_name: sample.to_string(),
                target_name: "T".to_string(),
                test_number: test_number.to_string(),
                reporter: "FAM".to_string(),
                ct_threshold: Some(0.2),
                baseline_start: "3".to_string(),
                baseline_end: "15".to_string(),
                ct: None,
            },
            metadata: CanonicalMetadata {
                file_name: "plate42.eds".to_string(),
                instrument_type: "QuantStudio\u{2122} 6 Pro System".to_string(),
                block_type: "96-Well".to_string(),
                run_end_time: zone.with_ymd_and_hms(2025, 6, 10, 14, 32, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_analysis_keeps_rows_without_test_number() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let records = vec![record("S1", "7"), record("S2", "")];

        let written = write_artifacts(&records, "run1", &config).unwrap();

        let analysis = fs::read_to_string(written.analysis.unwrap()).unwrap();
        assert_eq!(analysis.lines().count(), 3); // header + both rows
        assert!(analysis.contains("S2"));
        assert!(analysis.starts_with("well\twell position\tsample name"));

        let warehouse = fs::read_to_string(written.warehouse.unwrap()).unwrap();
        assert_eq!(warehouse.lines().count(), 2); // header + S1 only
        assert!(!warehouse.contains("S2"));
    }

    #[test]
    fn test_lims_import_drops_presentation_columns() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let written = write_artifacts(&[record("S1", "7")], "run1", &config).unwrap();

        let lims_path = written.lims_import.unwrap();
        assert!(lims_path.ends_with("run1_import.csv"));
        let lims = fs::read_to_string(lims_path).unwrap();
        let header = lims.lines().next().unwrap();
        assert_eq!(
            header,
            "test number,reporter,ct threshold,baseline start,baseline end,ct,instrument_type"
        );
        assert!(lims.contains("QS6PRO"));
        assert!(!lims.contains("plate42.eds"));
    }

    #[test]
    fn test_lims_txt_naming_variant() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.lims.import_naming = LimsImportNaming::LimsTxt;

        let written = write_artifacts(&[record("S1", "7")], "run1", &config).unwrap();
        assert!(written.lims_import.unwrap().ends_with("run1_lims.txt"));
    }

    #[test]
    fn test_no_lims_artifacts_without_test_numbers() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let written = write_artifacts(&[record("S1", "")], "run1", &config).unwrap();

        assert!(written.analysis.is_some());
        assert!(written.warehouse.is_none());
        assert!(written.lims_import.is_none());
        assert!(written.limsml.is_none());
    }

    #[test]
    fn test_limsml_written_next_to_lims_import() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let written = write_artifacts(&[record("S1", "7")], "run1", &config).unwrap();

        let limsml = fs::read_to_string(written.limsml.unwrap()).unwrap();
        assert!(limsml.starts_with("<?xml"));
        assert!(limsml.contains("<entity type=\"TEST\">"));
    }

    #[test]
    fn test_relocate_preserves_bytes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("raw.txt");
        let dest_dir = dir.path().join("quarantine");
        fs::create_dir(&dest_dir).unwrap();
        fs::write(&src, b"exact bytes\x00\xff").unwrap();

        let dest = relocate(&src, &dest_dir).unwrap();

        assert!(!src.exists());
        assert_eq!(dest, dest_dir.join("raw.txt"));
        assert_eq!(fs::read(dest).unwrap(), b"exact bytes\x00\xff");
    }
}
