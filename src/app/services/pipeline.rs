//! Per-file processing pipeline and the quarantine boundary
//!
//! One file runs parse -> normalize -> merge -> write -> relocate to
//! completion. Any error along the way is caught at this boundary and the
//! file is quarantined with the reason; only a failure of the quarantine
//! move itself escalates, since without directory access no loop iteration
//! can proceed.

use crate::app::models::{FileOutcome, FileReport, MergedRecord};
use crate::app::services::artifact_writer::{relocate, write_artifacts};
use crate::app::services::export_parser::parse_export_file;
use crate::app::services::metadata_normalizer::normalize_metadata;
use crate::app::services::record_merger::merge_metadata;
use crate::app::services::table_normalizer::normalize_table;
use crate::config::Config;
use crate::error::{PcrError, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Sequential processing pipeline for instrument exports
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one file through the pipeline, writing artifacts and relocating
    /// the source into the processed directory on success
    pub fn process_file(&self, path: &Path) -> Result<FileReport> {
        info!("Parsing file: {}", file_name(path));
        let records = self.normalize_file(path)?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PcrError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unusable file name: {}", path.display()),
                ))
            })?;

        let written = write_artifacts(&records, stem, &self.config)?;
        relocate(path, &self.config.processed_dir())?;
        info!("Successfully processed and moved '{}'", file_name(path));

        Ok(FileReport {
            rows: records.len(),
            lims_rows: records.iter().filter(|r| r.row.has_test_number()).count(),
            artifacts: written.paths(),
        })
    }

    /// Parse and normalize one file without writing or moving anything
    pub fn inspect_file(&self, path: &Path) -> Result<Vec<MergedRecord>> {
        self.normalize_file(path)
    }

    fn normalize_file(&self, path: &Path) -> Result<Vec<MergedRecord>> {
        let raw = parse_export_file(path)?;
        let metadata = normalize_metadata(&raw.metadata, &self.config.normalization)?;
        let rows = normalize_table(&raw.table, &self.config.normalization)?;
        Ok(merge_metadata(rows, &metadata))
    }

    /// Quarantine a file that could not be processed
    pub fn quarantine(&self, path: &Path, reason: &str) -> Result<PathBuf> {
        error!(
            "Reason: {}. Moving '{}' to error directory.",
            reason,
            file_name(path)
        );
        relocate(path, &self.config.error_dir())
    }

    /// Process one file behind the per-file error boundary
    ///
    /// Every pipeline error becomes a quarantine; the returned error means
    /// the quarantine move itself failed and the watcher must stop.
    pub fn handle_file(&self, path: &Path) -> Result<FileOutcome> {
        match self.process_file(path) {
            Ok(report) => Ok(FileOutcome::Processed(report)),
            Err(err) => {
                let reason = err.to_string();
                self.quarantine(path, &reason)?;
                Ok(FileOutcome::Quarantined { reason })
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
