//! Configuration management and validation.
//!
//! All directory layout, polling, rename tables and logging options live in
//! one TOML document loaded at startup and passed explicitly into each
//! component, so every stage is testable with a synthetic configuration.

use crate::constants::DEFAULT_FILE_PATTERN;
use crate::error::{PcrError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration for the PCR export processor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub directories: Directories,
    pub watcher: WatcherConfig,
    pub normalization: NormalizationConfig,
    pub lims: LimsConfig,
    pub logging: LoggingConfig,
}

/// Directory layout, every path relative to `base_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Directories {
    /// Root under which all pipeline directories live
    pub base_dir: PathBuf,

    /// Inbound directory the watcher polls for raw instrument exports
    pub raw_dir: PathBuf,

    /// Raw files are relocated here after successful processing
    pub processed_dir: PathBuf,

    /// Warehouse CSV output
    pub warehouse_dir: PathBuf,

    /// Analysis TSV output
    pub analysis_dir: PathBuf,

    /// LIMS import CSV and LIMSML XML output
    pub lims_import_dir: PathBuf,

    /// Quarantine for files that failed parsing or normalization
    pub error_dir: PathBuf,

    /// Log file directory
    pub log_dir: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            raw_dir: PathBuf::from("input"),
            processed_dir: PathBuf::from("processed"),
            warehouse_dir: PathBuf::from("warehouse"),
            analysis_dir: PathBuf::from("analysis"),
            lims_import_dir: PathBuf::from("lims_import"),
            error_dir: PathBuf::from("error"),
            log_dir: PathBuf::from("log"),
        }
    }
}

/// Folder watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Seconds to sleep between inbound directory scans
    pub poll_interval_seconds: u64,

    /// Glob matched against inbound filenames
    pub file_pattern: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

/// Rename tables and timestamp handling for the normalizers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Instrument metadata key -> canonical metadata key
    pub meta_key_map: HashMap<String, String>,

    /// Instrument column name -> canonical column name
    pub column_map: HashMap<String, String>,

    /// IANA name of the reference zone run end times are normalized to.
    /// Instrument clocks report local wall time with ambiguous abbreviations
    /// (CEST/CET), so the zone must be pinned here.
    pub timezone: String,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        let meta_key_map = [
            ("File Name", "file_name"),
            ("Experiment File Name", "file_name"),
            ("Instrument Type", "instrument_type"),
            ("Instrument Serial Number", "instrument_serial_number"),
            ("Block Type", "block_type"),
            ("Experiment Run End Time", "run_end_time"),
            ("Run End Data/Time", "run_end_time"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let column_map = [("well", "well position"), ("comments", "test number")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            meta_key_map,
            column_map,
            timezone: "Europe/Stockholm".to_string(),
        }
    }
}

impl NormalizationConfig {
    /// Resolve the configured reference zone
    pub fn reference_zone(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            PcrError::configuration(format!("unknown timezone: {}", self.timezone))
        })
    }
}

/// Naming scheme for the LIMS import artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimsImportNaming {
    /// `{stem}_import.csv`
    ImportCsv,
    /// `{stem}_lims.txt`
    LimsTxt,
}

impl LimsImportNaming {
    pub fn filename(&self, stem: &str) -> String {
        match self {
            LimsImportNaming::ImportCsv => format!("{}_import.csv", stem),
            LimsImportNaming::LimsTxt => format!("{}_lims.txt", stem),
        }
    }
}

/// LIMS-facing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimsConfig {
    /// Instrument type as reported by the export -> LIMS display name.
    /// Unmapped instrument types pass through unchanged.
    pub instrument_map: HashMap<String, String>,

    /// Filename scheme of the LIMS import artifact
    pub import_naming: LimsImportNaming,
}

impl Default for LimsConfig {
    fn default() -> Self {
        let instrument_map = [
            ("QuantStudio\u{2122} 6 Pro System", "QS6PRO"),
            ("QuantStudio\u{2122} 6 Flex System", "QS6FLEX"),
            ("StepOnePlus\u{2122} Instrument", "STEPONE"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            instrument_map,
            import_naming: LimsImportNaming::ImportCsv,
        }
    }
}

/// Logging level and optional file destination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("pcr_processor.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            PcrError::configuration(format!(
                "failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| PcrError::configuration(format!("failed to parse TOML: {}", e)))?;

        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check the configuration for values no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.watcher.poll_interval_seconds == 0 {
            return Err(PcrError::configuration(
                "poll_interval_seconds must be greater than 0",
            ));
        }
        if self.watcher.file_pattern.trim().is_empty() {
            return Err(PcrError::configuration("file_pattern must not be empty"));
        }
        self.normalization.reference_zone()?;
        Ok(())
    }

    /// Create every configured directory that is missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.raw_dir(),
            self.processed_dir(),
            self.warehouse_dir(),
            self.analysis_dir(),
            self.lims_import_dir(),
            self.error_dir(),
            self.log_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.directories.base_dir.join(&self.directories.raw_dir)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.directories
            .base_dir
            .join(&self.directories.processed_dir)
    }

    pub fn warehouse_dir(&self) -> PathBuf {
        self.directories
            .base_dir
            .join(&self.directories.warehouse_dir)
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.directories
            .base_dir
            .join(&self.directories.analysis_dir)
    }

    pub fn lims_import_dir(&self) -> PathBuf {
        self.directories
            .base_dir
            .join(&self.directories.lims_import_dir)
    }

    pub fn error_dir(&self) -> PathBuf {
        self.directories.base_dir.join(&self.directories.error_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.directories.base_dir.join(&self.directories.log_dir)
    }
}
