//! Error handling for PCR export processing.
//!
//! Three error kinds are recoverable at file granularity and lead to
//! quarantine: parse errors (malformed raw file structure), metadata errors
//! (unparsable timestamp, missing required keys) and schema errors (missing
//! required column after normalization). Everything else escalates.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PcrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid export format in file: {} - {}", path.display(), reason)]
    Parse { path: PathBuf, reason: String },

    #[error("malformed result table in file: {} - {}", path.display(), source)]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("metadata error: {reason}")]
    Metadata { reason: String },

    #[error("metadata missing required keys: {keys}")]
    MissingMetadataKeys { keys: String },

    #[error("required column '{column}' missing after normalization")]
    Schema { column: String },

    #[error("artifact write failed: {0}")]
    Artifact(#[from] csv::Error),

    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl PcrError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    pub fn schema(column: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PcrError>;
