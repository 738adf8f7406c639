//! PCR Export Processor Library
//!
//! A Rust library for ingesting tab-delimited export files from PCR
//! laboratory instruments, normalizing them into one canonical schema and
//! generating the downstream artifacts the lab systems consume.
//!
//! This library provides tools for:
//! - Parsing instrument exports with proper metadata/result section handling
//! - Reconciling three instrument families' metadata keys and column names
//!   into one required schema via configurable rename tables
//! - Coercing numeric result fields with a documented edge-case policy
//!   ("Undetermined" Ct values become a 99.0 sentinel)
//! - Writing analysis, warehouse and LIMS import artifacts plus the LIMSML
//!   XML document the LIMS imports
//! - Watching an inbound directory and quarantining malformed files without
//!   stopping the loop

pub mod config;
pub mod constants;
pub mod error;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod artifact_writer;
        pub mod export_parser;
        pub mod limsml_builder;
        pub mod metadata_normalizer;
        pub mod pipeline;
        pub mod record_merger;
        pub mod table_normalizer;
        pub mod watcher;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{
    CanonicalMetadata, CanonicalRow, MergedRecord, RawExport, ResultTable,
};
pub use config::Config;
pub use error::{PcrError, Result};
