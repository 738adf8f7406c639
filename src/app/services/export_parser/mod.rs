//! Parser for raw PCR instrument export files
//!
//! Instrument exports are plain text with a metadata block followed by a
//! tab-delimited result table. Metadata lines are prefixed `* ` or `# `
//! (QuantStudio vs. StepOne conventions) and end at the literal `[Results]`
//! marker; everything non-blank after the marker is table text.
//!
//! The parser only splits sections and tokenizes; all column and key
//! reconciliation happens in the normalizers.

pub mod parser;

pub use parser::{parse_export, parse_export_file};
