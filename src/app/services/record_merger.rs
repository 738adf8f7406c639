//! Metadata broadcast onto normalized rows
//!
//! Pure and total: every row of a file receives that file's canonical
//! metadata, no row is dropped.

use crate::app::models::{CanonicalMetadata, CanonicalRow, MergedRecord};

/// Broadcast the file metadata onto every canonical row
pub fn merge_metadata(rows: Vec<CanonicalRow>, metadata: &CanonicalMetadata) -> Vec<MergedRecord> {
    rows.into_iter()
        .map(|row| MergedRecord {
            row,
            metadata: metadata.clone(),
        })
        .collect()
}
