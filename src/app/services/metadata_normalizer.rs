//! Metadata normalization for instrument exports
//!
//! Maps instrument-specific metadata keys onto the canonical key set via the
//! configured rename table, coercing values on the way: file names lose
//! their directory components and run end times become absolute timestamps
//! in the configured reference zone.

use crate::app::models::CanonicalMetadata;
use crate::config::NormalizationConfig;
use crate::error::{PcrError, Result};
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

/// Candidate layouts for the extracted date/time core. Month-first orders
/// come first: the instrument families emit US-style dates.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

static DATETIME_RE: OnceLock<Regex> = OnceLock::new();

/// Reduce raw metadata pairs to the canonical metadata of one export
///
/// Source keys absent from the rename table are ignored; renamed keys
/// outside the required set (e.g. instrument serial numbers) are tolerated
/// and dropped. Fails naming the missing keys when the required set is
/// incomplete, and on unparsable run end times.
pub fn normalize_metadata(
    raw: &[(String, String)],
    config: &NormalizationConfig,
) -> Result<CanonicalMetadata> {
    let zone = config.reference_zone()?;

    let mut file_name = None;
    let mut instrument_type = None;
    let mut block_type = None;
    let mut run_end_time = None;

    for (key, value) in raw {
        let Some(canonical) = config.meta_key_map.get(key) else {
            continue;
        };
        match canonical.as_str() {
            "file_name" => file_name = Some(basename(value.trim())),
            "instrument_type" => instrument_type = Some(value.trim().to_string()),
            "block_type" => block_type = Some(value.trim().to_string()),
            "run_end_time" => run_end_time = Some(parse_run_end_time(value, zone)?),
            _ => {}
        }
    }

    match (file_name, instrument_type, block_type, run_end_time) {
        (Some(file_name), Some(instrument_type), Some(block_type), Some(run_end_time)) => {
            Ok(CanonicalMetadata {
                file_name,
                instrument_type,
                block_type,
                run_end_time,
            })
        }
        (file_name, instrument_type, block_type, run_end_time) => {
            let mut missing = Vec::new();
            if file_name.is_none() {
                missing.push("file_name");
            }
            if instrument_type.is_none() {
                missing.push("instrument_type");
            }
            if block_type.is_none() {
                missing.push("block_type");
            }
            if run_end_time.is_none() {
                missing.push("run_end_time");
            }
            Err(PcrError::MissingMetadataKeys {
                keys: missing.join(", "),
            })
        }
    }
}

/// Strip directory components, keeping the base filename only
///
/// The instruments run on Windows, so both separator styles occur.
fn basename(value: &str) -> String {
    value
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(value)
        .to_string()
}

/// Parse a free-form run end time into the reference zone
///
/// The instruments surround the timestamp with arbitrary text and report
/// local wall time with ambiguous zone abbreviations (CEST/CET), so the
/// date/time core is extracted by pattern and pinned to the configured
/// zone rather than trusting the abbreviation.
pub fn parse_run_end_time(value: &str, zone: Tz) -> Result<DateTime<Tz>> {
    let re = DATETIME_RE.get_or_init(|| {
        Regex::new(
            r"(\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4})\s+(\d{1,2}:\d{2}(?::\d{2})?)(\s*[APap][Mm])?",
        )
        .expect("static datetime regex")
    });

    let unparsable =
        || PcrError::metadata(format!("could not parse run end time '{}'", value.trim()));

    let caps = re.captures(value).ok_or_else(unparsable)?;
    let mut stamp = format!("{} {}", &caps[1], &caps[2]);
    if let Some(ampm) = caps.get(3) {
        stamp.push(' ');
        stamp.push_str(&ampm.as_str().trim().to_uppercase());
    }

    let naive = parse_naive(&stamp).ok_or_else(unparsable)?;

    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // DST fold: the instrument clock cannot tell us which side, take
        // the earlier instant
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(PcrError::metadata(format!(
            "run end time '{}' does not exist in {}",
            value.trim(),
            zone
        ))),
    }
}

fn parse_naive(stamp: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(stamp, fmt).ok())
}
