//! LIMSML document assembly
//!
//! Groups the merged records of one export by test number and emits the
//! LIMS interface's SAMPLE -> TEST -> RESULT hierarchy: one TEST entity per
//! test number in first-seen order, one RESULT entity per (row, measurement)
//! pair named `{Measurement Label}_{reporter}`. The document carries the
//! fixed RESULT_ENTRY action and a trailing empty `errors` element the LIMS
//! populates on round-trip.

use crate::app::models::{display_instrument, MergedRecord};
use crate::constants::LIMSML_MEASUREMENTS;
use crate::error::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashMap;
use std::io::Cursor;
use std::io::Write;

/// Build the LIMSML document for one export's LIMS-bound records
///
/// Callers pass rows with non-empty test numbers only; the builder itself
/// does not filter.
pub fn build_limsml(
    records: &[&MergedRecord],
    instrument_map: &HashMap<String, String>,
) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("limsml")))?;
    writer.write_event(Event::Empty(BytesStart::new("header")))?;
    writer.write_event(Event::Start(BytesStart::new("body")))?;

    let mut transaction = BytesStart::new("transaction");
    transaction.push_attribute(("response_type", "system"));
    writer.write_event(Event::Start(transaction))?;
    writer.write_event(Event::Start(BytesStart::new("system")))?;

    let mut sample = BytesStart::new("entity");
    sample.push_attribute(("type", "SAMPLE"));
    writer.write_event(Event::Start(sample))?;

    write_sample_actions(&mut writer)?;

    writer.write_event(Event::Start(BytesStart::new("children")))?;
    for (test_number, group) in group_by_test_number(records) {
        write_test_entity(&mut writer, &test_number, &group, instrument_map)?;
    }
    writer.write_event(Event::End(BytesEnd::new("children")))?;

    writer.write_event(Event::End(BytesEnd::new("entity")))?;
    writer.write_event(Event::End(BytesEnd::new("system")))?;
    writer.write_event(Event::End(BytesEnd::new("transaction")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::Empty(BytesStart::new("errors")))?;
    writer.write_event(Event::End(BytesEnd::new("limsml")))?;

    Ok(writer.into_inner().into_inner())
}

/// Group records by test number, preserving first-seen order
fn group_by_test_number<'a>(
    records: &[&'a MergedRecord],
) -> Vec<(String, Vec<&'a MergedRecord>)> {
    let mut groups: Vec<(String, Vec<&MergedRecord>)> = Vec::new();
    for &record in records {
        match groups
            .iter_mut()
            .find(|(test_number, _)| *test_number == record.row.test_number)
        {
            Some((_, group)) => group.push(record),
            None => groups.push((record.row.test_number.clone(), vec![record])),
        }
    }
    groups
}

/// The fixed SAMPLE-level RESULT_ENTRY action with both train-reason flags
fn write_sample_actions<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("actions")))?;
    writer.write_event(Event::Start(BytesStart::new("action")))?;

    writer.write_event(Event::Start(BytesStart::new("command")))?;
    writer.write_event(Event::Text(BytesText::new("RESULT_ENTRY")))?;
    writer.write_event(Event::End(BytesEnd::new("command")))?;

    write_parameter(writer, "ANAL_TRAIN_REASON", "TRUE")?;
    write_parameter(writer, "INST_TRAIN_REASON", "TRUE")?;

    writer.write_event(Event::End(BytesEnd::new("action")))?;
    writer.write_event(Event::End(BytesEnd::new("actions")))?;
    Ok(())
}

fn write_test_entity<W: Write>(
    writer: &mut Writer<W>,
    test_number: &str,
    group: &[&MergedRecord],
    instrument_map: &HashMap<String, String>,
) -> Result<()> {
    let mut entity = BytesStart::new("entity");
    entity.push_attribute(("type", "TEST"));
    writer.write_event(Event::Start(entity))?;
    writer.write_event(Event::Empty(BytesStart::new("actions")))?;

    writer.write_event(Event::Start(BytesStart::new("fields")))?;
    write_field(writer, "TEST_NUMBER", test_number)?;
    // all rows of a group come from one file, the first row's instrument
    // stands for the group
    let instrument = display_instrument(instrument_map, &group[0].metadata.instrument_type);
    write_field(writer, "INSTRUMENT", instrument)?;
    writer.write_event(Event::End(BytesEnd::new("fields")))?;

    writer.write_event(Event::Start(BytesStart::new("children")))?;
    for record in group {
        for (label, column) in LIMSML_MEASUREMENTS {
            let name = format!("{}_{}", label, record.row.reporter);
            let value = record.row.field(column);
            write_result_entity(writer, &name, &value)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("children")))?;

    writer.write_event(Event::End(BytesEnd::new("entity")))?;
    Ok(())
}

fn write_result_entity<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    let mut entity = BytesStart::new("entity");
    entity.push_attribute(("type", "RESULT"));
    writer.write_event(Event::Start(entity))?;
    writer.write_event(Event::Empty(BytesStart::new("actions")))?;

    writer.write_event(Event::Start(BytesStart::new("fields")))?;
    write_field(writer, "NAME", name)?;
    write_field(writer, "TEXT", value)?;
    writer.write_event(Event::End(BytesEnd::new("fields")))?;

    writer.write_event(Event::End(BytesEnd::new("entity")))?;
    Ok(())
}

fn write_field<W: Write>(writer: &mut Writer<W>, id: &str, text: &str) -> Result<()> {
    let mut field = BytesStart::new("field");
    field.push_attribute(("id", id));
    field.push_attribute(("direction", "in"));
    writer.write_event(Event::Start(field))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("field")))?;
    Ok(())
}

fn write_parameter<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    let mut parameter = BytesStart::new("parameter");
    parameter.push_attribute(("name", name));
    writer.write_event(Event::Start(parameter))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("parameter")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{CanonicalMetadata, CanonicalRow};
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn record(test_number: &str, reporter: &str) -> MergedRecord {
        let zone: Tz = "Europe/Stockholm".parse().unwrap();
        MergedRecord {
            row: CanonicalRow {
                well: "1".to_string(),
                well_position: "A1".to_string(),
                sample_name: "S1".to_string(),
                target_name: "T".to_string(),
                test_number: test_number.to_string(),
                reporter: reporter.to_string(),
                ct_threshold: Some(0.2),
                baseline_start: "3".to_string(),
                baseline_end: "15".to_string(),
                ct: Some(99.0),
            },
            metadata: CanonicalMetadata {
                file_name: "plate42.eds".to_string(),
                instrument_type: "QuantStudio\u{2122} 6 Pro System".to_string(),
                block_type: "96-Well".to_string(),
                run_end_time: zone.with_ymd_and_hms(2025, 6, 10, 14, 32, 0).unwrap(),
            },
        }
    }

    fn build(records: &[MergedRecord]) -> String {
        let refs: Vec<&MergedRecord> = records.iter().collect();
        let mut map = HashMap::new();
        map.insert(
            "QuantStudio\u{2122} 6 Pro System".to_string(),
            "QS6PRO".to_string(),
        );
        String::from_utf8(build_limsml(&refs, &map).unwrap()).unwrap()
    }

    #[test]
    fn test_two_tests_two_reporters() {
        // {"1","2"} x {"FAM","VIC"}: 2 TEST entities, 8 RESULT entities each
        let records = vec![
            record("1", "FAM"),
            record("1", "VIC"),
            record("2", "FAM"),
            record("2", "VIC"),
        ];
        let xml = build(&records);

        assert_eq!(xml.matches("<entity type=\"TEST\">").count(), 2);
        assert_eq!(xml.matches("<entity type=\"RESULT\">").count(), 16);
        assert!(xml.contains("<field id=\"TEST_NUMBER\" direction=\"in\">1</field>"));
        assert!(xml.contains("<field id=\"TEST_NUMBER\" direction=\"in\">2</field>"));

        // first-seen order
        let pos1 = xml.find(">1</field>").unwrap();
        let pos2 = xml.find(">2</field>").unwrap();
        assert!(pos1 < pos2);

        // four measurements per reporter
        for name in [
            "Ct Threshold_FAM",
            "Baseline Start_FAM",
            "Baseline End_FAM",
            "Ct_FAM",
            "Ct_VIC",
        ] {
            assert!(
                xml.contains(&format!("<field id=\"NAME\" direction=\"in\">{}</field>", name)),
                "missing result name {}",
                name
            );
        }
    }

    #[test]
    fn test_fixed_skeleton() {
        let xml = build(&[record("1", "FAM")]);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<limsml>"));
        assert!(xml.contains("<header/>"));
        assert!(xml.contains("<transaction response_type=\"system\">"));
        assert!(xml.contains("<entity type=\"SAMPLE\">"));
        assert!(xml.contains("<command>RESULT_ENTRY</command>"));
        assert!(xml.contains("<parameter name=\"ANAL_TRAIN_REASON\">TRUE</parameter>"));
        assert!(xml.contains("<parameter name=\"INST_TRAIN_REASON\">TRUE</parameter>"));
        assert!(xml.ends_with("<errors/></limsml>"));
    }

    #[test]
    fn test_instrument_display_mapping() {
        let xml = build(&[record("1", "FAM")]);
        assert!(xml.contains("<field id=\"INSTRUMENT\" direction=\"in\">QS6PRO</field>"));
    }

    #[test]
    fn test_sentinel_ct_stringified() {
        let xml = build(&[record("1", "FAM")]);
        assert!(xml.contains("<field id=\"TEXT\" direction=\"in\">99.0</field>"));
    }
}
