//! Record decoding and classification into per-document groups.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::taxonomy::Taxonomy;

/// Wire field carrying the monitor tag.
pub const TAG_FIELD: &str = "monitor_tag";
/// Wire field carrying the block heading.
pub const DESCRIPTION_FIELD: &str = "description";
/// Wire field carrying the base64 payload.
pub const PAYLOAD_FIELD: &str = "output";

/// Per-record problems. Logged and skipped, never fatal to the batch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },
    #[error("record {index} has no string `monitor_tag`")]
    MissingTag { index: usize },
    #[error("record {index} has a non-string `{field}`")]
    InvalidField { index: usize, field: &'static str },
    #[error("record {index} tag `{tag}` is not in the taxonomy")]
    UnknownTag { index: usize, tag: String },
}

/// One monitoring record from an ingested batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Position in the incoming batch.
    pub index: usize,
    pub tag: String,
    pub description: String,
    /// Base64 text; empty when the monitor produced nothing.
    pub payload: String,
    /// Remaining fields, carried opaquely.
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn from_value(index: usize, value: Value) -> Result<Self, RecordError> {
        let Value::Object(mut fields) = value else {
            return Err(RecordError::NotAnObject { index });
        };

        let tag = match fields.remove(TAG_FIELD) {
            Some(Value::String(tag)) if !tag.trim().is_empty() => tag,
            _ => return Err(RecordError::MissingTag { index }),
        };
        let description = optional_string(&mut fields, DESCRIPTION_FIELD, index)?;
        let payload = optional_string(&mut fields, PAYLOAD_FIELD, index)?;

        Ok(Self {
            index,
            tag,
            description,
            payload,
            extra: fields,
        })
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

fn optional_string(
    fields: &mut Map<String, Value>,
    field: &'static str,
    index: usize,
) -> Result<String, RecordError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(RecordError::InvalidField { index, field }),
    }
}

/// Decode a batch, skipping malformed entries.
///
/// Returns the valid records in arrival order and the per-record errors.
pub fn decode_batch(batch: Vec<Value>) -> (Vec<Record>, Vec<RecordError>) {
    let mut records = Vec::with_capacity(batch.len());
    let mut errors = Vec::new();
    for (index, value) in batch.into_iter().enumerate() {
        match Record::from_value(index, value) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed record");
                errors.push(err);
            }
        }
    }
    (records, errors)
}

/// Records grouped by document name, in arrival order within each group.
#[derive(Debug, Default)]
pub struct DocumentGroup<'a> {
    groups: HashMap<String, Vec<&'a Record>>,
    classified: usize,
    skipped: Vec<RecordError>,
}

impl<'a> DocumentGroup<'a> {
    pub fn records(&self, document_name: &str) -> &[&'a Record] {
        self.groups
            .get(document_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of records routed to at least one document.
    pub fn classified(&self) -> usize {
        self.classified
    }

    /// Records with no matching taxonomy tag.
    pub fn skipped(&self) -> &[RecordError] {
        &self.skipped
    }

    pub fn document_count(&self) -> usize {
        self.groups.len()
    }
}

/// Route each record to every document listing its tag.
///
/// The tag is first resolved against the taxonomy's tag union (first match,
/// ignoring case); the record then fans out to every entry containing it.
/// Unknown tags are logged and skipped.
pub fn classify<'a>(records: &'a [Record], taxonomy: &Taxonomy) -> DocumentGroup<'a> {
    let mut group = DocumentGroup::default();

    for record in records {
        let Some(tag) = taxonomy.resolve_tag(&record.tag) else {
            tracing::warn!(
                index = record.index,
                tag = %record.tag,
                "No taxonomy entry for monitor tag, skipping record"
            );
            group.skipped.push(RecordError::UnknownTag {
                index: record.index,
                tag: record.tag.clone(),
            });
            continue;
        };

        for entry in taxonomy.entries().iter().filter(|e| e.contains_tag(tag)) {
            group
                .groups
                .entry(entry.document_name.clone())
                .or_default()
                .push(record);
        }
        group.classified += 1;
    }

    for (document, items) in &group.groups {
        tracing::debug!(document = %document, records = items.len(), "Grouped records");
    }

    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::taxonomy::TaxonomyEntry;
    use serde_json::json;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            TaxonomyEntry {
                document_name: "health".into(),
                placement_path: "reports".into(),
                ordered_tags: vec!["cpu".into(), "mem".into()],
            },
            TaxonomyEntry {
                document_name: "capacity".into(),
                placement_path: "reports".into(),
                ordered_tags: vec!["disk".into(), "cpu".into()],
            },
        ])
        .unwrap()
    }

    fn record(index: usize, tag: &str) -> Record {
        Record::from_value(
            index,
            json!({"monitor_tag": tag, "description": format!("r{index}"), "output": ""}),
        )
        .unwrap()
    }

    #[test]
    fn decodes_wire_fields_and_keeps_extras() {
        let r = Record::from_value(
            3,
            json!({"monitor_tag": "cpu", "description": "CPU Load", "output": "OTUl", "command": "uptime"}),
        )
        .unwrap();
        assert_eq!(r.index, 3);
        assert_eq!(r.tag, "cpu");
        assert_eq!(r.description, "CPU Load");
        assert_eq!(r.payload, "OTUl");
        assert_eq!(r.extra.get("command"), Some(&json!("uptime")));
    }

    #[test]
    fn missing_payload_and_description_default_to_empty() {
        let r = Record::from_value(0, json!({"monitor_tag": "cpu"})).unwrap();
        assert!(r.description.is_empty());
        assert!(!r.has_payload());
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let (records, errors) = decode_batch(vec![
            json!("not an object"),
            json!({"description": "no tag"}),
            json!({"monitor_tag": 7}),
            json!({"monitor_tag": "cpu", "output": 12}),
            json!({"monitor_tag": "mem"}),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 4);
        assert_eq!(
            errors,
            vec![
                RecordError::NotAnObject { index: 0 },
                RecordError::MissingTag { index: 1 },
                RecordError::MissingTag { index: 2 },
                RecordError::InvalidField { index: 3, field: PAYLOAD_FIELD },
            ]
        );
    }

    #[test]
    fn fans_out_to_every_document_with_the_tag() {
        let records = vec![record(0, "cpu")];
        let group = classify(&records, &taxonomy());
        assert_eq!(group.records("health").len(), 1);
        assert_eq!(group.records("capacity").len(), 1);
        assert_eq!(group.classified(), 1);
    }

    #[test]
    fn unknown_tag_is_dropped() {
        let records = vec![record(0, "net"), record(1, "mem")];
        let group = classify(&records, &taxonomy());
        assert_eq!(group.classified(), 1);
        assert_eq!(group.records("health").len(), 1);
        assert!(group.records("capacity").is_empty());
        assert_eq!(
            group.skipped(),
            &[RecordError::UnknownTag { index: 0, tag: "net".into() }]
        );
    }

    #[test]
    fn tag_match_ignores_case() {
        let records = vec![record(0, "DISK"), record(1, "Cpu")];
        let group = classify(&records, &taxonomy());
        assert_eq!(group.records("capacity").len(), 2);
        assert_eq!(group.records("health").len(), 1);
    }

    #[test]
    fn groups_keep_arrival_order() {
        let records = vec![record(0, "mem"), record(1, "cpu"), record(2, "mem")];
        let group = classify(&records, &taxonomy());
        let indices: Vec<_> = group.records("health").iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn unknown_document_has_no_records() {
        let records = vec![record(0, "cpu")];
        let group = classify(&records, &taxonomy());
        assert!(group.records("missing").is_empty());
        assert_eq!(group.document_count(), 2);
    }
}
