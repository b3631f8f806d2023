//! Read-only reports over a loaded collection.

use crate::api::InferredSchema;
use crate::types::{FieldType, FieldValue, Record, ID_FIELD};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// A shape problem found in one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    MissingId {
        index: usize,
    },
    DuplicateId {
        index: usize,
        id: String,
    },
    TypeMismatch {
        index: usize,
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    MissingField {
        index: usize,
        field: String,
    },
    ExtraField {
        index: usize,
        field: String,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingId { index } => write!(f, "record {}: missing id", index),
            Issue::DuplicateId { index, id } => {
                write!(f, "record {}: duplicate id '{}'", index, id)
            }
            Issue::TypeMismatch {
                index,
                field,
                expected,
                found,
            } => write!(
                f,
                "record {}: field '{}' expected {}, got {}",
                index, field, expected, found
            ),
            Issue::MissingField { index, field } => {
                write!(f, "record {}: missing field '{}'", index, field)
            }
            Issue::ExtraField { index, field } => {
                write!(f, "record {}: field '{}' not in schema", index, field)
            }
        }
    }
}

/// Outcome of checking every record against the first one's shape.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub records: usize,
    pub schema: InferredSchema,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check shape consistency: ids present and unique, and every record
/// carrying exactly the fields of the first, with compatible types.
pub fn validate_records(records: &[Record]) -> ValidationReport {
    let schema = InferredSchema::infer(records);
    let mut issues = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        match record.id_key() {
            Some(id) => {
                if !seen_ids.insert(id.clone()) {
                    issues.push(Issue::DuplicateId { index, id });
                }
            }
            None => issues.push(Issue::MissingId { index }),
        }

        for (field, expected) in schema.fields() {
            match record.get(field) {
                Some(value) if !expected.accepts(value) => issues.push(Issue::TypeMismatch {
                    index,
                    field: field.clone(),
                    expected: *expected,
                    found: value.kind(),
                }),
                Some(_) => {}
                // reported as MissingId above
                None if field == ID_FIELD => {}
                None => issues.push(Issue::MissingField {
                    index,
                    field: field.clone(),
                }),
            }
        }

        for field in record.fields() {
            if schema.field_type(field).is_none() {
                issues.push(Issue::ExtraField {
                    index,
                    field: field.to_string(),
                });
            }
        }
    }

    if !issues.is_empty() {
        warn!(
            records = records.len(),
            issues = issues.len(),
            "collection shape drifts from its first record"
        );
    }

    ValidationReport {
        records: records.len(),
        schema,
        issues,
    }
}

/// How often one value occurs in a field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: FieldValue,
    pub count: usize,
}

/// Value statistics for one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldSummary {
    /// Records carrying the field.
    pub present: usize,
    /// Distinct values, compared by their match key.
    pub distinct: usize,
    /// Most frequent values, most frequent first.
    pub top: Vec<ValueCount>,
}

/// Record count and per-field value frequencies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub fields: IndexMap<String, FieldSummary>,
}

/// Summarize a collection, keeping the `top` most frequent values of each
/// field. Fields appear in first-seen order; ties keep first-seen order.
pub fn summarize(records: &[Record], top: usize) -> Summary {
    let mut tallies: IndexMap<String, IndexMap<String, ValueCount>> = IndexMap::new();

    for record in records {
        for (field, value) in record {
            let counts = tallies.entry(field.clone()).or_default();
            counts
                .entry(value.match_key())
                .or_insert_with(|| ValueCount {
                    value: value.clone(),
                    count: 0,
                })
                .count += 1;
        }
    }

    let fields = tallies
        .into_iter()
        .map(|(field, counts)| {
            let present = counts.values().map(|c| c.count).sum();
            let distinct = counts.len();
            let mut ranked: Vec<ValueCount> = counts.into_values().collect();
            // sort_by is stable, so ties keep first-seen order
            ranked.sort_by(|a, b| b.count.cmp(&a.count));
            ranked.truncate(top);

            (
                field,
                FieldSummary {
                    present,
                    distinct,
                    top: ranked,
                },
            )
        })
        .collect();

    Summary {
        count: records.len(),
        fields,
    }
}

/// Schema a collection would be served with.
pub fn schema_report(records: &[Record]) -> InferredSchema {
    InferredSchema::infer(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<Record> {
        crate::store::parse_records(&value.to_string()).unwrap()
    }

    #[test]
    fn test_consistent_collection_is_valid() {
        let report = validate_records(&records(json!([
            {"id": "1", "name": "a", "n": 1},
            {"id": "2", "name": "b", "n": 2.0}
        ])));

        assert!(report.is_valid(), "{:?}", report.issues);
        assert_eq!(report.records, 2);
    }

    #[test]
    fn test_validate_finds_each_issue_kind() {
        let report = validate_records(&records(json!([
            {"id": "1", "name": "a", "n": 1},
            {"id": "1", "name": "b", "n": 1},
            {"name": 3, "n": 1, "extra": true},
            {"id": "4", "name": "d"}
        ])));

        assert_eq!(
            report.issues,
            vec![
                Issue::DuplicateId { index: 1, id: "1".into() },
                Issue::MissingId { index: 2 },
                Issue::TypeMismatch {
                    index: 2,
                    field: "name".into(),
                    expected: FieldType::String,
                    found: "integer",
                },
                Issue::ExtraField { index: 2, field: "extra".into() },
                Issue::MissingField { index: 3, field: "n".into() },
            ]
        );
    }

    #[test]
    fn test_empty_collection_is_valid() {
        let report = validate_records(&[]);
        assert!(report.is_valid());
        assert_eq!(report.schema, InferredSchema::default());
    }

    #[test]
    fn test_summarize_frequencies() {
        let summary = summarize(
            &records(json!([
                {"id": "1", "status": "open"},
                {"id": "2", "status": "closed"},
                {"id": "3", "status": "open", "owner": "x"}
            ])),
            1,
        );

        assert_eq!(summary.count, 3);
        let fields: Vec<_> = summary.fields.keys().cloned().collect();
        assert_eq!(fields, vec!["id", "status", "owner"]);

        let status = &summary.fields["status"];
        assert_eq!(status.present, 3);
        assert_eq!(status.distinct, 2);
        assert_eq!(
            status.top,
            vec![ValueCount {
                value: FieldValue::from("open"),
                count: 2
            }]
        );
        assert_eq!(summary.fields["owner"].present, 1);
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::TypeMismatch {
            index: 4,
            field: "age".into(),
            expected: FieldType::Integer,
            found: "string",
        };
        assert_eq!(issue.to_string(), "record 4: field 'age' expected integer, got string");
    }
}
