//! Record type and typed record transforms
//!
//! A [`Record`] is one row of the source table: an ordered mapping of field
//! name to scalar value. Field encounter order is preserved end to end so
//! output columns come out in the same order they went in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::utils::error::{PipelineError, Result};

/// Field name reserved for the pipeline-assigned unique key
pub const ID_FIELD: &str = "id";

/// One source row: ordered field name -> scalar value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub IndexMap<String, Value>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field value, appending new fields at the end
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Whether the record carries the named field
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field value as a string slice, if present and a string
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// The pipeline-assigned record key
    ///
    /// Errors if the record was never keyed. Callers that reach this point
    /// rely on [`Transform::AssignIds`] having run first.
    pub fn id(&self) -> Result<&str> {
        self.str_field(ID_FIELD)
            .ok_or_else(|| PipelineError::Validation("record is missing its `id` field".into()))
    }

    /// Whether a field is missing, null, or an empty/whitespace string
    pub fn is_blank(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    /// Shallow merge: fields of `other` override fields of `self`
    ///
    /// Existing fields keep their original position; new fields are
    /// appended in `other`'s order.
    pub fn merge_from(&mut self, other: Record) {
        for (field, value) in other.0 {
            self.0.insert(field, value);
        }
    }

    /// Iterate fields in encounter order
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One step of the pre-submission record pipeline
///
/// Steps are applied in sequence, each taking and returning the full record
/// set, so the transformation order is explicit at the call site.
#[derive(Debug, Clone)]
pub enum Transform {
    /// Assign every record a fresh unique `id`
    AssignIds,
    /// Drop the named columns; absent columns are ignored
    RemoveColumns(Vec<String>),
    /// Keep only the first N records (0 = unlimited)
    Limit(usize),
}

/// Apply an ordered sequence of transforms to a record set
pub fn apply_transforms(records: Vec<Record>, transforms: &[Transform]) -> Vec<Record> {
    let mut records = records;
    for transform in transforms {
        records = match transform {
            Transform::AssignIds => assign_ids(records),
            Transform::RemoveColumns(columns) => remove_columns(records, columns),
            Transform::Limit(count) => limit(records, *count),
        };
    }
    records
}

fn assign_ids(mut records: Vec<Record>) -> Vec<Record> {
    for record in &mut records {
        record.insert(ID_FIELD, Value::String(Uuid::new_v4().to_string()));
    }
    records
}

fn remove_columns(mut records: Vec<Record>, columns: &[String]) -> Vec<Record> {
    warn!(?columns, "removing columns from input records");
    for record in &mut records {
        for column in columns {
            // shift_remove keeps the remaining fields in encounter order
            record.0.shift_remove(column);
        }
    }
    records
}

fn limit(mut records: Vec<Record>, count: usize) -> Vec<Record> {
    if count > 0 && records.len() > count {
        records.truncate(count);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn assign_ids_are_pairwise_distinct() {
        let records = vec![Record::new(); 50];
        let keyed = apply_transforms(records, &[Transform::AssignIds]);

        let ids: HashSet<String> = keyed
            .iter()
            .map(|r| r.id().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn remove_columns_tolerates_missing_fields() {
        let records = vec![
            record(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]),
            record(&[("a", json!(4))]),
        ];
        let out = apply_transforms(
            records,
            &[Transform::RemoveColumns(vec!["b".into(), "missing".into()])],
        );

        assert_eq!(out[0], record(&[("a", json!(1)), ("c", json!(3))]));
        assert_eq!(out[1], record(&[("a", json!(4))]));
    }

    #[test]
    fn remove_columns_preserves_field_order() {
        let records = vec![record(&[
            ("a", json!(1)),
            ("b", json!(2)),
            ("c", json!(3)),
            ("d", json!(4)),
        ])];
        let out = apply_transforms(records, &[Transform::RemoveColumns(vec!["b".into()])]);

        let fields: Vec<&str> = out[0].iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(fields, vec!["a", "c", "d"]);
    }

    #[test]
    fn limit_zero_means_unlimited() {
        let records = vec![Record::new(); 5];
        assert_eq!(apply_transforms(records.clone(), &[Transform::Limit(0)]).len(), 5);
        assert_eq!(apply_transforms(records, &[Transform::Limit(2)]).len(), 2);
    }

    #[test]
    fn merge_from_parsed_values_win() {
        let mut original = record(&[("id", json!("2")), ("sale_price", json!("3.99"))]);
        let parsed = record(&[("sale_price", json!(3.99)), ("promo_price", json!(1.99))]);

        original.merge_from(parsed);

        assert_eq!(
            original,
            record(&[
                ("id", json!("2")),
                ("sale_price", json!(3.99)),
                ("promo_price", json!(1.99)),
            ])
        );
    }

    #[test]
    fn is_blank_covers_missing_null_and_whitespace() {
        let r = record(&[("a", json!("")), ("b", json!("  ")), ("c", json!(null)), ("d", json!("x"))]);
        assert!(r.is_blank("a"));
        assert!(r.is_blank("b"));
        assert!(r.is_blank("c"));
        assert!(r.is_blank("missing"));
        assert!(!r.is_blank("d"));
    }

    #[test]
    fn id_errors_when_record_is_unkeyed() {
        let r = record(&[("name", json!("widget"))]);
        assert!(r.id().is_err());
    }
}
