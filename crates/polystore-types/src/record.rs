//! Record and value types for the storage-access layer
//!
//! A [`Record`] is an ordered field-name → [`Value`] mapping representing one
//! stored entity. There is no fixed schema at this layer; fields are
//! determined by the caller and by the schema translators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The permissible value kinds a record field can hold.
///
/// Keeping this set closed lets translators be exhaustively type-checked
/// instead of probing attributes at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    // Timestamp precedes String so RFC 3339 text deserializes as a timestamp
    Timestamp(DateTime<Utc>),
    String(String),
    StringArray(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Equality check used by in-memory filtering. Identifier-typed fields
    /// are compared after widening to string, matching the contract that
    /// identifiers always surface as strings.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int(a), Value::String(b)) | (Value::String(b), Value::Int(a)) => {
                a.to_string() == *b
            }
            _ => self == other,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringArray(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::StringArray(items.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// One stored entity: an ordered mapping of field name to value.
///
/// Field order is deterministic (sorted by name) so generated statements and
/// parameter lists are stable across calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

/// The canonical identifier field name
pub const ID_FIELD: &str = "id";

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_array(&self, field: &str) -> Option<&[String]> {
        self.get(field).and_then(Value::as_array)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The record's identifier, always widened to string form
    pub fn id(&self) -> Option<String> {
        match self.get(ID_FIELD)? {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Overlay another record's fields onto this one (partial update merge)
    pub fn merge(&mut self, patch: &Record) {
        for (name, value) in patch.fields() {
            self.fields.insert(name.to_string(), value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder_and_accessors() {
        let record = Record::new()
            .with("title", "T")
            .with("is_active", true)
            .with("tags", vec!["a", "b"]);

        assert_eq!(record.get_str("title"), Some("T"));
        assert_eq!(record.get_bool("is_active"), Some(true));
        assert_eq!(
            record.get_array("tags"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_record_id_widens_to_string() {
        let record = Record::new().with("id", 42i64);
        assert_eq!(record.id(), Some("42".to_string()));

        let record = Record::new().with("id", "abc-123");
        assert_eq!(record.id(), Some("abc-123".to_string()));

        assert_eq!(Record::new().id(), None);
    }

    #[test]
    fn test_record_merge_replaces_supplied_fields_only() {
        let mut record = Record::new().with("title", "T").with("content", "body");
        let patch = Record::new().with("title", "T2");

        record.merge(&patch);

        assert_eq!(record.get_str("title"), Some("T2"));
        assert_eq!(record.get_str("content"), Some("body"));
    }

    #[test]
    fn test_value_loose_equality() {
        assert!(Value::from(1i64).loosely_equals(&Value::from("1")));
        assert!(Value::from("x").loosely_equals(&Value::from("x")));
        assert!(!Value::from("x").loosely_equals(&Value::from("y")));
        assert!(Value::Bool(true).loosely_equals(&Value::Bool(true)));
    }

    #[test]
    fn test_field_order_is_deterministic() {
        let record = Record::new().with("b", 1i64).with("a", 2i64).with("c", 3i64);
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_serde_round_trip() {
        let record = Record::new()
            .with("id", "n-1")
            .with("tags", vec!["x"])
            .with("created_at", Utc::now());

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_str("id"), Some("n-1"));
        assert_eq!(back.get_array("tags"), Some(&["x".to_string()][..]));
    }
}
