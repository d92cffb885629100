//! Backend-specific field codecs shared by the translators

pub mod mongodb;
pub mod postgres;
pub mod sqlserver;

use chrono::Utc;
use polystore_types::record::ID_FIELD;
use polystore_types::{Record, Value};
use uuid::Uuid;

/// Fill the generated fields every backend-native record carries: a v4 UUID
/// identifier when the caller supplied none, and a `created_at` timestamp.
pub(crate) fn fill_generated_fields(record: &mut Record) {
    if !record.contains(ID_FIELD) {
        record.set(ID_FIELD, Uuid::new_v4().to_string());
    }
    if !record.contains("created_at") {
        record.set("created_at", Utc::now());
    }
}

/// Replace a null (or absent) `tags` field with an empty array
pub(crate) fn default_empty_tags(record: &mut Record, field: &str) {
    if matches!(record.get(field), Some(value) if value.is_null()) {
        record.set(field, Vec::<String>::new());
    }
}

/// Widen the identifier to string form on the way out of a backend
pub(crate) fn widen_id_to_string(record: &mut Record) {
    if let Some(Value::Int(i)) = record.get(ID_FIELD) {
        let widened = i.to_string();
        record.set(ID_FIELD, widened);
    }
}
