//! MongoDB field codecs
//!
//! MongoDB stores arrays natively and assigns its own document object-ids;
//! the adapter maps `_id` to the string `id` field before records reach the
//! translators, so the codecs here only handle defaults.

use polystore_types::Record;

use super::{default_empty_tags, fill_generated_fields};

/// Prepare an API record for MongoDB storage
pub fn prepare_record(record: &Record) -> Record {
    let mut native = record.clone();
    default_empty_tags(&mut native, "tags");
    default_empty_tags(&mut native, "permissions");
    fill_generated_fields(&mut native);
    native
}

/// Convert a MongoDB document (already `_id`-normalized) to the API shape
pub fn convert_record(record: &Record) -> Record {
    record.clone()
}

/// Generate the createCollection command with a $jsonSchema validator.
///
/// Collection creation itself goes through the driver; the statement is kept
/// for provisioning logs and external tooling.
pub fn create_collection_statement(collection: &str, validator: &serde_json::Value) -> String {
    format!(
        "db.createCollection(\"{}\", {{ validator: {} }});",
        collection, validator
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use polystore_types::Value;

    #[test]
    fn test_prepare_defaults_tags_and_id() {
        let record = Record::new().with("title", "T").with("tags", Value::Null);
        let native = prepare_record(&record);
        assert_eq!(native.get_array("tags"), Some(&[][..]));
        assert!(native.get_str("id").is_some());
        assert!(native.get("created_at").is_some());
    }

    #[test]
    fn test_create_collection_statement() {
        let validator = serde_json::json!({
            "$jsonSchema": { "bsonType": "object", "required": ["id", "title"] }
        });
        let stmt = create_collection_statement("notes", &validator);
        assert!(stmt.starts_with("db.createCollection(\"notes\""));
        assert!(stmt.contains("$jsonSchema"));
    }
}
