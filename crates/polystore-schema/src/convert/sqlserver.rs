//! SQL Server field codecs
//!
//! SQL Server has no native array type, so list-valued fields travel as
//! JSON-encoded `NVARCHAR(MAX)` text and must be decoded on every read.

use polystore_types::{Record, StoreResult, Value};
use tracing::warn;

use super::{fill_generated_fields, widen_id_to_string};

/// Prepare an API record for SQL Server storage: list fields become JSON
/// text, generated fields are filled.
pub fn prepare_record(record: &Record) -> StoreResult<Record> {
    let mut native = record.clone();
    for field in ["tags", "permissions"] {
        match native.get(field) {
            Some(Value::StringArray(items)) => {
                let encoded = serde_json::to_string(items)?;
                native.set(field, encoded);
            }
            Some(Value::Null) => native.set(field, "[]"),
            _ => {}
        }
    }
    fill_generated_fields(&mut native);
    Ok(native)
}

/// Convert a SQL Server row back to the API shape
pub fn convert_record(record: &Record) -> Record {
    let mut api = record.clone();
    for field in ["tags", "permissions"] {
        if let Some(Value::String(raw)) = api.get(field) {
            let parsed = parse_json_list(raw, field);
            api.set(field, parsed);
        }
    }
    widen_id_to_string(&mut api);
    api
}

/// Parse a JSON-encoded string list with lenient fallbacks: comma-separated
/// text and bare values are accepted; failures degrade to an empty list.
pub fn parse_json_list(value: &str, field: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => {
            return items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
        }
        Ok(serde_json::Value::String(s)) => return vec![s],
        Ok(_) | Err(_) => {}
    }

    warn!(field, raw = value, "list column is not valid JSON, using lenient parse");
    if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| item.to_string())
            .collect()
    } else {
        vec![trimmed.to_string()]
    }
}

/// Generate an idempotent CREATE TABLE statement (sysobjects guard)
pub fn create_table_statement(table: &str, columns: &[(&str, &str)], indexes: &[&str]) -> String {
    let column_defs = columns
        .iter()
        .map(|(name, ty)| format!("    {} {}", name, ty))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut statement = format!(
        "IF NOT EXISTS (SELECT * FROM sysobjects WHERE name='{}' AND xtype='U')\nCREATE TABLE {} (\n{}\n);",
        table, table, column_defs
    );
    for index in indexes {
        statement.push('\n');
        statement.push_str(index);
    }
    statement
}

/// Idempotent index-creation clause
pub fn index_statement(table: &str, index: &str, column: &str) -> String {
    format!(
        "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = '{}' AND object_id = OBJECT_ID('{}'))\nCREATE INDEX {} ON {}({});",
        index, table, index, table, column
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_encodes_lists_as_json() {
        let record = Record::new().with("tags", vec!["a", "b"]);
        let native = prepare_record(&record).unwrap();
        assert_eq!(native.get_str("tags"), Some("[\"a\",\"b\"]"));
    }

    #[test]
    fn test_prepare_null_list_becomes_empty_json() {
        let record = Record::new().with("tags", Value::Null);
        let native = prepare_record(&record).unwrap();
        assert_eq!(native.get_str("tags"), Some("[]"));
    }

    #[test]
    fn test_parse_json_list() {
        assert_eq!(parse_json_list("[\"a\",\"b\"]", "tags"), vec!["a", "b"]);
        assert!(parse_json_list("[]", "tags").is_empty());
        assert!(parse_json_list("", "tags").is_empty());
    }

    #[test]
    fn test_parse_json_list_lenient_fallbacks() {
        assert_eq!(parse_json_list("a, b", "tags"), vec!["a", "b"]);
        assert_eq!(parse_json_list("solo", "tags"), vec!["solo"]);
    }

    #[test]
    fn test_round_trip_through_json_text() {
        let record = Record::new().with("id", "n-1").with("tags", vec!["x", "y"]);
        let native = prepare_record(&record).unwrap();
        let back = convert_record(&native);
        assert_eq!(back.get_array("tags"), Some(&["x".to_string(), "y".to_string()][..]));
    }

    #[test]
    fn test_create_table_statement_guarded() {
        let stmt = create_table_statement(
            "notes",
            &[("id", "NVARCHAR(50) PRIMARY KEY")],
            &[&index_statement("notes", "IDX_notes_title", "title")],
        );
        assert!(stmt.contains("IF NOT EXISTS (SELECT * FROM sysobjects WHERE name='notes'"));
        assert!(stmt.contains("IDX_notes_title"));
    }
}
