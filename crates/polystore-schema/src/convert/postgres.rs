//! PostgreSQL field codecs
//!
//! PostgreSQL has native UUID and array columns, so most fields pass through
//! untouched. The lenient array-literal parser exists because drivers and
//! older rows occasionally surface `TEXT[]` values as their `{a,b}` literal
//! form instead of a decoded array.

use polystore_types::{Record, Value};
use tracing::warn;

use super::{default_empty_tags, fill_generated_fields, widen_id_to_string};

/// Prepare an API record for PostgreSQL storage
pub fn prepare_record(record: &Record) -> Record {
    let mut native = record.clone();
    default_empty_tags(&mut native, "tags");
    default_empty_tags(&mut native, "permissions");
    fill_generated_fields(&mut native);
    native
}

/// Convert a PostgreSQL row back to the API shape
pub fn convert_record(record: &Record) -> Record {
    let mut api = record.clone();
    for field in ["tags", "permissions"] {
        if let Some(Value::String(raw)) = api.get(field) {
            let parsed = parse_array_literal(raw, field);
            api.set(field, parsed);
        }
    }
    widen_id_to_string(&mut api);
    api
}

/// Parse a PostgreSQL array literal (`{a,b}`) into a string list.
///
/// Lenient by design: JSON lists, comma-separated text and bare values are
/// accepted, and failures degrade to an empty list with a warning rather
/// than an error.
pub fn parse_array_literal(value: &str, field: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // Some callers hand us JSON-encoded lists; accept those first
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(trimmed) {
        return items
            .into_iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect();
    }

    if let Some(inner) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if inner.is_empty() {
            return Vec::new();
        }
        return inner
            .split(',')
            .map(|item| item.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace()))
            .filter(|item| !item.is_empty())
            .map(|item| item.to_string())
            .collect();
    }

    if trimmed.contains(',') {
        warn!(field, raw = value, "treating array field as comma-separated text");
        return trimmed
            .split(',')
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| item.to_string())
            .collect();
    }

    vec![trimmed.to_string()]
}

/// Generate an idempotent CREATE TABLE statement
pub fn create_table_statement(table: &str, columns: &[(&str, &str)], indexes: &[&str]) -> String {
    let column_defs = columns
        .iter()
        .map(|(name, ty)| format!("    {} {}", name, ty))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut statement = format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n);", table, column_defs);
    for index in indexes {
        statement.push('\n');
        statement.push_str(index);
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_literal_braced() {
        assert_eq!(parse_array_literal("{a,b}", "tags"), vec!["a", "b"]);
        assert_eq!(
            parse_array_literal("{\"x y\",z}", "tags"),
            vec!["x y", "z"]
        );
        assert!(parse_array_literal("{}", "tags").is_empty());
    }

    #[test]
    fn test_parse_array_literal_json_fallback() {
        assert_eq!(parse_array_literal("[\"a\",\"b\"]", "tags"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_array_literal_comma_separated() {
        assert_eq!(parse_array_literal("a, b,c", "tags"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_array_literal_single_value() {
        assert_eq!(parse_array_literal("solo", "tags"), vec!["solo"]);
        assert!(parse_array_literal("  ", "tags").is_empty());
    }

    #[test]
    fn test_convert_record_decodes_literal_tags() {
        let row = Record::new().with("id", "n-1").with("tags", "{a,b}");
        let api = convert_record(&row);
        assert_eq!(api.get_array("tags"), Some(&["a".to_string(), "b".to_string()][..]));
    }

    #[test]
    fn test_create_table_statement_is_idempotent() {
        let stmt = create_table_statement(
            "notes",
            &[("id", "UUID PRIMARY KEY"), ("title", "VARCHAR(255) NOT NULL")],
            &["CREATE INDEX IF NOT EXISTS idx_notes_title ON notes(title);"],
        );
        assert!(stmt.starts_with("CREATE TABLE IF NOT EXISTS notes"));
        assert!(stmt.contains("id UUID PRIMARY KEY"));
        assert!(stmt.contains("idx_notes_title"));
    }
}
