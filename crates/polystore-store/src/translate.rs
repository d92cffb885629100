//! Shared translation plumbing for the database-backed adapters

use std::sync::Arc;

use polystore_schema::Translator;
use polystore_types::record::ID_FIELD;
use polystore_types::{Backend, Record, StoreError, StoreResult};

/// Look up the translator for a collection, erroring on unknown models
pub(crate) fn translator_for(
    collection: &str,
    backend: Backend,
) -> StoreResult<Arc<dyn Translator>> {
    polystore_schema::get_translator(collection, backend).ok_or_else(|| {
        StoreError::Translation(format!(
            "no translator registered for model '{}' on backend '{}'",
            collection, backend
        ))
    })
}

/// Translate a partial update. Translation fills generated fields, which a
/// patch must not carry unless the caller supplied them, so those are
/// stripped again. The identifier is never updatable.
pub(crate) fn to_native_patch(translator: &dyn Translator, patch: &Record) -> StoreResult<Record> {
    let mut native = translator.to_native(patch)?;
    native.remove(ID_FIELD);
    if !patch.contains("created_at") {
        native.remove("created_at");
    }
    Ok(native)
}

/// Reject table/column names that are not plain identifiers. Collection and
/// field names are interpolated into SQL text and must never carry quoting
/// or punctuation.
pub(crate) fn check_identifier(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_head && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Translation(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translator_lookup() {
        assert!(translator_for("users", Backend::Postgres).is_ok());
        assert!(translator_for("widgets", Backend::Postgres).is_err());
    }

    #[test]
    fn test_patch_translation_strips_generated_fields() {
        let translator = translator_for("notes", Backend::Postgres).unwrap();
        let patch = Record::new().with("title", "T2");

        let native = to_native_patch(translator.as_ref(), &patch).unwrap();

        assert!(!native.contains(ID_FIELD));
        assert!(!native.contains("created_at"));
        assert_eq!(native.get_str("title"), Some("T2"));
    }

    #[test]
    fn test_patch_translation_keeps_caller_supplied_timestamp() {
        let translator = translator_for("notes", Backend::Postgres).unwrap();
        let patch = Record::new().with("created_at", chrono::Utc::now());

        let native = to_native_patch(translator.as_ref(), &patch).unwrap();
        assert!(native.contains("created_at"));
    }

    #[test]
    fn test_identifier_check() {
        assert!(check_identifier("notes").is_ok());
        assert!(check_identifier("user_id").is_ok());
        assert!(check_identifier("_hidden").is_ok());
        assert!(check_identifier("1bad").is_err());
        assert!(check_identifier("t; DROP TABLE users").is_err());
        assert!(check_identifier("").is_err());
    }
}
