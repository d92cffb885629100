//! Translators for the `users` model
//!
//! Users carry the boolean-polarity concern: PostgreSQL and MongoDB store
//! `is_active` directly, SQL Server stores the inverted `disabled` flag and
//! must negate on every read and write so the internal name never leaks.

use polystore_types::{Backend, Record, StoreResult, Value};

use crate::convert::{mongodb, postgres, sqlserver};
use crate::Translator;

const COLLECTION: &str = "users";

/// The API-level activity flag
pub const IS_ACTIVE: &str = "is_active";

/// SQL Server's inverted internal name for the activity flag
pub const DISABLED: &str = "disabled";

fn invert_to_disabled(record: &mut Record) {
    if let Some(active) = record.get_bool(IS_ACTIVE) {
        record.remove(IS_ACTIVE);
        record.set(DISABLED, !active);
    }
}

fn invert_to_is_active(record: &mut Record) {
    if let Some(disabled) = record.get_bool(DISABLED) {
        record.remove(DISABLED);
        record.set(IS_ACTIVE, !disabled);
    }
}

/// PostgreSQL users translator
pub struct UsersPostgres;

impl Translator for UsersPostgres {
    fn collection(&self) -> &'static str {
        COLLECTION
    }

    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn to_native(&self, record: &Record) -> StoreResult<Record> {
        Ok(postgres::prepare_record(record))
    }

    fn from_native(&self, record: &Record) -> StoreResult<Record> {
        Ok(postgres::convert_record(record))
    }

    fn create_statement(&self) -> String {
        postgres::create_table_statement(
            COLLECTION,
            &[
                ("id", "UUID PRIMARY KEY"),
                ("email", "VARCHAR(255) UNIQUE NOT NULL"),
                ("username", "VARCHAR(255) UNIQUE NOT NULL"),
                ("hashed_password", "VARCHAR(255) NOT NULL"),
                ("full_name", "VARCHAR(255)"),
                ("is_active", "BOOLEAN DEFAULT TRUE"),
                ("role", "VARCHAR(50) NOT NULL"),
                ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP"),
                ("updated_at", "TIMESTAMPTZ"),
            ],
            &[
                "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);",
                "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);",
            ],
        )
    }
}

/// SQL Server users translator (inverted `disabled` polarity)
pub struct UsersSqlServer;

impl Translator for UsersSqlServer {
    fn collection(&self) -> &'static str {
        COLLECTION
    }

    fn backend(&self) -> Backend {
        Backend::SqlServer
    }

    fn to_native(&self, record: &Record) -> StoreResult<Record> {
        let mut native = sqlserver::prepare_record(record)?;
        invert_to_disabled(&mut native);
        Ok(native)
    }

    fn from_native(&self, record: &Record) -> StoreResult<Record> {
        let mut api = sqlserver::convert_record(record);
        invert_to_is_active(&mut api);
        Ok(api)
    }

    fn create_statement(&self) -> String {
        sqlserver::create_table_statement(
            COLLECTION,
            &[
                ("id", "NVARCHAR(50) PRIMARY KEY"),
                ("email", "NVARCHAR(255) NOT NULL"),
                ("username", "NVARCHAR(255) NOT NULL"),
                ("hashed_password", "NVARCHAR(255) NOT NULL"),
                ("full_name", "NVARCHAR(255)"),
                ("disabled", "BIT DEFAULT 0"),
                ("role", "NVARCHAR(50) NOT NULL"),
                ("created_at", "DATETIME2 NOT NULL DEFAULT GETUTCDATE()"),
                ("updated_at", "DATETIME2"),
            ],
            &[
                &sqlserver::index_statement(COLLECTION, "IDX_users_email", "email"),
                &sqlserver::index_statement(COLLECTION, "IDX_users_username", "username"),
            ],
        )
    }
}

/// MongoDB users translator (`is_active` defaults to true when absent)
pub struct UsersMongoDb;

impl Translator for UsersMongoDb {
    fn collection(&self) -> &'static str {
        COLLECTION
    }

    fn backend(&self) -> Backend {
        Backend::MongoDb
    }

    fn to_native(&self, record: &Record) -> StoreResult<Record> {
        Ok(mongodb::prepare_record(record))
    }

    fn from_native(&self, record: &Record) -> StoreResult<Record> {
        let mut api = mongodb::convert_record(record);
        if api.get(IS_ACTIVE).map_or(true, Value::is_null) {
            api.set(IS_ACTIVE, true);
        }
        Ok(api)
    }

    fn create_statement(&self) -> String {
        let validator = serde_json::json!({
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["email", "username", "hashed_password", "role"],
                "properties": {
                    "email": { "bsonType": "string" },
                    "username": { "bsonType": "string" },
                    "hashed_password": { "bsonType": "string" },
                    "full_name": { "bsonType": "string" },
                    "is_active": { "bsonType": "bool" },
                    "role": { "bsonType": "string" },
                    "created_at": { "bsonType": "date" },
                    "updated_at": { "bsonType": "date" }
                }
            }
        });
        mongodb::create_collection_statement(COLLECTION, &validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlserver_polarity_never_leaks() {
        let translator = UsersSqlServer;
        let record = Record::new().with("username", "alice").with(IS_ACTIVE, true);

        let native = translator.to_native(&record).unwrap();
        assert_eq!(native.get_bool(DISABLED), Some(false));
        assert!(native.get(IS_ACTIVE).is_none());

        let back = translator.from_native(&native).unwrap();
        assert_eq!(back.get_bool(IS_ACTIVE), Some(true));
        assert!(back.get(DISABLED).is_none());
    }

    #[test]
    fn test_sqlserver_inactive_round_trip() {
        let translator = UsersSqlServer;
        let record = Record::new().with(IS_ACTIVE, false);

        let native = translator.to_native(&record).unwrap();
        assert_eq!(native.get_bool(DISABLED), Some(true));

        let back = translator.from_native(&native).unwrap();
        assert_eq!(back.get_bool(IS_ACTIVE), Some(false));
    }

    #[test]
    fn test_postgres_round_trip_preserves_fields() {
        let translator = UsersPostgres;
        let record = Record::new()
            .with("username", "alice")
            .with("email", "alice@example.com")
            .with(IS_ACTIVE, true);

        let native = translator.to_native(&record).unwrap();
        let back = translator.from_native(&native).unwrap();

        assert_eq!(back.get_str("username"), Some("alice"));
        assert_eq!(back.get_str("email"), Some("alice@example.com"));
        assert_eq!(back.get_bool(IS_ACTIVE), Some(true));
    }

    #[test]
    fn test_mongodb_is_active_defaults_true() {
        let translator = UsersMongoDb;
        let native = Record::new().with("username", "bob");
        let api = translator.from_native(&native).unwrap();
        assert_eq!(api.get_bool(IS_ACTIVE), Some(true));
    }

    #[test]
    fn test_create_statements_mention_polarity_columns() {
        assert!(UsersPostgres.create_statement().contains("is_active"));
        assert!(UsersSqlServer.create_statement().contains("disabled"));
        assert!(!UsersSqlServer.create_statement().contains("is_active"));
    }
}
