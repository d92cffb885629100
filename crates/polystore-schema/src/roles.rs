//! Translators for the `roles` model
//!
//! A role row is a name, a description, and a permission list. The
//! permission list shares the array treatment used for note tags: native
//! `TEXT[]` on PostgreSQL, JSON text on SQL Server, a plain array on
//! MongoDB.

use polystore_types::{Backend, Record, StoreResult};

use crate::convert::{mongodb, postgres, sqlserver};
use crate::Translator;

const COLLECTION: &str = "roles";

/// PostgreSQL roles translator
pub struct RolesPostgres;

impl Translator for RolesPostgres {
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
                ("name", "VARCHAR(100) UNIQUE NOT NULL"),
                ("description", "TEXT"),
                ("permissions", "TEXT[]"),
                ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP"),
                ("updated_at", "TIMESTAMPTZ"),
            ],
            &["CREATE INDEX IF NOT EXISTS idx_roles_name ON roles(name);"],
        )
    }
}

/// SQL Server roles translator (permissions as JSON text)
pub struct RolesSqlServer;

impl Translator for RolesSqlServer {
    fn collection(&self) -> &'static str {
        COLLECTION
    }

    fn backend(&self) -> Backend {
        Backend::SqlServer
    }

    fn to_native(&self, record: &Record) -> StoreResult<Record> {
        sqlserver::prepare_record(record)
    }

    fn from_native(&self, record: &Record) -> StoreResult<Record> {
        Ok(sqlserver::convert_record(record))
    }

    fn create_statement(&self) -> String {
        sqlserver::create_table_statement(
            COLLECTION,
            &[
                ("id", "NVARCHAR(50) PRIMARY KEY"),
                ("name", "NVARCHAR(100) NOT NULL UNIQUE"),
                ("description", "NVARCHAR(MAX)"),
                // JSON array stored as text
                ("permissions", "NVARCHAR(MAX)"),
                ("created_at", "DATETIME2 NOT NULL DEFAULT GETUTCDATE()"),
                ("updated_at", "DATETIME2"),
            ],
            &[&sqlserver::index_statement(COLLECTION, "IDX_roles_name", "name")],
        )
    }
}

/// MongoDB roles translator
pub struct RolesMongoDb;

impl Translator for RolesMongoDb {
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
        Ok(mongodb::convert_record(record))
    }

    fn create_statement(&self) -> String {
        let validator = serde_json::json!({
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["name"],
                "properties": {
                    "name": { "bsonType": "string" },
                    "description": { "bsonType": "string" },
                    "permissions": { "bsonType": "array", "items": { "bsonType": "string" } },
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
    use polystore_types::Value;

    fn sample_role() -> Record {
        Record::new()
            .with("name", "editor")
            .with("description", "Can edit notes")
            .with("permissions", vec!["note:create", "note:update"])
    }

    #[test]
    fn test_round_trip_all_backends() {
        let translators: Vec<Box<dyn Translator>> = vec![
            Box::new(RolesPostgres),
            Box::new(RolesSqlServer),
            Box::new(RolesMongoDb),
        ];

        for translator in translators {
            let native = translator.to_native(&sample_role()).unwrap();
            let back = translator.from_native(&native).unwrap();

            assert_eq!(back.get_str("name"), Some("editor"), "{}", translator.backend());
            assert_eq!(
                back.get_array("permissions"),
                Some(&["note:create".to_string(), "note:update".to_string()][..]),
                "{}",
                translator.backend()
            );
        }
    }

    #[test]
    fn test_null_permissions_become_empty() {
        let record = Record::new().with("name", "guest").with("permissions", Value::Null);

        let pg = RolesPostgres.to_native(&record).unwrap();
        assert_eq!(pg.get_array("permissions"), Some(&[][..]));

        let mssql = RolesSqlServer.to_native(&record).unwrap();
        assert_eq!(mssql.get_str("permissions"), Some("[]"));
    }

    #[test]
    fn test_create_statement_dialects() {
        assert!(RolesPostgres.create_statement().contains("TEXT[]"));
        assert!(RolesSqlServer.create_statement().contains("sysobjects"));
        assert!(RolesMongoDb.create_statement().contains("$jsonSchema"));
    }
}
