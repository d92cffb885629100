//! Translators for the `notes` model
//!
//! Notes carry the array concern: `tags` is a native `TEXT[]` column on
//! PostgreSQL, a JSON-encoded `NVARCHAR(MAX)` column on SQL Server, and a
//! native array on MongoDB.

use polystore_types::{Backend, Record, StoreResult};

use crate::convert::{mongodb, postgres, sqlserver};
use crate::Translator;

const COLLECTION: &str = "notes";

/// PostgreSQL notes translator
pub struct NotesPostgres;

impl Translator for NotesPostgres {
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
                ("title", "VARCHAR(255) NOT NULL"),
                ("content", "TEXT"),
                ("visibility", "VARCHAR(50) DEFAULT 'private'"),
                ("tags", "TEXT[]"),
                ("user_id", "UUID NOT NULL"),
                ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP"),
                ("updated_at", "TIMESTAMPTZ"),
            ],
            &["CREATE INDEX IF NOT EXISTS idx_notes_title ON notes(title);"],
        )
    }
}

/// SQL Server notes translator (tags as JSON text)
pub struct NotesSqlServer;

impl Translator for NotesSqlServer {
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
                ("title", "NVARCHAR(255) NOT NULL"),
                ("content", "NVARCHAR(MAX)"),
                ("visibility", "NVARCHAR(50) DEFAULT 'private'"),
                // JSON array stored as text
                ("tags", "NVARCHAR(MAX)"),
                ("user_id", "NVARCHAR(50) NOT NULL"),
                ("created_at", "DATETIME2 NOT NULL DEFAULT GETUTCDATE()"),
                ("updated_at", "DATETIME2"),
            ],
            &[&sqlserver::index_statement(COLLECTION, "IDX_notes_title", "title")],
        )
    }
}

/// MongoDB notes translator
pub struct NotesMongoDb;

impl Translator for NotesMongoDb {
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
                "required": ["title"],
                "properties": {
                    "title": { "bsonType": "string" },
                    "content": { "bsonType": "string" },
                    "visibility": { "bsonType": "string" },
                    "tags": { "bsonType": "array", "items": { "bsonType": "string" } },
                    "user_id": { "bsonType": "string" },
                    "created_at": { "bsonType": "date" },
                    "updated_at": { "bsonType": "date" }
                }
            }
        });
        mongodb::create_collection_statement(COLLECTION, &validator)
    }
}
