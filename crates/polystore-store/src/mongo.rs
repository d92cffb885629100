//! MongoDB storage backend
//!
//! Documents are addressed by ObjectId `_id`; the adapter owns the mapping
//! to the string `id` field callers see, so translators never handle
//! ObjectId values. Array fields are native, which makes tag containment a
//! plain equality filter.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Database};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use polystore_types::record::ID_FIELD;
use polystore_types::{Backend, Filter, Page, Record, StoreError, Value};

use crate::factory::ConnectionSettings;
use crate::retry::retry_with_backoff;
use crate::translate::{to_native_patch, translator_for};
use crate::{Result, StorageAdapter};

/// MongoDB adapter over one database handle
pub struct MongoAdapter {
    settings: ConnectionSettings,
    database: Mutex<Option<Database>>,
}

fn mongo_err(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int(i) => Bson::Int64(*i),
        Value::Float(f) => Bson::Double(*f),
        Value::Timestamp(ts) => Bson::DateTime(mongodb::bson::DateTime::from_chrono(*ts)),
        Value::String(s) => Bson::String(s.clone()),
        Value::StringArray(items) => {
            Bson::Array(items.iter().cloned().map(Bson::String).collect())
        }
        Value::Map(map) => Bson::Document(
            map.iter()
                .map(|(key, value)| (key.clone(), value_to_bson(value)))
                .collect(),
        ),
    }
}

fn bson_to_value(bson: &Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Int(i64::from(*i)),
        Bson::Int64(i) => Value::Int(*i),
        Bson::Double(f) => Value::Float(*f),
        Bson::DateTime(dt) => Value::Timestamp(dt.to_chrono()),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Array(items) => Value::StringArray(
            items
                .iter()
                .map(|item| match item {
                    Bson::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        Bson::Document(document) => Value::Map(
            document
                .iter()
                .map(|(key, value)| (key.clone(), bson_to_value(value)))
                .collect(),
        ),
        other => Value::String(other.to_string()),
    }
}

fn record_to_document(record: &Record) -> Document {
    record
        .fields()
        .map(|(field, value)| (field.to_string(), value_to_bson(value)))
        .collect()
}

/// Convert a stored document to a record, surfacing `_id` as the string
/// `id` field
fn document_to_record(document: &Document) -> Record {
    let mut record: Record = document
        .iter()
        .filter(|(key, _)| key.as_str() != "_id")
        .map(|(key, value)| (key.clone(), bson_to_value(value)))
        .collect();
    if let Ok(id) = document.get_object_id("_id") {
        record.set(ID_FIELD, id.to_hex());
    } else if let Ok(id) = document.get_str("_id") {
        record.set(ID_FIELD, id);
    }
    record
}

/// The lookup filter for a single key. Keys addressed by `id` that do not
/// parse as ObjectId fall back to a `username` lookup, so user records can
/// be fetched by name through the same call.
fn key_filter(key: &str, key_field: &str) -> Document {
    if key_field == ID_FIELD {
        match ObjectId::parse_str(key) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => {
                warn!(key, "key is not an ObjectId, falling back to username lookup");
                doc! { "username": key }
            }
        }
    } else {
        doc! { key_field: key }
    }
}

impl MongoAdapter {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            database: Mutex::new(None),
        }
    }

    fn connection_uri(&self) -> String {
        self.settings.connection_string.clone().unwrap_or_else(|| {
            format!(
                "mongodb://{}:{}@{}:{}",
                self.settings.username,
                self.settings.password,
                self.settings.host,
                self.settings.port
            )
        })
    }

    async fn database(&self) -> Result<Database> {
        self.database
            .lock()
            .await
            .clone()
            .ok_or_else(|| StoreError::Connection("not connected".into()))
    }
}

#[async_trait]
impl StorageAdapter for MongoAdapter {
    fn backend(&self) -> Backend {
        Backend::MongoDb
    }

    async fn connect(&self) -> Result<()> {
        let mut guard = self.database.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let uri = self.connection_uri();
        let name = self.settings.database.clone();
        let database = retry_with_backoff(self.settings.retry, "mongodb connect", || {
            let uri = uri.clone();
            let name = name.clone();
            async move {
                let options = ClientOptions::parse(&uri)
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                let client =
                    Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;
                let database = client.database(&name);
                database
                    .run_command(doc! { "ping": 1 }, None)
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                Ok(database)
            }
        })
        .await?;

        debug!(host = %self.settings.host, "mongodb connected");
        *guard = Some(database);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.database.lock().await.take();
        Ok(())
    }

    async fn create(&self, collection: &str, record: &Record) -> Result<Record> {
        let translator = translator_for(collection, Backend::MongoDb)?;
        let native = translator.to_native(record)?;

        let mut document = record_to_document(&native);
        // The generated string id never becomes a field; _id is the identity
        let id = match document.remove(ID_FIELD) {
            Some(Bson::String(supplied)) => {
                ObjectId::parse_str(&supplied).unwrap_or_else(|_| ObjectId::new())
            }
            _ => ObjectId::new(),
        };
        document.insert("_id", id);

        let database = self.database().await?;
        database
            .collection::<Document>(collection)
            .insert_one(&document, None)
            .await
            .map_err(mongo_err)?;

        translator.from_native(&document_to_record(&document))
    }

    async fn read(&self, collection: &str, key: &str, key_field: &str) -> Result<Option<Record>> {
        let translator = translator_for(collection, Backend::MongoDb)?;
        let database = self.database().await?;

        let found = database
            .collection::<Document>(collection)
            .find_one(key_filter(key, key_field), None)
            .await
            .map_err(mongo_err)?;

        match found {
            Some(document) => Ok(Some(translator.from_native(&document_to_record(&document))?)),
            None => Ok(None),
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<Option<Record>> {
        let translator = translator_for(collection, Backend::MongoDb)?;
        let native = to_native_patch(translator.as_ref(), patch)?;
        if native.is_empty() {
            return self.read_by_id(collection, id).await;
        }

        let mut changes = record_to_document(&native);
        changes.remove(ID_FIELD);
        changes.remove("_id");

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let database = self.database().await?;
        let updated = database
            .collection::<Document>(collection)
            .find_one_and_update(key_filter(id, ID_FIELD), doc! { "$set": changes }, options)
            .await
            .map_err(mongo_err)?;

        match updated {
            Some(document) => Ok(Some(translator.from_native(&document_to_record(&document))?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let database = self.database().await?;
        let result = database
            .collection::<Document>(collection)
            .delete_one(key_filter(id, ID_FIELD), None)
            .await
            .map_err(mongo_err)?;
        Ok(result.deleted_count > 0)
    }

    async fn list(&self, collection: &str, page: Page, filter: &Filter) -> Result<Vec<Record>> {
        let translator = translator_for(collection, Backend::MongoDb)?;

        let mut query = Document::new();
        for (key, value) in filter.conditions() {
            // Equality against an array field is containment in MongoDB,
            // so the tag alias needs no special operator
            query.insert(Filter::target_field(key), value_to_bson(value));
        }

        let options = FindOptions::builder()
            .skip(page.skip())
            .limit(i64::from(page.limit()))
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();

        let database = self.database().await?;
        let documents: Vec<Document> = database
            .collection::<Document>(collection)
            .find(query, options)
            .await
            .map_err(mongo_err)?
            .try_collect()
            .await
            .map_err(mongo_err)?;

        documents
            .iter()
            .map(|document| translator.from_native(&document_to_record(document)))
            .collect()
    }

    async fn ensure_collection(&self, model: &str, _statement: &str) -> Result<()> {
        let database = self.database().await?;
        let existing = database
            .list_collection_names(None)
            .await
            .map_err(mongo_err)?;
        if !existing.iter().any(|name| name == model) {
            database
                .create_collection(model, None)
                .await
                .map_err(mongo_err)?;
        }
        debug!(model, "mongodb collection ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trip_maps_object_id() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "title": "T",
            "tags": ["a", "b"],
            "count": 3i64,
        };

        let record = document_to_record(&document);
        assert_eq!(record.id().as_deref(), Some(oid.to_hex().as_str()));
        assert_eq!(record.get_str("title"), Some("T"));
        assert_eq!(
            record.get_array("tags"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert!(!record.contains("_id"));
    }

    #[test]
    fn test_key_filter_object_id_and_fallback() {
        let oid = ObjectId::new();
        let filter = key_filter(&oid.to_hex(), "id");
        assert_eq!(filter.get_object_id("_id").unwrap(), oid);

        let fallback = key_filter("alice", "id");
        assert_eq!(fallback.get_str("username").unwrap(), "alice");

        let by_field = key_filter("alice", "username");
        assert_eq!(by_field.get_str("username").unwrap(), "alice");
    }

    #[test]
    fn test_value_bson_round_trip() {
        let now = chrono::Utc::now();
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::Float(1.5),
            Value::from("s"),
            Value::from(vec!["a"]),
        ] {
            assert_eq!(bson_to_value(&value_to_bson(&value)), value);
        }

        // BSON datetimes carry millisecond precision
        let bson = value_to_bson(&Value::Timestamp(now));
        match bson_to_value(&bson) {
            Value::Timestamp(back) => {
                assert_eq!(back.timestamp_millis(), now.timestamp_millis())
            }
            other => panic!("expected timestamp, got {:?}", other),
        }
    }
}
