//! In-memory storage backend for testing and development
//!
//! Stores records in API shape directly, with no schema translation. The
//! full adapter contract holds: generated identifiers, string-widened id
//! comparison, tag containment and the pagination window behave exactly as
//! the database backends do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use polystore_types::record::ID_FIELD;
use polystore_types::{Backend, Filter, Page, Record, StoreError, Value};

use crate::{Result, StorageAdapter};

/// In-memory adapter: one `Vec<Record>` per collection behind an RwLock
pub struct MemoryAdapter {
    collections: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn matches(record: &Record, filter: &Filter) -> bool {
        filter.conditions().all(|(key, wanted)| {
            if Filter::is_containment(key) {
                let tag = wanted.as_str().unwrap_or_default();
                record
                    .get_array(Filter::target_field(key))
                    .map(|tags| tags.iter().any(|t| t == tag))
                    .unwrap_or(false)
            } else {
                record
                    .get(key)
                    .map(|value| value.loosely_equals(wanted))
                    .unwrap_or(false)
            }
        })
    }

    fn key_matches(record: &Record, key: &str, key_field: &str) -> bool {
        record
            .get(key_field)
            .map(|value| value.loosely_equals(&Value::from(key)))
            .unwrap_or(false)
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, collection: &str, record: &Record) -> Result<Record> {
        let mut stored = record.clone();
        if !stored.contains(ID_FIELD) {
            stored.set(ID_FIELD, Uuid::new_v4().to_string());
        }
        if !stored.contains("created_at") {
            stored.set("created_at", Utc::now());
        }

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        // Same uniqueness guarantee the database backends get from their
        // primary key.
        if let Some(id) = stored.id() {
            if records
                .iter()
                .any(|existing| Self::key_matches(existing, &id, ID_FIELD))
            {
                return Err(StoreError::Backend(format!(
                    "duplicate identifier '{}' in collection '{}'",
                    id, collection
                )));
            }
        }
        records.push(stored.clone());
        Ok(stored)
    }

    async fn read(&self, collection: &str, key: &str, key_field: &str) -> Result<Option<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| {
                records
                    .iter()
                    .find(|record| Self::key_matches(record, key, key_field))
            })
            .cloned())
    }

    async fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<Option<Record>> {
        let mut collections = self.collections.write().await;
        let records = match collections.get_mut(collection) {
            Some(records) => records,
            None => return Ok(None),
        };

        match records
            .iter_mut()
            .find(|record| Self::key_matches(record, id, ID_FIELD))
        {
            Some(record) => {
                let mut sanitized = patch.clone();
                sanitized.remove(ID_FIELD);
                record.merge(&sanitized);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let records = match collections.get_mut(collection) {
            Some(records) => records,
            None => return Ok(false),
        };

        let before = records.len();
        records.retain(|record| !Self::key_matches(record, id, ID_FIELD));
        Ok(records.len() < before)
    }

    async fn list(&self, collection: &str, page: Page, filter: &Filter) -> Result<Vec<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| Self::matches(record, filter))
                    .skip(page.skip() as usize)
                    .take(page.limit() as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ensure_collection(&self, model: &str, _statement: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(model.to_string()).or_default();
        Ok(())
    }
}
