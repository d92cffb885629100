//! Translator registry
//!
//! Holds one translator per (model, backend) pair. Built once at startup
//! with the builtin models and append-only afterwards; lookups are lock-free
//! reads of an immutable map behind the shared instance.
//!
//! The memory backend has no entries here: it stores API records directly
//! and needs no native representation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use polystore_types::Backend;

use crate::notes::{NotesMongoDb, NotesPostgres, NotesSqlServer};
use crate::roles::{RolesMongoDb, RolesPostgres, RolesSqlServer};
use crate::users::{UsersMongoDb, UsersPostgres, UsersSqlServer};
use crate::Translator;

/// Registry of translators keyed by (model, backend)
pub struct SchemaRegistry {
    translators: BTreeMap<(&'static str, Backend), Arc<dyn Translator>>,
}

impl SchemaRegistry {
    /// Build a registry seeded with every builtin (model, backend) pair
    pub fn new() -> Self {
        let mut registry = Self {
            translators: BTreeMap::new(),
        };

        registry.register(Arc::new(UsersPostgres));
        registry.register(Arc::new(UsersSqlServer));
        registry.register(Arc::new(UsersMongoDb));
        registry.register(Arc::new(NotesPostgres));
        registry.register(Arc::new(NotesSqlServer));
        registry.register(Arc::new(NotesMongoDb));
        registry.register(Arc::new(RolesPostgres));
        registry.register(Arc::new(RolesSqlServer));
        registry.register(Arc::new(RolesMongoDb));

        registry
    }

    /// Register a translator under its own (collection, backend) key.
    /// Later registrations for the same key replace earlier ones.
    pub fn register(&mut self, translator: Arc<dyn Translator>) {
        let key = (translator.collection(), translator.backend());
        debug!(model = key.0, backend = %key.1, "registered translator");
        self.translators.insert(key, translator);
    }

    /// Look up the translator for a model on a backend
    pub fn get_translator(&self, model: &str, backend: Backend) -> Option<Arc<dyn Translator>> {
        crate::MODELS
            .iter()
            .find(|known| **known == model)
            .and_then(|known| self.translators.get(&(*known, backend)))
            .map(Arc::clone)
    }

    /// Every model registered for a backend
    pub fn models_for(&self, backend: Backend) -> Vec<&'static str> {
        self.translators
            .keys()
            .filter(|(_, b)| *b == backend)
            .map(|(model, _)| *model)
            .collect()
    }

    /// Idempotent create statements for every model on a backend, keyed by
    /// model name. Used by startup provisioning.
    pub fn create_statements(&self, backend: Backend) -> BTreeMap<&'static str, String> {
        self.translators
            .iter()
            .filter(|((_, b), _)| *b == backend)
            .map(|((model, _), translator)| (*model, translator.create_statement()))
            .collect()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pairs_are_registered() {
        let registry = SchemaRegistry::new();
        for model in crate::MODELS {
            for backend in [Backend::Postgres, Backend::SqlServer, Backend::MongoDb] {
                let translator = registry.get_translator(model, backend);
                assert!(translator.is_some(), "{model} on {backend}");
                let translator = translator.unwrap();
                assert_eq!(translator.collection(), *model);
                assert_eq!(translator.backend(), backend);
            }
        }
    }

    #[test]
    fn test_unknown_model_is_none() {
        let registry = SchemaRegistry::new();
        assert!(registry.get_translator("widgets", Backend::Postgres).is_none());
    }

    #[test]
    fn test_memory_backend_has_no_translators() {
        let registry = SchemaRegistry::new();
        assert!(registry.get_translator("users", Backend::Memory).is_none());
        assert!(registry.models_for(Backend::Memory).is_empty());
    }

    #[test]
    fn test_create_statements_cover_every_model() {
        let registry = SchemaRegistry::new();
        let statements = registry.create_statements(Backend::Postgres);
        assert_eq!(statements.len(), crate::MODELS.len());
        assert!(statements["users"].contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(statements["notes"].contains("CREATE TABLE IF NOT EXISTS notes"));
        assert!(statements["roles"].contains("CREATE TABLE IF NOT EXISTS roles"));
    }

    #[test]
    fn test_shared_registry_is_singleton() {
        let a = crate::shared_registry();
        let b = crate::shared_registry();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
