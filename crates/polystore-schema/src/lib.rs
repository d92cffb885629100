//! # Polystore Schema - Translation Layer
//!
//! Converts API-level records to backend-native representations and back,
//! one translator per (model, backend) pair. Translators are pure and
//! stateless; the [`SchemaRegistry`] caches one instance per pair and can
//! generate the idempotent create-table/collection statements used at
//! startup provisioning.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use polystore_types::{Backend, Record, StoreResult};

pub mod convert;
pub mod notes;
pub mod registry;
pub mod roles;
pub mod users;

pub use registry::SchemaRegistry;

/// Field-level conversion between the API representation and a backend's
/// native one.
///
/// The round-trip law holds for every implementation: `from_native(
/// to_native(r))` preserves all field values the backend can represent,
/// modulo identifier widening to string.
pub trait Translator: Send + Sync {
    /// The collection/table this translator serves
    fn collection(&self) -> &'static str;

    /// The backend this translator targets
    fn backend(&self) -> Backend;

    /// Convert an API record into the backend-native shape, filling
    /// generated fields (identifier, default timestamps) when absent
    fn to_native(&self, record: &Record) -> StoreResult<Record>;

    /// Convert a backend-native record back into the API shape
    fn from_native(&self, record: &Record) -> StoreResult<Record>;

    /// Idempotent create-table/collection statement for provisioning
    fn create_statement(&self) -> String;
}

/// The fixed set of models the registry discovers translators for
pub const MODELS: &[&str] = &["users", "notes", "roles"];

static SHARED: Lazy<Arc<SchemaRegistry>> = Lazy::new(|| Arc::new(SchemaRegistry::new()));

/// The process-wide registry instance. Built at most once, on first use;
/// read-only thereafter.
pub fn shared_registry() -> Arc<SchemaRegistry> {
    Arc::clone(&SHARED)
}

/// Convenience lookup against the shared registry
pub fn get_translator(model: &str, backend: Backend) -> Option<Arc<dyn Translator>> {
    shared_registry().get_translator(model, backend)
}

/// All create statements for a backend, keyed by model
pub fn create_statements(backend: Backend) -> BTreeMap<&'static str, String> {
    shared_registry().create_statements(backend)
}
