//! # Polystore Types
//!
//! Shared type definitions for the polystore data-access layer.
//!
//! This crate provides all core types used across the polystore workspace,
//! ensuring a single source of truth and preventing circular dependencies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod principal;
pub mod record;

pub use principal::{Principal, Role};
pub use record::{Record, Value};

// ============================================================================
// Backend Identification
// ============================================================================

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory storage (for testing and development)
    Memory,
    /// PostgreSQL (native UUID and array columns)
    Postgres,
    /// SQL Server (string GUIDs, JSON-encoded array columns)
    SqlServer,
    /// MongoDB (ObjectId documents, native arrays)
    MongoDb,
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "sqlserver" | "mssql" => Ok(Backend::SqlServer),
            "mongodb" | "mongo" => Ok(Backend::MongoDb),
            _ => Err(StoreError::Configuration(format!(
                "Unknown backend type: {}",
                s
            ))),
        }
    }
}

impl Backend {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Postgres => "postgres",
            Backend::SqlServer => "sqlserver",
            Backend::MongoDb => "mongodb",
        }
    }

    /// Default server port for this backend, if it has one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Backend::Memory => None,
            Backend::Postgres => Some(5432),
            Backend::SqlServer => Some(1433),
            Backend::MongoDb => Some(27017),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by storage adapters and the schema layer.
///
/// "Not found" is deliberately absent: record absence is an `Ok(None)` /
/// `Ok(false)` value on the adapter contract, never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient or fatal connection failure, surfaced after retries
    #[error("Connection error: {0}")]
    Connection(String),

    /// Field-level conversion failure (identifier cast, malformed array/JSON)
    /// after the documented fallback was attempted
    #[error("Translation error: {0}")]
    Translation(String),

    /// Unrecoverable backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Unregistered backend, missing settings; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Authorization errors produced by the RBAC resolver and role management.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The principal lacks the named permission(s). Never downgraded to
    /// not-found.
    #[error("Forbidden: missing permission(s): {}", missing.join(", "))]
    Forbidden { missing: Vec<String> },

    /// Role management rejected the operation (unknown role, builtin
    /// protection, duplicate name)
    #[error("Role error: {0}")]
    Role(String),
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;

// ============================================================================
// Query Types
// ============================================================================

/// An equality-conjunction filter over record fields.
///
/// One key is reserved: `tag` filters by containment on the `tags` array
/// field instead of equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

/// The reserved filter key that triggers array-containment matching.
pub const TAG_FILTER_KEY: &str = "tag";

/// The array field the containment filter applies to.
pub const TAGS_FIELD: &str = "tags";

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition on a field
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Add a containment condition on the `tags` array field
    pub fn tag(self, value: impl Into<String>) -> Self {
        self.eq(TAG_FILTER_KEY, Value::from(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Iterate conditions in insertion order. The adapter decides whether a
    /// condition is equality or containment based on the key.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether a condition key requests containment rather than equality
    pub fn is_containment(key: &str) -> bool {
        key == TAG_FILTER_KEY
    }

    /// The field a condition applies to, resolving the `tag` alias
    pub fn target_field(key: &str) -> &str {
        if Self::is_containment(key) {
            TAGS_FIELD
        } else {
            key
        }
    }
}

/// A validated pagination window for `list` calls.
///
/// `limit` is bounded to 1..=100 inclusive; out-of-range values are a caller
/// error, not silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    skip: u64,
    limit: u32,
}

/// Maximum page size accepted by `Page::new`
pub const MAX_PAGE_LIMIT: u32 = 100;

impl Page {
    pub fn new(skip: u64, limit: u32) -> StoreResult<Self> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(StoreError::Configuration(format!(
                "page limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }
        Ok(Self { skip, limit })
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: MAX_PAGE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(Backend::from_str("memory").unwrap(), Backend::Memory);
        assert_eq!(Backend::from_str("Postgres").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_str("POSTGRESQL").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_str("sqlserver").unwrap(), Backend::SqlServer);
        assert_eq!(Backend::from_str("mssql").unwrap(), Backend::SqlServer);
        assert_eq!(Backend::from_str("mongodb").unwrap(), Backend::MongoDb);
        assert!(Backend::from_str("oracle").is_err());
    }

    #[test]
    fn test_backend_as_str_round_trip() {
        for backend in [
            Backend::Memory,
            Backend::Postgres,
            Backend::SqlServer,
            Backend::MongoDb,
        ] {
            assert_eq!(Backend::from_str(backend.as_str()).unwrap(), backend);
        }
    }

    #[test]
    fn test_backend_default_ports() {
        assert_eq!(Backend::Postgres.default_port(), Some(5432));
        assert_eq!(Backend::SqlServer.default_port(), Some(1433));
        assert_eq!(Backend::MongoDb.default_port(), Some(27017));
        assert_eq!(Backend::Memory.default_port(), None);
    }

    #[test]
    fn test_filter_conditions_preserve_order() {
        let filter = Filter::new()
            .eq("visibility", "public")
            .eq("user_id", "u-1")
            .tag("rust");

        let keys: Vec<&str> = filter.conditions().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["visibility", "user_id", "tag"]);
    }

    #[test]
    fn test_filter_tag_alias() {
        assert!(Filter::is_containment("tag"));
        assert!(!Filter::is_containment("tags"));
        assert_eq!(Filter::target_field("tag"), "tags");
        assert_eq!(Filter::target_field("title"), "title");
    }

    #[test]
    fn test_page_bounds() {
        assert!(Page::new(0, 1).is_ok());
        assert!(Page::new(0, 100).is_ok());
        assert!(Page::new(0, 0).is_err());
        assert!(Page::new(0, 101).is_err());
    }

    #[test]
    fn test_forbidden_error_names_permissions() {
        let err = AccessError::Forbidden {
            missing: vec!["note:create".into(), "note:update".into()],
        };
        assert_eq!(
            err.to_string(),
            "Forbidden: missing permission(s): note:create, note:update"
        );
    }
}
