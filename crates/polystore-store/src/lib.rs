//! # Polystore Store - Storage Abstraction Layer
//!
//! Provides uniform CRUD over heterogeneous database engines. Every backend
//! implements the same [`StorageAdapter`] contract; callers never see
//! engine-specific types, placeholders or identifier formats.

use async_trait::async_trait;

use polystore_types::{Backend, Filter, Page, Record, StoreResult};

pub mod factory;
pub mod manager;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod retry;
#[cfg(feature = "sqlserver")]
pub mod sqlserver;
mod translate;

pub use factory::{AdapterFactory, ConnectionSettings};
pub use manager::ConnectionManager;
pub use memory::MemoryAdapter;
pub use retry::{retry_with_backoff, RetryPolicy};

#[cfg(feature = "mongodb")]
pub use mongo::MongoAdapter;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
#[cfg(feature = "sqlserver")]
pub use sqlserver::SqlServerAdapter;

type Result<T> = StoreResult<T>;

/// The uniform storage contract every backend implements.
///
/// All methods take `&self`; connection state lives behind interior
/// mutability so a shared adapter can be disconnected on every exit path.
/// Record absence is a value (`Ok(None)` / `Ok(false)`), never an error.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// The engine this adapter targets
    fn backend(&self) -> Backend;

    /// Establish the connection. Idempotent; transient failures are retried
    /// with bounded exponential backoff before surfacing
    /// `StoreError::Connection`.
    async fn connect(&self) -> Result<()>;

    /// Release the connection. Idempotent, safe if never connected.
    async fn disconnect(&self) -> Result<()>;

    /// Insert a record and return the full stored representation, with the
    /// identifier generated when the caller supplied none.
    async fn create(&self, collection: &str, record: &Record) -> Result<Record>;

    /// Fetch one record by `key_field` (usually `"id"`). Identifier-typed
    /// lookups that fail the engine's native cast are retried once with a
    /// string-typed comparison before reporting absence.
    async fn read(&self, collection: &str, key: &str, key_field: &str) -> Result<Option<Record>>;

    /// Partially update a record: fields present in `patch` replace stored
    /// values, all others are untouched. Returns the post-update record, or
    /// `None` if the identifier matched nothing.
    async fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<Option<Record>>;

    /// Delete one record by identifier. `Ok(false)` when nothing matched.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// List records matching every filter condition, windowed by `page`.
    /// The `tag` filter key matches by containment on the `tags` array.
    async fn list(&self, collection: &str, page: Page, filter: &Filter) -> Result<Vec<Record>>;

    /// Idempotently provision the table/collection backing a model.
    /// `statement` is the registry-generated create statement; engines that
    /// provision by name alone may ignore it.
    async fn ensure_collection(&self, model: &str, statement: &str) -> Result<()>;

    /// Fetch one record by its identifier
    async fn read_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        self.read(collection, id, polystore_types::record::ID_FIELD)
            .await
    }
}
