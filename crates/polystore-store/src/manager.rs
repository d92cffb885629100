//! Scoped connection management
//!
//! Adapters are acquired per unit of work: create, connect, run the
//! closure, disconnect. Disconnect runs on every exit path; a disconnect
//! failure after a successful operation is logged, not surfaced, so it can
//! never mask the operation's own result.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use polystore_schema::SchemaRegistry;
use polystore_types::Backend;

use crate::factory::{AdapterFactory, ConnectionSettings};
use crate::{Result, StorageAdapter};

/// Hands out connected adapters for scoped use
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    settings: ConnectionSettings,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Run `f` with a freshly connected adapter. The adapter is
    /// disconnected after `f` completes, whether it succeeded or not.
    pub async fn with_adapter<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn StorageAdapter>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let adapter = AdapterFactory::create(&self.settings)?;
        adapter.connect().await?;
        debug!(backend = %adapter.backend(), "adapter connected");

        let result = f(Arc::clone(&adapter)).await;

        if let Err(err) = adapter.disconnect().await {
            warn!(backend = %adapter.backend(), error = %err, "disconnect failed");
        }
        result
    }

    /// Provision every registered model on a connected adapter by executing
    /// the registry's idempotent create statements. Safe to run at every
    /// startup.
    pub async fn provision(
        adapter: &dyn StorageAdapter,
        registry: &SchemaRegistry,
    ) -> Result<()> {
        match adapter.backend() {
            // Memory has no translators or DDL; collections exist by name
            Backend::Memory => {
                for model in polystore_schema::MODELS {
                    adapter.ensure_collection(model, "").await?;
                }
            }
            backend => {
                for (model, statement) in registry.create_statements(backend) {
                    debug!(model, %backend, "provisioning");
                    adapter.ensure_collection(model, &statement).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polystore_types::{Filter, Page, Record, StoreError};

    #[tokio::test]
    async fn test_with_adapter_runs_closure() {
        let manager = ConnectionManager::new(ConnectionSettings::memory());
        let created = manager
            .with_adapter(|adapter| async move {
                adapter
                    .create("notes", &Record::new().with("title", "T"))
                    .await
            })
            .await
            .unwrap();

        assert_eq!(created.get_str("title"), Some("T"));
    }

    #[tokio::test]
    async fn test_with_adapter_surfaces_closure_error() {
        let manager = ConnectionManager::new(ConnectionSettings::memory());
        let result: Result<()> = manager
            .with_adapter(|_| async { Err(StoreError::Backend("boom".into())) })
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_provision_creates_all_models_in_memory() {
        let adapter = AdapterFactory::memory();
        let registry = polystore_schema::shared_registry();

        ConnectionManager::provision(adapter.as_ref(), &registry)
            .await
            .unwrap();

        for model in polystore_schema::MODELS {
            let listed = adapter
                .list(model, Page::default(), &Filter::new())
                .await
                .unwrap();
            assert!(listed.is_empty());
        }
    }
}
