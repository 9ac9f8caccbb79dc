//! Balance-and-ledger storage.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

use tracing::info;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{InventoryStore, StoreError, StoreTx};

use crate::config::{InfraConfig, StoreBackend};

/// Build the store selected by `config`, creating the Postgres schema if needed.
pub async fn connect_store(config: &InfraConfig) -> Result<Arc<dyn InventoryStore>, StoreError> {
    match &config.store {
        StoreBackend::InMemory => {
            info!(backend = "memory", "using in-memory inventory store");
            Ok(Arc::new(InMemoryInventoryStore::new()))
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresInventoryStore::connect(database_url, *max_connections).await?;
            store.ensure_schema().await?;
            info!(backend = "postgres", max_connections, "using postgres inventory store");
            Ok(Arc::new(store))
        }
    }
}
