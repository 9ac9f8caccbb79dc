use std::sync::Arc;

use stockflow_infra::{
    InMemoryInventoryStore, InfraConfig, InventoryQueries, InventoryStore, ReconciliationEngine,
    RetryPolicy, StoreError, SupplierDirectory, connect_store,
};

pub type SharedStore = Arc<dyn InventoryStore>;

/// Everything the handlers need, sharing one store.
pub struct AppServices {
    pub engine: ReconciliationEngine<SharedStore>,
    pub queries: InventoryQueries<SharedStore>,
    pub suppliers: SupplierDirectory<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, retry: RetryPolicy) -> Self {
        Self {
            engine: ReconciliationEngine::with_retry(Arc::clone(&store), retry),
            queries: InventoryQueries::new(Arc::clone(&store)),
            suppliers: SupplierDirectory::new(store, retry),
        }
    }

    /// Fresh in-memory services (dev/tests).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()), RetryPolicy::default())
    }
}

pub async fn build_services(config: &InfraConfig) -> Result<AppServices, StoreError> {
    let store = connect_store(config).await?;
    Ok(AppServices::new(store, config.retry))
}
