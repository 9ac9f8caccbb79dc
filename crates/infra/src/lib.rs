//! Infrastructure layer: storage backends, the reconciliation engine, read
//! queries and configuration.

pub mod config;
pub mod error;
pub mod query;
pub mod reconciliation;
mod retry;
pub mod store;
pub mod suppliers;


pub use config::{ConfigError, InfraConfig, RetryPolicy, StoreBackend};
pub use error::EngineError;
pub use query::{
    ConsistencyReport, ITEM_NOT_FOUND_LABEL, InventoryQueries, InvoiceView, ItemChoice, ItemView,
    MovementView,
};
pub use reconciliation::{ItemBalance, ItemReceipt, MovementReceipt, ReconciliationEngine};
pub use store::{
    InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError, StoreTx,
    connect_store,
};
pub use suppliers::SupplierDirectory;
