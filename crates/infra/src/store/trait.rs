use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockflow_core::ExpectedVersion;
use stockflow_inventory::{Item, ItemId, Movement, MovementId, MovementKind, Supplier, SupplierId};

/// Store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, constraints) as
/// opposed to domain errors (validation, stock guard).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A compare-and-set precondition failed, or the backend aborted the
    /// transaction to resolve a conflict (serialization failure, deadlock).
    /// The whole operation may be retried from scratch.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A storage-level constraint rejected the write (duplicate key, dangling reference).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A persisted row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Connection, IO or other backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Shared balance-and-ledger store.
///
/// Reads on the store itself take no locks and only ever observe committed
/// state. Every mutation goes through a [`StoreTx`] obtained from [`begin`].
///
/// [`begin`]: InventoryStore::begin
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Start a unit of work. Nothing it writes is visible until `commit`.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// All items, id ascending (creation order).
    async fn items(&self) -> Result<Vec<Item>, StoreError>;

    /// Items for the given ids in one round trip; unknown ids are skipped.
    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError>;

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// One ledger, newest movement first.
    async fn movements(&self, kind: MovementKind) -> Result<Vec<Movement>, StoreError>;

    /// Both ledgers restricted to one item, newest movement first.
    async fn movements_for_item(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError>;

    /// All suppliers, id ascending.
    async fn suppliers(&self) -> Result<Vec<Supplier>, StoreError>;
}

/// One atomic unit of work against the store.
///
/// Row locks taken here are held until `commit` or `rollback`. Item rows must
/// be locked in ascending id order; [`StoreTx::lock_items`] does that for the
/// ids it is given, so callers lock everything they need in one call.
#[async_trait]
pub trait StoreTx: Send {
    /// Lock and load items. Missing ids are absent from the result.
    async fn lock_items(&mut self, ids: &[ItemId]) -> Result<BTreeMap<ItemId, Item>, StoreError>;

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError>;

    /// Compare-and-set write of an item row: succeeds only if the stored
    /// version still matches `expected`. The row takes `item.version()`.
    async fn write_item(&mut self, item: &Item, expected: ExpectedVersion) -> Result<(), StoreError>;

    async fn delete_item(&mut self, id: ItemId) -> Result<bool, StoreError>;

    /// Number of movements (both kinds) referencing the item.
    async fn count_movements_for_item(&mut self, id: ItemId) -> Result<u64, StoreError>;

    /// Lock and load a movement from whichever ledger holds it.
    async fn lock_movement(&mut self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// Insert or replace a movement in the ledger matching its kind.
    async fn put_movement(&mut self, movement: &Movement) -> Result<(), StoreError>;

    async fn remove_movement(&mut self, id: MovementId) -> Result<bool, StoreError>;

    async fn lock_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;

    async fn put_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError>;

    async fn remove_supplier(&mut self, id: SupplierId) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        (**self).begin().await
    }

    async fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).item(id).await
    }

    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).items().await
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError> {
        (**self).items_by_ids(ids).await
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(id).await
    }

    async fn movements(&self, kind: MovementKind) -> Result<Vec<Movement>, StoreError> {
        (**self).movements(kind).await
    }

    async fn movements_for_item(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for_item(item_id).await
    }

    async fn suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        (**self).suppliers().await
    }
}
