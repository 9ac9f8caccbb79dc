use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use stockflow_core::{Entity, ExpectedVersion};
use stockflow_inventory::{
    InboundMovement, Item, ItemId, Movement, MovementId, MovementKind, OutboundMovement, Supplier,
    SupplierId,
};

use super::r#trait::{InventoryStore, StoreError, StoreTx};

/// Rows of one entity type keyed by id.
#[derive(Debug, Clone)]
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<E: Entity + Clone> Table<E> {
    fn get(&self, id: &E::Id) -> Option<&E> {
        self.rows.get(id)
    }

    fn contains(&self, id: &E::Id) -> bool {
        self.rows.contains_key(id)
    }

    fn upsert(&mut self, row: E) {
        self.rows.insert(*row.id(), row);
    }

    fn remove(&mut self, id: &E::Id) -> Option<E> {
        self.rows.remove(id)
    }

    fn values(&self) -> impl DoubleEndedIterator<Item = &E> {
        self.rows.values()
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    items: Table<Item>,
    inbound: Table<InboundMovement>,
    outbound: Table<OutboundMovement>,
    suppliers: Table<Supplier>,
}

impl Tables {
    fn movement(&self, id: &MovementId) -> Option<Movement> {
        if let Some(m) = self.inbound.get(id) {
            return Some(Movement::Inbound(m.clone()));
        }
        self.outbound.get(id).map(|m| Movement::Outbound(m.clone()))
    }

    fn references(&self, item_id: ItemId) -> u64 {
        let inbound = self.inbound.values().filter(|m| m.item_id == item_id).count();
        let outbound = self.outbound.values().filter(|m| m.item_id == item_id).count();
        (inbound + outbound) as u64
    }

    /// Both ledgers for one item, newest first.
    fn movements_for_item(&self, item_id: ItemId) -> Vec<Movement> {
        let mut rows: Vec<Movement> = self
            .inbound
            .values()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .map(Movement::Inbound)
            .chain(
                self.outbound
                    .values()
                    .filter(|m| m.item_id == item_id)
                    .cloned()
                    .map(Movement::Outbound),
            )
            .collect();
        rows.sort_by(|a, b| b.id_typed().cmp(&a.id_typed()));
        rows
    }
}

/// In-memory balance-and-ledger store.
///
/// Intended for tests/dev. A transaction holds the single write lock for its
/// whole lifetime and works on a staged copy, so transactions are fully
/// serialized and a dropped transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<Tables>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }

    async fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.items.get(id).cloned()).collect())
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        Ok(self.state.read().await.movement(&id))
    }

    async fn movements(&self, kind: MovementKind) -> Result<Vec<Movement>, StoreError> {
        let state = self.state.read().await;
        let rows = match kind {
            MovementKind::Inbound => state
                .inbound
                .values()
                .rev()
                .cloned()
                .map(Movement::Inbound)
                .collect(),
            MovementKind::Outbound => state
                .outbound
                .values()
                .rev()
                .cloned()
                .map(Movement::Outbound)
                .collect(),
        };
        Ok(rows)
    }

    async fn movements_for_item(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        Ok(self.state.read().await.movements_for_item(item_id))
    }

    async fn suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        Ok(self.state.read().await.suppliers.values().cloned().collect())
    }
}

/// Unit of work over a staged copy of the tables.
struct InMemoryTx {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_items(&mut self, ids: &[ItemId]) -> Result<BTreeMap<ItemId, Item>, StoreError> {
        // The write guard already excludes every other transaction.
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.items.get(id).map(|item| (*id, item.clone())))
            .collect())
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        if self.staged.items.contains(&item.id_typed()) {
            return Err(StoreError::Constraint(format!(
                "item {} already exists",
                item.id_typed()
            )));
        }
        self.staged.items.upsert(item.clone());
        Ok(())
    }

    async fn write_item(&mut self, item: &Item, expected: ExpectedVersion) -> Result<(), StoreError> {
        let current = self
            .staged
            .items
            .get(&item.id_typed())
            .ok_or_else(|| StoreError::Concurrency(format!("item {} no longer exists", item.id_typed())))?;
        if !expected.matches(current.version()) {
            return Err(StoreError::Concurrency(format!(
                "item {}: expected {expected:?}, found version {}",
                item.id_typed(),
                current.version()
            )));
        }
        self.staged.items.upsert(item.clone());
        Ok(())
    }

    async fn delete_item(&mut self, id: ItemId) -> Result<bool, StoreError> {
        let references = self.staged.references(id);
        if references > 0 {
            return Err(StoreError::Constraint(format!(
                "item {id} is referenced by {references} movement(s)"
            )));
        }
        Ok(self.staged.items.remove(&id).is_some())
    }

    async fn count_movements_for_item(&mut self, id: ItemId) -> Result<u64, StoreError> {
        Ok(self.staged.references(id))
    }

    async fn lock_movement(&mut self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        Ok(self.staged.movement(&id))
    }

    async fn put_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        if !self.staged.items.contains(&movement.item_id()) {
            return Err(StoreError::Constraint(format!(
                "movement {} references unknown item {}",
                movement.id_typed(),
                movement.item_id()
            )));
        }
        match movement {
            Movement::Inbound(m) => {
                if self.staged.outbound.contains(&m.id) {
                    return Err(StoreError::Constraint(format!(
                        "movement {} is recorded as outbound",
                        m.id
                    )));
                }
                self.staged.inbound.upsert(m.clone());
            }
            Movement::Outbound(m) => {
                if self.staged.inbound.contains(&m.id) {
                    return Err(StoreError::Constraint(format!(
                        "movement {} is recorded as inbound",
                        m.id
                    )));
                }
                self.staged.outbound.upsert(m.clone());
            }
        }
        Ok(())
    }

    async fn remove_movement(&mut self, id: MovementId) -> Result<bool, StoreError> {
        Ok(self.staged.inbound.remove(&id).is_some() || self.staged.outbound.remove(&id).is_some())
    }

    async fn lock_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        Ok(self.staged.suppliers.get(&id).cloned())
    }

    async fn put_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError> {
        self.staged.suppliers.upsert(supplier.clone());
        Ok(())
    }

    async fn remove_supplier(&mut self, id: SupplierId) -> Result<bool, StoreError> {
        Ok(self.staged.suppliers.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockflow_core::ActorId;
    use stockflow_inventory::{ItemDetails, RecordInbound};

    fn item(name: &str) -> Item {
        Item::new(ItemId::generate(), ItemDetails::new(name, "test")).unwrap()
    }

    fn inbound(item_id: ItemId, quantity: i64) -> Movement {
        RecordInbound {
            item_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            quantity,
            note: String::new(),
        }
        .into_movement(MovementId::generate(), ActorId::new())
        .unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryInventoryStore::new();
        let bolt = item("bolt");
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_item(&bolt).await.unwrap();
        }
        assert!(store.item(bolt.id_typed()).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&bolt).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.item(bolt.id_typed()).await.unwrap(), Some(bolt));
    }

    #[tokio::test]
    async fn stale_version_write_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let mut bolt = item("bolt");
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&bolt).await.unwrap();

        bolt.adjust_balance(4).unwrap();
        let err = tx.write_item(&bolt, ExpectedVersion::exact(7)).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        tx.write_item(&bolt, ExpectedVersion::exact(0)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.item(bolt.id_typed()).await.unwrap().unwrap().balance(), 4);
    }

    #[tokio::test]
    async fn referenced_item_cannot_be_deleted() {
        let store = InMemoryInventoryStore::new();
        let bolt = item("bolt");
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&bolt).await.unwrap();
        tx.put_movement(&inbound(bolt.id_typed(), 3)).await.unwrap();

        assert_eq!(tx.count_movements_for_item(bolt.id_typed()).await.unwrap(), 1);
        let err = tx.delete_item(bolt.id_typed()).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn movement_must_reference_known_item() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.put_movement(&inbound(ItemId::generate(), 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn ledgers_list_newest_first() {
        let store = InMemoryInventoryStore::new();
        let bolt = item("bolt");
        let first = inbound(bolt.id_typed(), 1);
        let second = inbound(bolt.id_typed(), 2);

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&bolt).await.unwrap();
        tx.put_movement(&first).await.unwrap();
        tx.put_movement(&second).await.unwrap();
        tx.commit().await.unwrap();

        let listed = store.movements(MovementKind::Inbound).await.unwrap();
        assert_eq!(listed, vec![second.clone(), first.clone()]);
        assert!(store.movements(MovementKind::Outbound).await.unwrap().is_empty());
        assert_eq!(store.movements_for_item(bolt.id_typed()).await.unwrap(), vec![second, first]);
    }
}
