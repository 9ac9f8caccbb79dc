//! Reconciliation engine: the only component that writes item balances.
//!
//! Every ledger mutation runs as one store transaction:
//!
//! ```text
//! request
//!   ↓
//! 1. Validate input (no IO)
//!   ↓
//! 2. Lock the movement (edit/delete) and then the touched items, ascending id
//!   ↓
//! 3. Plan + apply balance effects in memory (reverse old, apply new)
//!   ↓
//! 4. Write ledger row and compare-and-set balances
//!   ↓
//! 5. Commit, or roll back and return exactly one error
//! ```
//!
//! A transaction that loses a race surfaces `ConflictRetry`; the whole
//! operation is then re-run from step 2, up to the configured attempt count.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, instrument, warn};

use stockflow_core::{ExpectedVersion, RequestContext};
use stockflow_inventory::{
    BalanceChange, Item, ItemDetails, ItemId, Movement, MovementEdit, MovementId, MovementKind,
    NewItem, OPENING_BALANCE_NOTE, Quantity, RecordInbound, RecordOutbound, ReconciliationPlan,
};

use crate::config::RetryPolicy;
use crate::error::EngineError;
use crate::retry::with_retry;
use crate::store::{InventoryStore, StoreTx};

/// Authoritative balance of one item right after a committed operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ItemBalance {
    pub item_id: ItemId,
    pub balance: i64,
}

/// Result of a committed ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub movement_id: MovementId,
    pub kind: MovementKind,
    /// Every item the operation touched, ascending id.
    pub balances: Vec<ItemBalance>,
}

impl MovementReceipt {
    pub fn balance_of(&self, item_id: ItemId) -> Option<i64> {
        self.balances
            .iter()
            .find(|b| b.item_id == item_id)
            .map(|b| b.balance)
    }
}

/// Result of registering an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReceipt {
    pub item: Item,
    /// Inbound movement that booked the opening quantity, if any.
    pub opening_movement: Option<MovementId>,
}

/// Applies ledger mutations and keeps every balance equal to its ledger sum.
pub struct ReconciliationEngine<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> ReconciliationEngine<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, ctx, request), fields(actor = %ctx.actor(), item_id = %request.item_id, quantity = request.quantity), err)]
    pub async fn create_inbound(
        &self,
        ctx: &RequestContext,
        request: RecordInbound,
    ) -> Result<MovementReceipt, EngineError> {
        let movement = request.into_movement(MovementId::generate(), ctx.actor())?;
        self.record(&movement).await
    }

    #[instrument(skip(self, ctx, request), fields(actor = %ctx.actor(), item_id = %request.item_id, quantity = request.quantity), err)]
    pub async fn create_outbound(
        &self,
        ctx: &RequestContext,
        request: RecordOutbound,
    ) -> Result<MovementReceipt, EngineError> {
        let movement = request.into_movement(MovementId::generate(), ctx.actor())?;
        self.record(&movement).await
    }

    /// Replace a movement's data, re-deriving the balances it affects.
    ///
    /// Moving a movement to another item adjusts both items in one transaction.
    #[instrument(skip(self, ctx, edit), fields(actor = %ctx.actor(), movement_id = %id), err)]
    pub async fn edit_movement(
        &self,
        ctx: &RequestContext,
        id: MovementId,
        edit: MovementEdit,
    ) -> Result<MovementReceipt, EngineError> {
        Quantity::new(edit.quantity)?;
        let edit = &edit;
        let receipt = with_retry(self.retry, "edit_movement", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = edit_in_tx(tx.as_mut(), ctx, id, edit).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(movement_id = %id, balances = ?receipt.balances, "movement edited");
        Ok(receipt)
    }

    /// Remove a movement and reverse its balance effect.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor(), movement_id = %id), err)]
    pub async fn delete_movement(
        &self,
        ctx: &RequestContext,
        id: MovementId,
    ) -> Result<MovementReceipt, EngineError> {
        let receipt = with_retry(self.retry, "delete_movement", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = delete_in_tx(tx.as_mut(), id).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(movement_id = %id, balances = ?receipt.balances, "movement deleted");
        Ok(receipt)
    }

    /// Register an item. A positive opening quantity is booked as an inbound
    /// movement so the balance stays derivable from the ledgers.
    #[instrument(skip(self, ctx, request), fields(actor = %ctx.actor(), opening_quantity = request.opening_quantity), err)]
    pub async fn create_item(
        &self,
        ctx: &RequestContext,
        request: NewItem,
    ) -> Result<ItemReceipt, EngineError> {
        request.validate()?;
        let item = Item::new(ItemId::generate(), request.details)?;
        let opening = if request.opening_quantity > 0 {
            Some(
                RecordInbound {
                    item_id: item.id_typed(),
                    date: chrono::Utc::now().date_naive(),
                    quantity: request.opening_quantity,
                    note: OPENING_BALANCE_NOTE.to_string(),
                }
                .into_movement(MovementId::generate(), ctx.actor())?,
            )
        } else {
            None
        };

        let (item, opening) = (&item, opening.as_ref());
        let receipt = with_retry(self.retry, "create_item", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = create_item_in_tx(tx.as_mut(), item, opening).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(item_id = %receipt.item.id_typed(), balance = receipt.item.balance(), "item created");
        Ok(receipt)
    }

    /// Change name/description. Never touches the balance.
    #[instrument(skip(self, ctx, details), fields(actor = %ctx.actor(), item_id = %id), err)]
    pub async fn update_item_details(
        &self,
        ctx: &RequestContext,
        id: ItemId,
        details: ItemDetails,
    ) -> Result<Item, EngineError> {
        let details = details.normalized()?;
        let details = &details;
        with_retry(self.retry, "update_item_details", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = update_item_in_tx(tx.as_mut(), id, details).await;
            finish(tx, outcome).await
        })
        .await
    }

    /// Remove an item that no movement references.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor(), item_id = %id), err)]
    pub async fn delete_item(&self, ctx: &RequestContext, id: ItemId) -> Result<(), EngineError> {
        with_retry(self.retry, "delete_item", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = delete_item_in_tx(tx.as_mut(), id).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(item_id = %id, "item deleted");
        Ok(())
    }

    async fn record(&self, movement: &Movement) -> Result<MovementReceipt, EngineError> {
        let receipt = with_retry(self.retry, "record_movement", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = record_in_tx(tx.as_mut(), movement).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(
            movement_id = %receipt.movement_id,
            kind = %receipt.kind,
            balances = ?receipt.balances,
            "movement recorded"
        );
        Ok(receipt)
    }
}

/// Commit on success, roll back on failure. Either way one result comes out.
pub(crate) async fn finish<T>(tx: Box<dyn StoreTx>, outcome: Result<T, EngineError>) -> Result<T, EngineError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn record_in_tx(tx: &mut dyn StoreTx, movement: &Movement) -> Result<MovementReceipt, EngineError> {
    let plan = ReconciliationPlan::for_create(movement);
    let mut items = tx.lock_items(&plan.item_ids()).await?;
    let originals = items.clone();
    let changes = plan.apply(&mut items)?;

    tx.put_movement(movement).await?;
    write_balances(tx, &originals, &items).await?;

    Ok(receipt(movement, &changes))
}

async fn edit_in_tx(
    tx: &mut dyn StoreTx,
    ctx: &RequestContext,
    id: MovementId,
    edit: &MovementEdit,
) -> Result<MovementReceipt, EngineError> {
    let old = tx
        .lock_movement(id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("movement {id}")))?;
    let new = old.edited(edit, ctx.actor())?;

    let plan = ReconciliationPlan::for_edit(&old, &new)?;
    let mut items = tx.lock_items(&plan.item_ids()).await?;
    let originals = items.clone();
    let changes = plan.apply(&mut items)?;

    let written = write_balances(tx, &originals, &items).await?;
    if let Err(err) = tx.put_movement(&new).await {
        restore_balances(tx, &written, &originals, &items).await;
        return Err(err.into());
    }

    Ok(receipt(&new, &changes))
}

async fn delete_in_tx(tx: &mut dyn StoreTx, id: MovementId) -> Result<MovementReceipt, EngineError> {
    let old = tx
        .lock_movement(id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("movement {id}")))?;

    let plan = ReconciliationPlan::for_delete(&old);
    let mut items = tx.lock_items(&plan.item_ids()).await?;
    let originals = items.clone();
    let changes = plan.apply(&mut items)?;

    let written = write_balances(tx, &originals, &items).await?;
    match tx.remove_movement(id).await {
        Ok(true) => Ok(receipt(&old, &changes)),
        Ok(false) => {
            restore_balances(tx, &written, &originals, &items).await;
            Err(EngineError::not_found(format!("movement {id}")))
        }
        Err(err) => {
            restore_balances(tx, &written, &originals, &items).await;
            Err(err.into())
        }
    }
}

async fn create_item_in_tx(
    tx: &mut dyn StoreTx,
    item: &Item,
    opening: Option<&Movement>,
) -> Result<ItemReceipt, EngineError> {
    tx.insert_item(item).await?;
    let Some(movement) = opening else {
        return Ok(ItemReceipt {
            item: item.clone(),
            opening_movement: None,
        });
    };

    record_in_tx(tx, movement).await?;
    let item = tx
        .lock_items(&[item.id_typed()])
        .await?
        .remove(&item.id_typed())
        .ok_or_else(|| EngineError::Invariant(format!("item {} vanished during creation", item.id_typed())))?;
    Ok(ItemReceipt {
        item,
        opening_movement: Some(movement.id_typed()),
    })
}

async fn update_item_in_tx(
    tx: &mut dyn StoreTx,
    id: ItemId,
    details: &ItemDetails,
) -> Result<Item, EngineError> {
    let mut item = tx
        .lock_items(&[id])
        .await?
        .remove(&id)
        .ok_or_else(|| EngineError::not_found(format!("item {id}")))?;
    let read_version = item.version();
    item.update_details(details.clone())?;
    tx.write_item(&item, ExpectedVersion::exact(read_version)).await?;
    Ok(item)
}

async fn delete_item_in_tx(tx: &mut dyn StoreTx, id: ItemId) -> Result<(), EngineError> {
    if !tx.lock_items(&[id]).await?.contains_key(&id) {
        return Err(EngineError::not_found(format!("item {id}")));
    }
    let movements = tx.count_movements_for_item(id).await?;
    if movements > 0 {
        return Err(EngineError::ItemInUse {
            item: id.to_string(),
            movements,
        });
    }
    tx.delete_item(id).await?;
    Ok(())
}

/// Compare-and-set every item whose version moved. On failure the rows already
/// written are restored before the error is returned.
async fn write_balances(
    tx: &mut dyn StoreTx,
    originals: &BTreeMap<ItemId, Item>,
    updated: &BTreeMap<ItemId, Item>,
) -> Result<Vec<ItemId>, EngineError> {
    let mut written = Vec::with_capacity(updated.len());
    for (id, item) in updated {
        let read_version = originals
            .get(id)
            .map(Item::version)
            .ok_or_else(|| EngineError::Invariant(format!("item {id} was not locked")))?;
        if item.version() == read_version {
            continue;
        }
        if let Err(err) = tx.write_item(item, ExpectedVersion::exact(read_version)).await {
            restore_balances(tx, &written, originals, updated).await;
            return Err(err.into());
        }
        written.push(*id);
    }
    Ok(written)
}

/// Put `written` rows back to their pre-operation state, newest write first.
async fn restore_balances(
    tx: &mut dyn StoreTx,
    written: &[ItemId],
    originals: &BTreeMap<ItemId, Item>,
    updated: &BTreeMap<ItemId, Item>,
) {
    for id in written.iter().rev() {
        let (Some(original), Some(current)) = (originals.get(id), updated.get(id)) else {
            continue;
        };
        warn!(item_id = %id, balance = original.balance(), "compensating balance write");
        if let Err(err) = tx
            .write_item(original, ExpectedVersion::exact(current.version()))
            .await
        {
            warn!(item_id = %id, error = %err, "compensation failed, relying on rollback");
        }
    }
}

fn receipt(movement: &Movement, changes: &[BalanceChange]) -> MovementReceipt {
    MovementReceipt {
        movement_id: movement.id_typed(),
        kind: movement.kind(),
        balances: changes
            .iter()
            .map(|c| ItemBalance {
                item_id: c.item_id,
                balance: c.after,
            })
            .collect(),
    }
}
