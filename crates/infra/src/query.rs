//! Read-side facade: balances, listings with item names, invoice views and
//! the consistency report. Nothing here takes write locks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{instrument, warn};

use stockflow_core::ActorId;
use stockflow_inventory::{
    BalanceDiscrepancy, Item, ItemId, Movement, MovementId, MovementKind, find_discrepancies,
};

use crate::error::EngineError;
use crate::store::InventoryStore;

/// Name shown for a movement whose item cannot be resolved.
pub const ITEM_NOT_FOUND_LABEL: &str = "item not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub item_id: ItemId,
    pub name: String,
    pub description: String,
    pub balance: i64,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id_typed(),
            name: item.name().to_string(),
            description: item.description().to_string(),
            balance: item.balance(),
        }
    }
}

/// Entry of an item picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemChoice {
    pub item_id: ItemId,
    pub name: String,
}

/// A ledger row joined with its item's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementView {
    pub movement_id: MovementId,
    pub kind: MovementKind,
    pub item_id: ItemId,
    pub item_name: String,
    pub date: NaiveDate,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub recorded_by: ActorId,
}

impl MovementView {
    fn new(movement: &Movement, item_name: String) -> Self {
        let (note, recipient) = match movement {
            Movement::Inbound(m) => (Some(m.note.clone()), None),
            Movement::Outbound(m) => (None, Some(m.recipient.clone())),
        };
        Self {
            movement_id: movement.id_typed(),
            kind: movement.kind(),
            item_id: movement.item_id(),
            item_name,
            date: movement.date(),
            quantity: movement.quantity().get(),
            note,
            recipient,
            recorded_by: movement.recorded_by(),
        }
    }
}

/// Printable delivery note for one outbound movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceView {
    pub movement_id: MovementId,
    pub item_id: ItemId,
    pub item_name: String,
    pub date: NaiveDate,
    pub recipient: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub items_checked: usize,
    pub movements_checked: usize,
    pub discrepancies: Vec<BalanceDiscrepancy>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

pub struct InventoryQueries<S> {
    store: S,
}

impl<S> InventoryQueries<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current committed balance of one item.
    pub async fn item_balance(&self, id: ItemId) -> Result<i64, EngineError> {
        Ok(self.item(id).await?.balance)
    }

    pub async fn item(&self, id: ItemId) -> Result<ItemView, EngineError> {
        self.store
            .item(id)
            .await?
            .as_ref()
            .map(ItemView::from)
            .ok_or_else(|| EngineError::not_found(format!("item {id}")))
    }

    /// All items, oldest first.
    pub async fn items(&self) -> Result<Vec<ItemView>, EngineError> {
        Ok(self.store.items().await?.iter().map(ItemView::from).collect())
    }

    /// Item picker entries, name ascending.
    pub async fn item_choices(&self) -> Result<Vec<ItemChoice>, EngineError> {
        let mut choices: Vec<ItemChoice> = self
            .store
            .items()
            .await?
            .into_iter()
            .map(|item| ItemChoice {
                item_id: item.id_typed(),
                name: item.name().to_string(),
            })
            .collect();
        choices.sort_by(|a, b| a.name.cmp(&b.name).then(a.item_id.cmp(&b.item_id)));
        Ok(choices)
    }

    /// One ledger, newest first, each row labelled with its item's name.
    #[instrument(skip(self), fields(kind = %kind), err)]
    pub async fn movements_with_item_names(
        &self,
        kind: MovementKind,
    ) -> Result<Vec<MovementView>, EngineError> {
        let movements = self.store.movements(kind).await?;
        let names = self.item_names(&movements).await;
        Ok(movements
            .iter()
            .map(|m| MovementView::new(m, name_or_placeholder(&names, m.item_id())))
            .collect())
    }

    pub async fn movement(&self, id: MovementId) -> Result<MovementView, EngineError> {
        let movement = self
            .store
            .movement(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("movement {id}")))?;
        let names = self.item_names(std::slice::from_ref(&movement)).await;
        Ok(MovementView::new(
            &movement,
            name_or_placeholder(&names, movement.item_id()),
        ))
    }

    /// Both ledgers for one item, newest first.
    pub async fn movements_for_item(&self, id: ItemId) -> Result<Vec<MovementView>, EngineError> {
        let item = self.item(id).await?;
        Ok(self
            .store
            .movements_for_item(id)
            .await?
            .iter()
            .map(|m| MovementView::new(m, item.name.clone()))
            .collect())
    }

    pub async fn outbound_invoice(&self, id: MovementId) -> Result<InvoiceView, EngineError> {
        let movement = self
            .store
            .movement(id)
            .await?
            .filter(|m| m.kind() == MovementKind::Outbound)
            .ok_or_else(|| EngineError::not_found(format!("outbound movement {id}")))?;
        let names = self.item_names(std::slice::from_ref(&movement)).await;
        invoice_view(&movement, &names)
            .ok_or_else(|| EngineError::not_found(format!("outbound movement {id}")))
    }

    /// Delivery notes for every outbound movement, newest first.
    pub async fn outbound_invoices(&self) -> Result<Vec<InvoiceView>, EngineError> {
        let movements = self.store.movements(MovementKind::Outbound).await?;
        let names = self.item_names(&movements).await;
        Ok(movements
            .iter()
            .filter_map(|m| invoice_view(m, &names))
            .collect())
    }

    /// Recompute every balance from the ledgers and compare with stored values.
    ///
    /// Meant for quiescent points: it reads the tables one after another, so
    /// concurrent writers can make it report transient discrepancies.
    #[instrument(skip(self), err)]
    pub async fn consistency_report(&self) -> Result<ConsistencyReport, EngineError> {
        let items = self.store.items().await?;
        let mut movements = self.store.movements(MovementKind::Inbound).await?;
        movements.extend(self.store.movements(MovementKind::Outbound).await?);

        let discrepancies = find_discrepancies(&items, &movements);
        for discrepancy in &discrepancies {
            warn!(
                item_id = %discrepancy.item_id,
                recorded = ?discrepancy.recorded,
                derived = discrepancy.derived,
                "balance does not match ledger"
            );
        }
        Ok(ConsistencyReport {
            items_checked: items.len(),
            movements_checked: movements.len(),
            discrepancies,
        })
    }

    /// Resolve item names for a batch of movements. Failures degrade to an
    /// empty map so listings still render with the placeholder name.
    async fn item_names(&self, movements: &[Movement]) -> BTreeMap<ItemId, String> {
        let ids: Vec<ItemId> = movements
            .iter()
            .map(Movement::item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        match self.store.items_by_ids(&ids).await {
            Ok(items) => items
                .into_iter()
                .map(|item| (item.id_typed(), item.name().to_string()))
                .collect(),
            Err(err) => {
                warn!(error = %err, count = ids.len(), "item name lookup failed");
                BTreeMap::new()
            }
        }
    }
}

fn name_or_placeholder(names: &BTreeMap<ItemId, String>, id: ItemId) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| ITEM_NOT_FOUND_LABEL.to_string())
}

fn invoice_view(movement: &Movement, names: &BTreeMap<ItemId, String>) -> Option<InvoiceView> {
    let Movement::Outbound(m) = movement else {
        return None;
    };
    Some(InvoiceView {
        movement_id: m.id,
        item_id: m.item_id,
        item_name: name_or_placeholder(names, m.item_id),
        date: m.date,
        recipient: m.recipient.clone(),
        quantity: m.quantity.get(),
    })
}
