use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use stockflow_infra::{ItemReceipt, ItemView};
use stockflow_inventory::{ItemDetails, ItemId, MovementEdit, NewItem, RecordInbound, RecordOutbound, SupplierDetails};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------
//
// Unknown keys are rejected so a misspelled optional field is not silently
// dropped.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub opening_quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInboundRequest {
    pub item_id: String,
    pub date: NaiveDate,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOutboundRequest {
    pub item_id: String,
    pub date: NaiveDate,
    pub quantity: i64,
    pub recipient: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMovementRequest {
    pub item_id: String,
    pub date: NaiveDate,
    pub quantity: i64,
    pub note: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierRequest {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub note: String,
}

// -------------------------
// Request -> domain mapping
// -------------------------

impl CreateItemRequest {
    pub fn into_new_item(self) -> NewItem {
        NewItem {
            details: ItemDetails::new(self.name, self.description),
            opening_quantity: self.opening_quantity,
        }
    }
}

impl UpdateItemRequest {
    pub fn into_details(self) -> ItemDetails {
        ItemDetails::new(self.name, self.description)
    }
}

impl CreateInboundRequest {
    pub fn into_record(self) -> Result<RecordInbound, axum::response::Response> {
        Ok(RecordInbound {
            item_id: item_id(&self.item_id)?,
            date: self.date,
            quantity: self.quantity,
            note: self.note,
        })
    }
}

impl CreateOutboundRequest {
    pub fn into_record(self) -> Result<RecordOutbound, axum::response::Response> {
        Ok(RecordOutbound {
            item_id: item_id(&self.item_id)?,
            date: self.date,
            quantity: self.quantity,
            recipient: self.recipient,
        })
    }
}

impl EditMovementRequest {
    pub fn into_edit(self) -> Result<MovementEdit, axum::response::Response> {
        Ok(MovementEdit {
            item_id: item_id(&self.item_id)?,
            date: self.date,
            quantity: self.quantity,
            note: self.note,
            recipient: self.recipient,
        })
    }
}

impl SupplierRequest {
    pub fn into_details(self) -> SupplierDetails {
        SupplierDetails {
            name: self.name,
            phone: self.phone,
            note: self.note,
        }
    }
}

fn item_id(raw: &str) -> Result<ItemId, axum::response::Response> {
    errors::parse_id(raw, "item")
}

// -------------------------
// Response helpers
// -------------------------

/// Listing envelope shared by every collection endpoint.
pub fn list<T: serde::Serialize>(items: Vec<T>) -> Value {
    json!({ "items": items })
}

pub fn item_receipt_to_json(receipt: &ItemReceipt) -> Value {
    json!({
        "item": ItemView::from(&receipt.item),
        "opening_movement_id": receipt.opening_movement,
    })
}
