//! Inventory domain module.
//!
//! This crate contains business rules for stock keeping, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): the item registry
//! entity, the two movement ledgers, the reconciliation planner that keeps
//! balances consistent with them, and the supplier directory.

pub mod consistency;
pub mod item;
pub mod movement;
pub mod reconcile;
pub mod supplier;

pub use consistency::{BalanceDiscrepancy, derive_balances, find_discrepancies};
pub use item::{Item, ItemDetails, ItemId, NewItem, OPENING_BALANCE_NOTE};
pub use movement::{
    InboundMovement, Movement, MovementEdit, MovementId, MovementKind, OutboundMovement, Quantity,
    RecordInbound, RecordOutbound, StockEffect,
};
pub use reconcile::{BalanceChange, ReconciliationPlan};
pub use supplier::{Supplier, SupplierDetails, SupplierId};
