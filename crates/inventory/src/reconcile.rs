//! Reconciliation planning: which balance changes a ledger mutation implies.
//!
//! A plan is an ordered list of [`StockEffect`]s. An edit on the same item is a
//! single net step, so only the final balance is checked against zero. An edit
//! that moves a movement to another item reverses the old item first and then
//! charges the new one. Applying a plan is all-or-nothing: when a step fails,
//! the steps already applied are compensated before the error is returned.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult};

use crate::item::{Item, ItemId};
use crate::movement::{Movement, StockEffect};

/// Balance of one item before and after an applied plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub item_id: ItemId,
    pub before: i64,
    pub after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconciliationPlan {
    steps: Vec<StockEffect>,
    touched: BTreeSet<ItemId>,
}

impl ReconciliationPlan {
    pub fn for_create(movement: &Movement) -> Self {
        let effect = movement.effect();
        Self {
            steps: vec![effect],
            touched: BTreeSet::from([effect.item_id]),
        }
    }

    /// Replace `old`'s effect with `new`'s.
    ///
    /// On one item this is the net difference. Across items `old` is reversed
    /// on its item before `new` is charged on the other.
    pub fn for_edit(old: &Movement, new: &Movement) -> DomainResult<Self> {
        if old.id_typed() != new.id_typed() {
            return Err(DomainError::invariant("edit must keep the movement id"));
        }
        if old.kind() != new.kind() {
            return Err(DomainError::invariant("movement kind cannot change"));
        }

        let before = old.effect();
        let after = new.effect();
        let touched = BTreeSet::from([before.item_id, after.item_id]);

        // Date/note/recipient-only edits leave balances alone.
        if before == after {
            return Ok(Self {
                steps: Vec::new(),
                touched,
            });
        }

        let steps = if before.item_id == after.item_id {
            vec![StockEffect {
                item_id: after.item_id,
                delta: after.delta - before.delta,
            }]
        } else {
            vec![before.reversed(), after]
        };
        Ok(Self { steps, touched })
    }

    pub fn for_delete(old: &Movement) -> Self {
        let effect = old.effect().reversed();
        Self {
            steps: vec![effect],
            touched: BTreeSet::from([effect.item_id]),
        }
    }

    /// Items this plan reads or writes, ascending. This is the lock order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.touched.iter().copied().collect()
    }

    /// Apply every step to `items`.
    ///
    /// On failure `items` is left exactly as it was passed in (balances and
    /// versions), and the first error is returned.
    pub fn apply(&self, items: &mut BTreeMap<ItemId, Item>) -> DomainResult<Vec<BalanceChange>> {
        let mut changes = Vec::with_capacity(self.touched.len());
        for id in &self.touched {
            let item = items
                .get(id)
                .ok_or_else(|| DomainError::not_found(format!("item {id}")))?;
            changes.push(BalanceChange {
                item_id: *id,
                before: item.balance(),
                after: item.balance(),
            });
        }

        let mut applied: Vec<StockEffect> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let outcome = match items.get_mut(&step.item_id) {
                Some(item) => item.adjust_balance(step.delta).map(|_| ()),
                None => Err(DomainError::not_found(format!("item {}", step.item_id))),
            };
            if let Err(err) = outcome {
                compensate(items, &applied);
                return Err(err);
            }
            applied.push(*step);
        }

        for change in &mut changes {
            if let Some(item) = items.get(&change.item_id) {
                change.after = item.balance();
            }
        }
        Ok(changes)
    }
}

fn compensate(items: &mut BTreeMap<ItemId, Item>, applied: &[StockEffect]) {
    for step in applied.iter().rev() {
        if let Some(item) = items.get_mut(&step.item_id) {
            item.compensate(step.delta);
        }
    }
}
