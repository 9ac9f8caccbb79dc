//! Offline consistency check: recompute balances from the ledgers.
//!
//! The engine maintains balances incrementally; this module is the slow path
//! used to verify that nothing drifted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId};
use crate::movement::Movement;

/// Net balance per item implied by the given movements.
pub fn derive_balances<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> BTreeMap<ItemId, i64> {
    let mut balances = BTreeMap::new();
    for movement in movements {
        let effect = movement.effect();
        *balances.entry(effect.item_id).or_insert(0) += effect.delta;
    }
    balances
}

/// An item whose stored balance disagrees with its ledger history.
///
/// `recorded` is `None` when movements reference an item that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub item_id: ItemId,
    pub recorded: Option<i64>,
    pub derived: i64,
}

pub fn find_discrepancies<'a>(
    items: &[Item],
    movements: impl IntoIterator<Item = &'a Movement>,
) -> Vec<BalanceDiscrepancy> {
    let derived = derive_balances(movements);
    let recorded: BTreeMap<ItemId, i64> = items.iter().map(|i| (i.id_typed(), i.balance())).collect();

    let all: BTreeSet<ItemId> = derived.keys().chain(recorded.keys()).copied().collect();
    all.into_iter()
        .filter_map(|item_id| {
            let stored = recorded.get(&item_id).copied();
            let net = derived.get(&item_id).copied().unwrap_or(0);
            if stored == Some(net) {
                None
            } else {
                Some(BalanceDiscrepancy {
                    item_id,
                    recorded: stored,
                    derived: net,
                })
            }
        })
        .collect()
}
