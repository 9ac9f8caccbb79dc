use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, EntityId};

/// Note recorded on the inbound movement created for an item's opening quantity.
pub const OPENING_BALANCE_NOTE: &str = "opening balance";

/// Item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub EntityId);

impl ItemId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(EntityId::new())
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Display data of an item (everything an administrator may edit directly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub description: String,
}

impl ItemDetails {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Validate and trim surrounding whitespace.
    pub fn normalized(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        let description = self.description.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if description.is_empty() {
            return Err(DomainError::validation("item description cannot be empty"));
        }
        Ok(Self { name, description })
    }
}

/// Request to register a new item.
///
/// A positive `opening_quantity` is booked as an inbound movement, never written
/// straight into the balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub details: ItemDetails,
    pub opening_quantity: i64,
}

impl NewItem {
    pub fn validate(&self) -> DomainResult<()> {
        if self.opening_quantity < 0 {
            return Err(DomainError::validation("opening quantity cannot be negative"));
        }
        Ok(())
    }
}

/// Registry entry: one item and its single global balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    description: String,
    balance: i64,
    version: u64,
}

impl Item {
    /// Create a fresh item with a zero balance.
    pub fn new(id: ItemId, details: ItemDetails) -> DomainResult<Self> {
        let details = details.normalized()?;
        Ok(Self {
            id,
            name: details.name,
            description: details.description,
            balance: 0,
            version: 0,
        })
    }

    /// Rebuild an item from persisted state (no validation, storage is trusted).
    pub fn restore(
        id: ItemId,
        name: String,
        description: String,
        balance: i64,
        version: u64,
    ) -> Self {
        Self {
            id,
            name,
            description,
            balance,
            version,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Row version; bumped on every write so stores can compare-and-set.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn update_details(&mut self, details: ItemDetails) -> DomainResult<()> {
        let details = details.normalized()?;
        self.name = details.name;
        self.description = details.description;
        self.version += 1;
        Ok(())
    }

    /// Balance that applying `delta` would produce, without mutating.
    ///
    /// This is the only stock guard: the result may not be negative. There is no
    /// upper bound besides `i64` overflow.
    pub fn balance_after(&self, delta: i64) -> DomainResult<i64> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("balance overflow"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(self.id, self.balance, -delta));
        }
        Ok(next)
    }

    pub fn adjust_balance(&mut self, delta: i64) -> DomainResult<i64> {
        let next = self.balance_after(delta)?;
        self.balance = next;
        self.version += 1;
        Ok(next)
    }

    /// Exact inverse of a successful `adjust_balance(delta)`.
    pub(crate) fn compensate(&mut self, delta: i64) {
        self.balance -= delta;
        self.version -= 1;
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
