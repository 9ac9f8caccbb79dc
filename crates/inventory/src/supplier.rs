use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, EntityId};

/// Supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub EntityId);

impl SupplierId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(EntityId::new())
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for SupplierId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Editable supplier fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDetails {
    pub name: String,
    pub phone: String,
    pub note: String,
}

impl SupplierDetails {
    fn normalized(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        Ok(Self {
            name,
            phone: self.phone.trim().to_string(),
            note: self.note.trim().to_string(),
        })
    }
}

/// Directory entry for a vendor goods are received from. Never affects stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub phone: String,
    pub note: String,
}

impl Supplier {
    pub fn new(id: SupplierId, details: SupplierDetails) -> DomainResult<Self> {
        let details = details.normalized()?;
        Ok(Self {
            id,
            name: details.name,
            phone: details.phone,
            note: details.note,
        })
    }

    pub fn update(&mut self, details: SupplierDetails) -> DomainResult<()> {
        let details = details.normalized()?;
        self.name = details.name;
        self.phone = details.phone;
        self.note = details.note;
        Ok(())
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
