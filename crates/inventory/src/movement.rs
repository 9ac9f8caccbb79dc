use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockflow_core::{ActorId, DomainError, DomainResult, Entity, EntityId, ValueObject};

use crate::item::ItemId;

/// Movement identifier (shared id space across both ledgers).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub EntityId);

impl MovementId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(EntityId::new())
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for MovementId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Direction of a movement. Never changes for the lifetime of a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Inbound,
    Outbound,
}

impl MovementKind {
    /// Sign of the balance effect: `+1` for inbound, `-1` for outbound.
    pub fn sign(self) -> i64 {
        match self {
            MovementKind::Inbound => 1,
            MovementKind::Outbound => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbound" => Ok(MovementKind::Inbound),
            "outbound" => Ok(MovementKind::Outbound),
            other => Err(DomainError::validation(format!(
                "unknown movement kind '{other}' (expected inbound or outbound)"
            ))),
        }
    }
}

/// Strictly positive unit count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Signed change a movement makes to one item's balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockEffect {
    pub item_id: ItemId,
    pub delta: i64,
}

impl StockEffect {
    pub fn reversed(self) -> Self {
        Self {
            item_id: self.item_id,
            delta: -self.delta,
        }
    }
}

impl ValueObject for StockEffect {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub quantity: Quantity,
    pub note: String,
    pub recorded_by: ActorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub recipient: String,
    pub quantity: Quantity,
    pub recorded_by: ActorId,
}

impl Entity for InboundMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for OutboundMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A ledger row of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Movement {
    Inbound(InboundMovement),
    Outbound(OutboundMovement),
}

impl Movement {
    pub fn id_typed(&self) -> MovementId {
        match self {
            Movement::Inbound(m) => m.id,
            Movement::Outbound(m) => m.id,
        }
    }

    pub fn kind(&self) -> MovementKind {
        match self {
            Movement::Inbound(_) => MovementKind::Inbound,
            Movement::Outbound(_) => MovementKind::Outbound,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            Movement::Inbound(m) => m.item_id,
            Movement::Outbound(m) => m.item_id,
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Movement::Inbound(m) => m.quantity,
            Movement::Outbound(m) => m.quantity,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Movement::Inbound(m) => m.date,
            Movement::Outbound(m) => m.date,
        }
    }

    pub fn recorded_by(&self) -> ActorId {
        match self {
            Movement::Inbound(m) => m.recorded_by,
            Movement::Outbound(m) => m.recorded_by,
        }
    }

    /// The balance change this movement is responsible for.
    pub fn effect(&self) -> StockEffect {
        StockEffect {
            item_id: self.item_id(),
            delta: self.kind().sign() * self.quantity().get(),
        }
    }

    /// Build the replacement record for an edit. Identity and kind are kept.
    pub fn edited(&self, edit: &MovementEdit, actor: ActorId) -> DomainResult<Movement> {
        let quantity = Quantity::new(edit.quantity)?;
        match self {
            Movement::Inbound(m) => {
                if edit.recipient.is_some() {
                    return Err(DomainError::validation(
                        "recipient applies to outbound movements only",
                    ));
                }
                let note = match &edit.note {
                    Some(note) => note.trim().to_string(),
                    None => m.note.clone(),
                };
                Ok(Movement::Inbound(InboundMovement {
                    id: m.id,
                    item_id: edit.item_id,
                    date: edit.date,
                    quantity,
                    note,
                    recorded_by: actor,
                }))
            }
            Movement::Outbound(m) => {
                if edit.note.is_some() {
                    return Err(DomainError::validation("note applies to inbound movements only"));
                }
                let recipient = match &edit.recipient {
                    Some(recipient) => required_recipient(recipient)?,
                    None => m.recipient.clone(),
                };
                Ok(Movement::Outbound(OutboundMovement {
                    id: m.id,
                    item_id: edit.item_id,
                    date: edit.date,
                    recipient,
                    quantity,
                    recorded_by: actor,
                }))
            }
        }
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        match self {
            Movement::Inbound(m) => &m.id,
            Movement::Outbound(m) => &m.id,
        }
    }
}

fn required_recipient(raw: &str) -> DomainResult<String> {
    let recipient = raw.trim();
    if recipient.is_empty() {
        return Err(DomainError::validation("recipient cannot be empty"));
    }
    Ok(recipient.to_string())
}

/// Request: record goods received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInbound {
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub quantity: i64,
    pub note: String,
}

impl RecordInbound {
    pub fn into_movement(self, id: MovementId, actor: ActorId) -> DomainResult<Movement> {
        let quantity = Quantity::new(self.quantity)?;
        Ok(Movement::Inbound(InboundMovement {
            id,
            item_id: self.item_id,
            date: self.date,
            quantity,
            note: self.note.trim().to_string(),
            recorded_by: actor,
        }))
    }
}

/// Request: record goods issued to a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutbound {
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub quantity: i64,
    pub recipient: String,
}

impl RecordOutbound {
    pub fn into_movement(self, id: MovementId, actor: ActorId) -> DomainResult<Movement> {
        let quantity = Quantity::new(self.quantity)?;
        let recipient = required_recipient(&self.recipient)?;
        Ok(Movement::Outbound(OutboundMovement {
            id,
            item_id: self.item_id,
            date: self.date,
            recipient,
            quantity,
            recorded_by: actor,
        }))
    }
}

/// Request: change an existing movement.
///
/// `note` is only valid for inbound rows and `recipient` only for outbound rows;
/// `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementEdit {
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub quantity: i64,
    pub note: Option<String>,
    pub recipient: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    fn outbound(item_id: ItemId, quantity: i64) -> Movement {
        RecordOutbound {
            item_id,
            date: date(),
            quantity,
            recipient: "Toko Sinar".to_string(),
        }
        .into_movement(MovementId::generate(), ActorId::new())
        .unwrap()
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(Quantity::new(1).is_ok());
        assert!(matches!(Quantity::new(0), Err(DomainError::Validation(_))));
        assert!(matches!(Quantity::new(-3), Err(DomainError::Validation(_))));
    }

    #[test]
    fn quantity_deserialization_validates() {
        let ok: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }

    #[test]
    fn effect_sign_follows_kind() {
        let item = ItemId::generate();
        let inbound = RecordInbound {
            item_id: item,
            date: date(),
            quantity: 7,
            note: String::new(),
        }
        .into_movement(MovementId::generate(), ActorId::new())
        .unwrap();

        assert_eq!(inbound.effect(), StockEffect { item_id: item, delta: 7 });
        assert_eq!(outbound(item, 4).effect(), StockEffect { item_id: item, delta: -4 });
    }

    #[test]
    fn outbound_requires_recipient() {
        let err = RecordOutbound {
            item_id: ItemId::generate(),
            date: date(),
            quantity: 1,
            recipient: "  ".to_string(),
        }
        .into_movement(MovementId::generate(), ActorId::new())
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn edit_keeps_identity_and_kind() {
        let original = outbound(ItemId::generate(), 3);
        let other_item = ItemId::generate();
        let editor = ActorId::new();
        let edit = MovementEdit {
            item_id: other_item,
            date: date(),
            quantity: 5,
            note: None,
            recipient: None,
        };

        let edited = original.edited(&edit, editor).unwrap();
        assert_eq!(edited.id_typed(), original.id_typed());
        assert_eq!(edited.kind(), MovementKind::Outbound);
        assert_eq!(edited.item_id(), other_item);
        assert_eq!(edited.quantity().get(), 5);
        assert_eq!(edited.recorded_by(), editor);
        match edited {
            Movement::Outbound(m) => assert_eq!(m.recipient, "Toko Sinar"),
            _ => panic!("Expected outbound movement"),
        }
    }

    #[test]
    fn edit_rejects_field_of_other_kind() {
        let original = outbound(ItemId::generate(), 3);
        let edit = MovementEdit {
            item_id: original.item_id(),
            date: date(),
            quantity: 3,
            note: Some("misplaced".to_string()),
            recipient: None,
        };
        assert!(matches!(
            original.edited(&edit, ActorId::new()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn edit_rejects_non_positive_quantity() {
        let original = outbound(ItemId::generate(), 3);
        let edit = MovementEdit {
            item_id: original.item_id(),
            date: date(),
            quantity: 0,
            note: None,
            recipient: None,
        };
        assert!(original.edited(&edit, ActorId::new()).is_err());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Inbound".parse::<MovementKind>().unwrap(), MovementKind::Inbound);
        assert_eq!("outbound".parse::<MovementKind>().unwrap(), MovementKind::Outbound);
        assert!("sideways".parse::<MovementKind>().is_err());
    }
}
