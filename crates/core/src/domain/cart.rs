use serde::{Deserialize, Serialize};

use crate::domain::product::ItemId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    ItemAdded { item_id: ItemId, added: u32, quantity: u32 },
    QuantityUpdated { item_id: ItemId, from: u32, to: u32 },
    ItemRemoved { item_id: ItemId, quantity: u32 },
    Cleared { lines: usize },
}

impl CartEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "cart.item_added",
            Self::QuantityUpdated { .. } => "cart.quantity_updated",
            Self::ItemRemoved { .. } => "cart.item_removed",
            Self::Cleared { .. } => "cart.cleared",
        }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::ItemAdded { item_id, .. }
            | Self::QuantityUpdated { item_id, .. }
            | Self::ItemRemoved { item_id, .. } => Some(*item_id),
            Self::Cleared { .. } => None,
        }
    }
}
