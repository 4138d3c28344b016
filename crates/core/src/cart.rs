use std::sync::{Arc, Mutex};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::cart::{CartEvent, CartLine};
use crate::domain::product::{placeholder_name, CatalogItem, ItemId};

pub trait CartObserver: Send + Sync {
    fn cart_changed(&self, event: &CartEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryCartObserver {
    events: Arc<Mutex<Vec<CartEvent>>>,
}

impl InMemoryCartObserver {
    pub fn events(&self) -> Vec<CartEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CartObserver for InMemoryCartObserver {
    fn cart_changed(&self, event: &CartEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// One row of the `getCartInfo` snapshot. Unit price and line total render as
/// JSON numbers; the cart-wide `totalPrice` stays a two-decimal string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemInfo {
    pub id: ItemId,
    pub name: String,
    pub quantity: u32,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub unique_items: usize,
    pub total_price: String,
    pub items: Vec<CartItemInfo>,
}

impl CartSummary {
    pub fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|item| CartLine { item_id: item.id, quantity: item.quantity })
            .collect()
    }
}

/// Single-writer cart state. Lines keep insertion order and there is at most
/// one line per item id, always with a quantity of at least one.
pub struct CartEngine {
    catalog: Arc<Catalog>,
    lines: Vec<CartLine>,
    observers: Vec<Arc<dyn CartObserver>>,
}

impl CartEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog, lines: Vec::new(), observers: Vec::new() }
    }

    pub fn with_lines(catalog: Arc<Catalog>, lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut engine = Self::new(catalog);
        engine.restore(lines);
        engine
    }

    pub fn subscribe(&mut self, observer: Arc<dyn CartObserver>) {
        self.observers.push(observer);
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Merges into an existing line or appends a new one. Unknown catalog ids
    /// are accepted as zero-priced lines. Non-positive quantities adjust the
    /// existing line instead, removing it once it would drop to zero.
    pub fn add_item(&mut self, item_id: ItemId, quantity: i64) {
        if quantity <= 0 {
            if quantity < 0 {
                let target = i64::from(self.quantity(item_id)).saturating_add(quantity);
                self.update_quantity(item_id, target);
            }
            return;
        }

        let added = clamp_quantity(quantity);
        let updated = match self.line_mut(item_id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(added);
                line.quantity
            }
            None => {
                self.lines.push(CartLine { item_id, quantity: added });
                added
            }
        };

        self.notify(CartEvent::ItemAdded { item_id, added, quantity: updated });
    }

    pub fn remove_item(&mut self, item_id: ItemId) {
        let Some(index) = self.lines.iter().position(|line| line.item_id == item_id) else {
            return;
        };

        let removed = self.lines.remove(index);
        self.notify(CartEvent::ItemRemoved { item_id, quantity: removed.quantity });
    }

    /// Sets the quantity absolutely. Zero or below removes the line.
    pub fn update_quantity(&mut self, item_id: ItemId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(item_id);
            return;
        }

        let quantity = clamp_quantity(quantity);
        let previous = match self.line_mut(item_id) {
            Some(line) => std::mem::replace(&mut line.quantity, quantity),
            None => {
                self.lines.push(CartLine { item_id, quantity });
                0
            }
        };

        if previous != quantity {
            self.notify(CartEvent::QuantityUpdated { item_id, from: previous, to: quantity });
        }
    }

    /// Empties the cart. Clearing an empty cart is a no-op and emits nothing.
    pub fn clear(&mut self) {
        let lines = self.lines.len();
        if lines == 0 {
            return;
        }
        self.lines.clear();
        self.notify(CartEvent::Cleared { lines });
    }

    /// Rebuilds the cart from serialized lines, merging duplicate ids and
    /// dropping empty lines. Observers are not notified.
    pub fn restore(&mut self, lines: impl IntoIterator<Item = CartLine>) {
        self.lines.clear();
        for incoming in lines.into_iter().filter(|line| line.quantity > 0) {
            match self.line_mut(incoming.item_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(incoming.quantity),
                None => self.lines.push(incoming),
            }
        }
    }

    pub fn quantity(&self, item_id: ItemId) -> u32 {
        self.lines.iter().find(|line| line.item_id == item_id).map_or(0, |line| line.quantity)
    }

    pub fn item_details(&self, item_id: ItemId) -> Option<&CatalogItem> {
        self.catalog.find(item_id)
    }

    /// Catalog name, or the placeholder for ids the catalog does not know.
    pub fn display_name(&self, item_id: ItemId) -> String {
        self.item_details(item_id)
            .map(|item| item.name.clone())
            .unwrap_or_else(|| placeholder_name(item_id))
    }

    pub fn unit_price(&self, item_id: ItemId) -> Decimal {
        self.item_details(item_id).map_or(Decimal::ZERO, |item| item.price_eur)
    }

    pub fn unique_item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn total_price(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| self.unit_price(line.item_id) * Decimal::from(line.quantity))
            .sum()
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.lines.iter().map(|line| line.item_id).collect()
    }

    pub fn summary(&self) -> CartSummary {
        let items = self
            .lines
            .iter()
            .map(|line| {
                let price = self.unit_price(line.item_id);
                CartItemInfo {
                    id: line.item_id,
                    name: self.display_name(line.item_id),
                    quantity: line.quantity,
                    price,
                    total: price * Decimal::from(line.quantity),
                }
            })
            .collect();

        CartSummary {
            unique_items: self.unique_item_count(),
            total_price: format_price(self.total_price()),
            items,
        }
    }

    fn line_mut(&mut self, item_id: ItemId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.item_id == item_id)
    }

    fn notify(&self, event: CartEvent) {
        for observer in &self.observers {
            observer.cart_changed(&event);
        }
    }
}

pub fn format_price(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity).unwrap_or(u32::MAX)
}
