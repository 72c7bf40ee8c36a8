use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::service::ServiceId;

/// Per-line quantity ceiling; larger requests are stored as this value.
pub const MAX_QUANTITY: u32 = 999;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedService {
    pub service_id: ServiceId,
    pub name: String,
    pub unit_price: Decimal,
    quantity: u32,
}

impl SelectedService {
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Services chosen in a session, keyed by service id.
///
/// Entries keep insertion order for display. A present entry always has
/// `1 <= quantity <= MAX_QUANTITY`; dropping to zero is expressed by removing
/// the entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    entries: Vec<SelectedService>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.position(service_id).is_some()
    }

    pub fn get(&self, service_id: &ServiceId) -> Option<&SelectedService> {
        self.entries.iter().find(|entry| &entry.service_id == service_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedService> {
        self.entries.iter()
    }

    pub fn service_ids(&self) -> BTreeSet<ServiceId> {
        self.entries.iter().map(|entry| entry.service_id.clone()).collect()
    }

    /// Adds a new entry. Returns `false` without touching anything when the id
    /// is already present.
    pub fn insert(
        &mut self,
        service_id: ServiceId,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> bool {
        if self.contains(&service_id) {
            return false;
        }
        self.entries.push(SelectedService {
            service_id,
            name: name.into(),
            unit_price,
            quantity: quantity.clamp(1, MAX_QUANTITY),
        });
        true
    }

    pub fn remove(&mut self, service_id: &ServiceId) -> Option<SelectedService> {
        self.position(service_id).map(|index| self.entries.remove(index))
    }

    /// Sets the quantity of an existing entry, clamped to `1..=MAX_QUANTITY`.
    /// Returns the stored quantity, or `None` when the id is not selected.
    pub fn set_quantity(&mut self, service_id: &ServiceId, quantity: u32) -> Option<u32> {
        let entry = self.entries.iter_mut().find(|entry| &entry.service_id == service_id)?;
        entry.quantity = quantity.clamp(1, MAX_QUANTITY);
        Some(entry.quantity)
    }

    /// Re-resolves every unit price, leaving ids, order and quantities alone.
    pub fn reprice<F>(&mut self, mut resolve: F)
    where
        F: FnMut(&ServiceId) -> Decimal,
    {
        for entry in &mut self.entries {
            entry.unit_price = resolve(&entry.service_id);
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.entries.iter().map(SelectedService::line_total).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, service_id: &ServiceId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.service_id == service_id)
    }
}
