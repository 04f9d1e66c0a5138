use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for one item's quantity and for a template's total.
pub const MAX_ITEM_QUANTITY: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl EquipmentItem {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            category: None,
        }
    }

    /// Parse the `name:quantity` shorthand used on the command line.
    /// A missing quantity means one.
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, quantity) = match spec.rsplit_once(':') {
            Some((name, qty)) => (name, qty.trim().parse().ok()?),
            None => (spec, 1),
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, quantity))
    }
}

/// A named packing list issued to soldiers (e.g. "guard shift kit").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<EquipmentItem>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl EquipmentTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn item_index(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        self.items
            .iter()
            .position(|i| i.name.trim().to_lowercase() == needle)
    }

    /// Add an item, or add to its quantity if an item with the same name exists.
    /// Quantities saturate at `u32::MAX`; `validate` rejects that value.
    pub fn add_item(&mut self, item: EquipmentItem) {
        match self.item_index(&item.name) {
            Some(idx) => {
                let existing = &mut self.items[idx].quantity;
                *existing = existing.saturating_add(item.quantity);
            }
            None => self.items.push(item),
        }
        self.touch();
    }

    pub fn remove_item(&mut self, name: &str) -> Option<EquipmentItem> {
        let idx = self.item_index(name)?;
        let removed = self.items.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Set an item's quantity. Zero removes it. Returns false if no such item.
    pub fn set_quantity(&mut self, name: &str, quantity: u32) -> bool {
        let Some(idx) = self.item_index(name) else {
            return false;
        };
        if quantity == 0 {
            self.items.remove(idx);
        } else {
            self.items[idx].quantity = quantity;
        }
        self.touch();
        true
    }

    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.quantity))
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Template name is required".to_string());
        }
        if self.items.is_empty() {
            errors.push("Template must contain at least one item".to_string());
        }

        let total = self
            .items
            .iter()
            .try_fold(0u32, |total, i| total.checked_add(i.quantity));
        if total.map_or(true, |t| t > MAX_ITEM_QUANTITY) {
            errors.push(format!("Template cannot hold more than {} items", MAX_ITEM_QUANTITY));
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            if item.name.trim().is_empty() {
                errors.push("Item name is required".to_string());
                continue;
            }
            if item.quantity == 0 {
                errors.push(format!("Quantity of '{}' must be positive", item.name));
            } else if item.quantity > MAX_ITEM_QUANTITY {
                errors.push(format!(
                    "Quantity of '{}' cannot exceed {}",
                    item.name, MAX_ITEM_QUANTITY
                ));
            }
            if !seen.insert(item.name.trim().to_lowercase()) {
                errors.push(format!("Duplicate item '{}'", item.name));
            }
        }

        errors
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_spec() {
        assert_eq!(EquipmentItem::parse("vest:2"), Some(EquipmentItem::new("vest", 2)));
        assert_eq!(EquipmentItem::parse("helmet"), Some(EquipmentItem::new("helmet", 1)));
        assert_eq!(EquipmentItem::parse("radio: 3"), Some(EquipmentItem::new("radio", 3)));
        assert_eq!(EquipmentItem::parse(":3"), None);
        assert_eq!(EquipmentItem::parse("vest:many"), None);
    }

    #[test]
    fn test_add_item_merges_same_name() {
        let mut template = EquipmentTemplate::new("Guard kit");
        template.add_item(EquipmentItem::new("Magazine", 3));
        template.add_item(EquipmentItem::new("magazine ", 2));
        template.add_item(EquipmentItem::new("Flashlight", 1));

        assert_eq!(template.items.len(), 2);
        assert_eq!(template.items[0].quantity, 5);
        assert_eq!(template.total_quantity(), 6);
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut template = EquipmentTemplate::new("Guard kit");
        template.add_item(EquipmentItem::new("Magazine", 3));
        template.add_item(EquipmentItem::new("Radio", 1));

        assert!(template.set_quantity("radio", 2));
        assert_eq!(template.items[1].quantity, 2);
        assert!(template.set_quantity("Magazine", 0));
        assert_eq!(template.items.len(), 1);
        assert!(!template.set_quantity("Helmet", 1));

        assert_eq!(template.remove_item("RADIO").map(|i| i.quantity), Some(2));
        assert!(template.items.is_empty());
    }

    #[test]
    fn test_large_quantities_saturate_and_fail_validation() {
        let mut template = EquipmentTemplate::new("Ammo");
        template.add_item(EquipmentItem::parse("rounds:4294967295").unwrap());
        template.add_item(EquipmentItem::parse("rounds:10").unwrap());
        assert_eq!(template.items[0].quantity, u32::MAX);

        template.add_item(EquipmentItem::new("grenade", 2));
        assert_eq!(template.total_quantity(), u32::MAX);

        let errors = template.validate();
        assert!(errors.iter().any(|e| e.contains("cannot exceed")));
        assert!(errors.iter().any(|e| e.contains("more than")));

        let mut split = EquipmentTemplate::new("Ammo");
        split.add_item(EquipmentItem::new("rounds", MAX_ITEM_QUANTITY));
        split.add_item(EquipmentItem::new("tracers", 1));
        let errors = split.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("more than"));
    }

    #[test]
    fn test_validate() {
        let empty = EquipmentTemplate::new(" ");
        let errors = empty.validate();
        assert_eq!(errors.len(), 2);

        let mut dupes = EquipmentTemplate::new("Kit");
        dupes.items.push(EquipmentItem::new("Vest", 1));
        dupes.items.push(EquipmentItem::new("vest", 0));
        let errors = dupes.validate();
        assert!(errors.iter().any(|e| e.contains("Duplicate")));
        assert!(errors.iter().any(|e| e.contains("positive")));

        let mut good = EquipmentTemplate::new("Kit");
        good.add_item(EquipmentItem::new("Vest", 1));
        assert!(good.validate().is_empty());
    }
}
