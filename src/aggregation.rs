//! # Aggregation Module
//!
//! Merges cleaned items into the final result set. Two variants exist and a
//! deployment must stick to one, since they change what "the same item" means:
//!
//! - [`ItemSet`]: distinct names only
//! - [`QuantityLedger`]: keyed by (name, unit), quantities summed, notes joined

use crate::need_types::{DedupPolicy, NeededItem};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Separator placed between notes of merged items
pub const NOTE_SEPARATOR: &str = " / ";

/// Set-of-names variant
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    names: HashSet<String>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the name was already present
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> HashSet<String> {
        self.names
    }

    /// Items carrying only a name
    pub fn into_items(self) -> Vec<NeededItem> {
        self.names
            .into_iter()
            .map(|name| NeededItem::named(&name))
            .collect()
    }
}

/// Quantity-merging variant
#[derive(Debug, Clone, Default)]
pub struct QuantityLedger {
    entries: HashMap<(String, Option<String>), NeededItem>,
}

impl QuantityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, merging it into an existing entry with the same (name, unit)
    pub fn add(&mut self, item: NeededItem) {
        let key = (item.name.clone(), item.unit.clone());
        match self.entries.get_mut(&key) {
            Some(existing) => {
                trace!("Merging '{}' ({:?}) into existing entry", item.name, item.unit);
                merge_into(existing, item);
            }
            None => {
                self.entries.insert(key, item);
            }
        }
    }

    pub fn get(&self, name: &str, unit: Option<&str>) -> Option<&NeededItem> {
        self.entries
            .get(&(name.to_string(), unit.map(str::to_string)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_items(self) -> Vec<NeededItem> {
        self.entries.into_values().collect()
    }
}

/// Fold `item` into `existing`
///
/// Quantities add up, a missing quantity never erases a known one, and a note
/// is appended only when it is not already part of the accumulated note.
pub fn merge_into(existing: &mut NeededItem, item: NeededItem) {
    existing.quantity = match (existing.quantity, item.quantity) {
        (Some(a), Some(b)) => Some(a + b),
        (None, Some(b)) => Some(b),
        (current, None) => current,
    };

    if let Some(new) = item.note {
        match existing.note.as_mut() {
            Some(current) => {
                if !current.contains(new.as_str()) {
                    current.push_str(NOTE_SEPARATOR);
                    current.push_str(&new);
                }
            }
            None => existing.note = Some(new),
        }
    }
}

/// Aggregate cleaned items with the given policy; output order is unspecified
pub fn aggregate<I>(items: I, policy: DedupPolicy) -> Vec<NeededItem>
where
    I: IntoIterator<Item = NeededItem>,
{
    match policy {
        DedupPolicy::ByName => {
            let mut set = ItemSet::new();
            for item in items {
                set.insert(&item.name);
            }
            set.into_items()
        }
        DedupPolicy::ByNameAndUnit => {
            let mut ledger = QuantityLedger::new();
            for item in items {
                ledger.add(item);
            }
            ledger.into_items()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantities_sum_for_same_name_and_unit() {
        let merged = aggregate(
            vec![
                NeededItem::named("ケーブル").with_quantity(2.0, Some("本")),
                NeededItem::named("ケーブル").with_quantity(3.0, Some("本")),
            ],
            DedupPolicy::ByNameAndUnit,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "ケーブル");
        assert_eq!(merged[0].quantity, Some(5.0));
        assert_eq!(merged[0].unit.as_deref(), Some("本"));
    }

    #[test]
    fn test_different_units_stay_separate() {
        let mut ledger = QuantityLedger::new();
        ledger.add(NeededItem::named("ケーブル").with_quantity(2.0, Some("本")));
        ledger.add(NeededItem::named("ケーブル").with_quantity(10.0, Some("m")));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("ケーブル", Some("m")).unwrap().quantity, Some(10.0));
    }

    #[test]
    fn test_missing_quantities() {
        let mut ledger = QuantityLedger::new();
        ledger.add(NeededItem::named("脚立"));
        ledger.add(NeededItem::named("脚立"));
        assert_eq!(ledger.get("脚立", None).unwrap().quantity, None);

        ledger.add(NeededItem::named("脚立").with_quantity(1.0, None));
        ledger.add(NeededItem::named("脚立"));
        assert_eq!(ledger.get("脚立", None).unwrap().quantity, Some(1.0));
    }

    #[test]
    fn test_notes_are_not_repeated() {
        let mut existing = NeededItem::named("脚立").with_note("脚立が必要");
        merge_into(&mut existing, NeededItem::named("脚立").with_note("脚立が必要"));
        assert_eq!(existing.note.as_deref(), Some("脚立が必要"));

        merge_into(&mut existing, NeededItem::named("脚立").with_note("脚立を手配"));
        assert_eq!(existing.note.as_deref(), Some("脚立が必要 / 脚立を手配"));

        merge_into(&mut existing, NeededItem::named("脚立").with_note("脚立を手配"));
        assert_eq!(existing.note.as_deref(), Some("脚立が必要 / 脚立を手配"));

        let mut bare = NeededItem::named("脚立");
        merge_into(&mut bare, NeededItem::named("脚立").with_note("脚立を手配"));
        assert_eq!(bare.note.as_deref(), Some("脚立を手配"));
    }

    #[test]
    fn test_name_policy_drops_details() {
        let merged = aggregate(
            vec![
                NeededItem::named("ケーブル").with_quantity(2.0, Some("本")),
                NeededItem::named("ケーブル").with_quantity(10.0, Some("m")),
                NeededItem::named("テスター").with_note("テスターを用意"),
            ],
            DedupPolicy::ByName,
        );
        let names: HashSet<String> = merged.iter().map(|i| i.name.clone()).collect();
        assert_eq!(merged.len(), 2);
        assert!(names.contains("ケーブル"));
        assert!(names.contains("テスター"));
        assert!(merged.iter().all(|i| i.quantity.is_none() && i.note.is_none()));
    }

    #[test]
    fn test_item_set() {
        let mut set = ItemSet::new();
        assert!(set.insert("脚立"));
        assert!(!set.insert("脚立"));
        assert!(set.contains("脚立"));
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }
}
