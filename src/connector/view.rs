//! Connector-owned mirror of the widget's backing item array.
//!
//! The buffer always spans the full dataset length. Slots for pages that have
//! not been committed, or whose pages were cleared again, hold the
//! [`ItemSlot::Placeholder`] sentinel so that absolute indexing for every
//! other page stays intact.

use tracing::trace;

use crate::protocol::DataItem;

#[derive(Debug, Clone, PartialEq)]
pub enum ItemSlot {
    Placeholder,
    Loaded(DataItem),
}

impl ItemSlot {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ItemSlot::Placeholder)
    }

    pub fn item(&self) -> Option<&DataItem> {
        match self {
            ItemSlot::Loaded(item) => Some(item),
            ItemSlot::Placeholder => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ItemView {
    slots: Vec<ItemSlot>,
}

impl ItemView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ItemSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[ItemSlot] {
        &self.slots
    }

    /// Grows or shrinks the buffer to the dataset length. New slots start as
    /// placeholders.
    pub fn resize(&mut self, len: usize) {
        self.slots.resize(len, ItemSlot::Placeholder);
    }

    /// Writes a committed page's items starting at `start`, growing the
    /// buffer if the page reaches past its current end.
    pub fn write_items(&mut self, start: usize, items: &[DataItem]) {
        let required = start + items.len();
        if required > self.slots.len() {
            trace!(
                target = "connector::view",
                start,
                required,
                len = self.slots.len(),
                "extending view for committed items"
            );
            self.slots.resize(required, ItemSlot::Placeholder);
        }
        for (offset, item) in items.iter().enumerate() {
            self.slots[start + offset] = ItemSlot::Loaded(item.clone());
        }
    }

    /// Resets `[start, end)` back to placeholders, bounded by the buffer
    /// length so the other pages keep their positions.
    pub fn clear_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.slots.len());
        for slot in &mut self.slots[start.min(end)..end] {
            *slot = ItemSlot::Placeholder;
        }
    }

    /// Resets every slot to a placeholder without changing the length.
    pub fn invalidate(&mut self) {
        for slot in &mut self.slots {
            *slot = ItemSlot::Placeholder;
        }
    }

    /// Replaces the first loaded item with a matching key. Returns whether a
    /// slot was patched.
    pub fn patch_by_key(&mut self, item: &DataItem) -> bool {
        for slot in &mut self.slots {
            if let ItemSlot::Loaded(existing) = slot
                && existing.key == item.key
            {
                *slot = ItemSlot::Loaded(item.clone());
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(key: &str, label: &str) -> DataItem {
        DataItem::new(key).with_field("label", json!(label))
    }

    #[test]
    fn clearing_a_range_keeps_the_length() {
        let mut view = ItemView::new();
        view.resize(10);
        view.write_items(0, &[item("0", "a"), item("1", "b")]);
        view.clear_range(0, 5);
        assert_eq!(view.len(), 10);
        assert!(view.get(0).is_some_and(ItemSlot::is_placeholder));
        assert!(view.get(1).is_some_and(ItemSlot::is_placeholder));
    }

    #[test]
    fn clear_range_is_bounded_by_the_buffer() {
        let mut view = ItemView::new();
        view.resize(3);
        view.clear_range(2, 50);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn writing_past_the_end_grows_the_buffer() {
        let mut view = ItemView::new();
        view.resize(1);
        view.write_items(4, &[item("4", "e")]);
        assert_eq!(view.len(), 5);
        assert!(view.get(3).is_some_and(ItemSlot::is_placeholder));
        assert!(view.get(4).is_some_and(|slot| !slot.is_placeholder()));
    }

    #[test]
    fn patch_by_key_replaces_only_the_matching_slot() {
        let mut view = ItemView::new();
        view.write_items(0, &[item("0", "a"), item("1", "b")]);
        assert!(view.patch_by_key(&item("1", "patched")));
        assert!(!view.patch_by_key(&item("9", "missing")));
        let patched = view.get(1).and_then(ItemSlot::item).expect("loaded");
        assert_eq!(patched.label("label"), "patched");
    }
}
