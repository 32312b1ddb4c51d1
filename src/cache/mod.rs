//! Page-granular cache for items received from the server.
//!
//! The cache is intentionally dumb storage: pages go in under their index and
//! come back out unchanged. Which pages live here, and when they are dropped,
//! is decided entirely by the connector driving it — there is no internal
//! eviction policy.

use std::collections::HashMap;

use crate::protocol::DataItem;

#[derive(Debug, Default)]
pub struct PageCache {
    pages: HashMap<usize, Vec<DataItem>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: usize) -> Option<&[DataItem]> {
        self.pages.get(&page).map(Vec::as_slice)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn put(&mut self, page: usize, items: Vec<DataItem>) {
        self.pages.insert(page, items);
    }

    /// Removes and returns the page, used when a commit consumes the entry.
    pub fn take(&mut self, page: usize) -> Option<Vec<DataItem>> {
        self.pages.remove(&page)
    }

    pub fn delete(&mut self, page: usize) {
        self.pages.remove(&page);
    }

    pub fn clear_all(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DataItem;

    fn page(len: usize) -> Vec<DataItem> {
        (0..len).map(|i| DataItem::new(i.to_string())).collect()
    }

    #[test]
    fn put_then_get_returns_the_same_items() {
        let mut cache = PageCache::new();
        cache.put(2, page(3));
        assert_eq!(cache.get(2).map(<[DataItem]>::len), Some(3));
        assert!(cache.contains(2));
        assert!(!cache.contains(0));
    }

    #[test]
    fn take_consumes_the_entry() {
        let mut cache = PageCache::new();
        cache.put(0, page(2));
        assert_eq!(cache.take(0).map(|items| items.len()), Some(2));
        assert!(cache.is_empty());
        assert!(cache.take(0).is_none());
    }

    #[test]
    fn clear_all_drops_every_page() {
        let mut cache = PageCache::new();
        cache.put(0, page(1));
        cache.put(5, page(1));
        assert_eq!(cache.len(), 2);
        cache.clear_all();
        assert!(cache.is_empty());
    }
}
