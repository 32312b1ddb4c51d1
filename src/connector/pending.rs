//! Bookkeeping for pages the widget is currently waiting on.

use std::collections::BTreeMap;

use tracing::trace;

use crate::protocol::DataItem;

type ResolveFn = Box<dyn FnOnce(Vec<DataItem>, usize) + Send>;

/// Single-shot completion handle for one page request. Resolving consumes
/// the handle, so a callback can never fire twice.
pub struct PageCallback {
    resolve: ResolveFn,
}

impl PageCallback {
    pub fn new(resolve: impl FnOnce(Vec<DataItem>, usize) + Send + 'static) -> Self {
        Self {
            resolve: Box::new(resolve),
        }
    }

    pub fn resolve(self, items: Vec<DataItem>, size: usize) {
        (self.resolve)(items, size);
    }
}

impl std::fmt::Debug for PageCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageCallback")
    }
}

/// The active page set: page index -> pending callback. During steady-state
/// scrolling the keys form one contiguous run; the connector watches min/max
/// to catch jumps that break it.
#[derive(Debug, Default)]
pub struct PendingPages {
    callbacks: BTreeMap<usize, PageCallback>,
}

impl PendingPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for `page`. A previous callback for the same
    /// page is dropped unresolved; the widget only waits on its newest
    /// request per page.
    pub fn insert(&mut self, page: usize, callback: PageCallback) {
        if self.callbacks.insert(page, callback).is_some() {
            trace!(
                target = "connector::pending",
                page, "replaced a pending callback"
            );
        }
    }

    pub fn remove(&mut self, page: usize) -> Option<PageCallback> {
        self.callbacks.remove(&page)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.callbacks.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn min_page(&self) -> Option<usize> {
        self.callbacks.keys().next().copied()
    }

    pub fn max_page(&self) -> Option<usize> {
        self.callbacks.keys().next_back().copied()
    }

    pub fn pages(&self) -> Vec<usize> {
        self.callbacks.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> PageCallback {
        let counter = Arc::clone(counter);
        PageCallback::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn tracks_the_active_range_bounds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pending = PendingPages::new();
        assert_eq!(pending.min_page(), None);

        pending.insert(3, counting_callback(&counter));
        pending.insert(5, counting_callback(&counter));
        pending.insert(4, counting_callback(&counter));
        assert_eq!(pending.min_page(), Some(3));
        assert_eq!(pending.max_page(), Some(5));
        assert_eq!(pending.pages(), vec![3, 4, 5]);
    }

    #[test]
    fn replacing_a_callback_drops_the_old_one_unresolved() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pending = PendingPages::new();
        pending.insert(0, counting_callback(&counter));
        pending.insert(0, counting_callback(&counter));
        assert_eq!(pending.len(), 1);

        let callback = pending.remove(0).expect("registered");
        callback.resolve(Vec::new(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(pending.is_empty());
    }
}
