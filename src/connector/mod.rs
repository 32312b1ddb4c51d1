//! The connector core: maps widget page requests to coalesced server range
//! requests and reconciles asynchronous server pushes against the page cache.

pub mod debounce;
pub mod pending;
pub mod view;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::PageCache;
use crate::config::ConnectorConfig;
use crate::protocol::{DIRECT_UPDATE_ID, DataItem, DataRequest, UpdateId};
use crate::schedule::{TaskId, TimerDriver};
use crate::server::{ServerEndpoint, ServerFacade};

use debounce::Debouncer;
use pending::{PageCallback, PendingPages};
use view::ItemView;

#[derive(thiserror::Error, Debug)]
pub enum ConnectorError {
    #[error("page size {got} does not match the connector page size {expected}")]
    PageSizeMismatch { expected: usize, got: usize },
    #[error("got new data at index {index} which is not aligned with the page size of {page_size}")]
    UnalignedSet { index: usize, page_size: usize },
    #[error("expected the pending filter to be {expected:?} but it was {got:?}")]
    FilterDesync { expected: String, got: String },
}

/// A filter re-issue parked behind the settle window.
struct DeferredRequest {
    request: DataRequest,
    callback: PageCallback,
}

/// A merged outbound range parked behind the flush window.
struct DeferredRange {
    start: usize,
    end: usize,
    filter: String,
}

/// One connector instance per widget. Owns every piece of mutable state:
/// the page cache, the active page set, the display mirror, the filter
/// bookkeeping, and both debounce windows.
pub struct DataConnector {
    page_size: usize,
    size: usize,
    client_side_filter: bool,
    /// The filter as the widget last typed it; local filtering at commit
    /// time uses this, not the (possibly rewritten) request filter.
    widget_filter: String,
    last_filter: String,
    cache: PageCache,
    pending: PendingPages,
    view: ItemView,
    facade: ServerFacade,
    filter_debounce: Debouncer,
    range_debounce: Debouncer,
    deferred_filter: Option<DeferredRequest>,
    deferred_range: Option<DeferredRange>,
    item_label_path: String,
    max_range_count: usize,
}

impl DataConnector {
    pub fn new(
        page_size: usize,
        endpoint: Box<dyn ServerEndpoint>,
        timers: Arc<dyn TimerDriver>,
        config: ConnectorConfig,
    ) -> Self {
        assert!(page_size > 0, "page size must be positive");
        let max_range_count = config.max_range_count_for(page_size);
        Self {
            page_size,
            size: 0,
            client_side_filter: false,
            widget_filter: String::new(),
            last_filter: String::new(),
            cache: PageCache::new(),
            pending: PendingPages::new(),
            view: ItemView::new(),
            facade: ServerFacade::new(endpoint),
            filter_debounce: Debouncer::new(Arc::clone(&timers), config.filter_debounce),
            range_debounce: Debouncer::new(timers, config.range_debounce),
            deferred_filter: None,
            deferred_range: None,
            item_label_path: config.item_label_path,
            max_range_count,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The widget-visible backing array; placeholder slots mark items that
    /// are not loaded under the current filter.
    pub fn filtered_items(&self) -> &[view::ItemSlot] {
        self.view.slots()
    }

    /// Switches local filtering on or off. The widget enables it when the
    /// whole dataset fits in one page.
    pub fn set_client_side_filter(&mut self, enabled: bool) {
        if self.client_side_filter != enabled {
            self.client_side_filter = enabled;
            debug!(target = "connector::filter", enabled, "client-side filter");
        }
    }

    /// The widget's data-provider entry point: asks for one page under a
    /// filter. Resolves from cache when possible, otherwise grows the active
    /// range and schedules or sends the merged server request.
    pub fn request_page(
        &mut self,
        request: DataRequest,
        callback: PageCallback,
    ) -> Result<(), ConnectorError> {
        if request.page_size != self.page_size {
            return Err(ConnectorError::PageSizeMismatch {
                expected: self.page_size,
                got: request.page_size,
            });
        }

        self.widget_filter = request.filter.clone();

        let mut request = request;
        if self.client_side_filter {
            if let Some(cached) = self.cache.get(0) {
                let items = cached.to_vec();
                let filter = request.filter;
                self.resolve_with_local_filter(&items, &filter, callback);
                return Ok(());
            }
            // The whole unfiltered dataset is fetched once; every later
            // keystroke filters it locally. Requesting with the typed filter
            // here would leave the cache holding a subset only.
            request.filter.clear();
        }

        if request.filter != self.last_filter {
            // Pages cached or awaited under the old filter are meaningless
            // under the new one.
            self.cache.clear_all();
            let stale = self.pending.pages();
            self.clear_page_callbacks(&stale);
            self.last_filter = request.filter.clone();
            self.range_debounce.cancel();
            self.deferred_range = None;
            if let Some(replaced) = self.deferred_filter.take() {
                trace!(
                    target = "connector::filter",
                    page = replaced.request.page,
                    filter = %replaced.request.filter,
                    "newer filter change replaces the deferred one"
                );
            }
            self.deferred_filter = Some(DeferredRequest { request, callback });
            self.filter_debounce.debounce();
            return Ok(());
        }

        if self.cache.contains(request.page) {
            // Can happen after skipping pages by scrolling fast: the data
            // arrived while no callback was waiting for it.
            self.commit_page(request.page, callback);
            return Ok(());
        }

        self.pending.insert(request.page, callback);
        loop {
            let (Some(min), Some(max)) = (self.pending.min_page(), self.pending.max_page()) else {
                break;
            };
            let active = self.pending.len();

            if active * self.page_size > self.max_range_count {
                // Keep the freshly requested end of the range, shed the
                // opposite one, and re-evaluate.
                let evicted = if request.page == min { max } else { min };
                trace!(
                    target = "connector::request",
                    evicted, min, max, "active range over budget"
                );
                self.clear_page_callbacks(&[evicted]);
                continue;
            }

            if max - min + 1 != active {
                // Not a sequential page index: flush everything so the
                // widget re-requests the pages it still needs.
                trace!(
                    target = "connector::request",
                    page = request.page,
                    min,
                    max,
                    "non-sequential page request"
                );
                let pages = self.pending.pages();
                self.clear_page_callbacks(&pages);
                break;
            }

            let start = self.page_size * min;
            let end = self.page_size * (max + 1);
            if self.filter_debounce.is_active() || self.range_debounce.is_active() {
                if self.filter_debounce.is_active() {
                    // The widget re-requested under the settled filter before
                    // the timer fired; this request supersedes the deferred
                    // re-issue.
                    self.filter_debounce.cancel();
                    if let Some(superseded) = self.deferred_filter.take() {
                        trace!(
                            target = "connector::filter",
                            page = superseded.request.page,
                            "re-request supersedes the deferred filter re-issue"
                        );
                    }
                }
                self.deferred_range = Some(DeferredRange {
                    start,
                    end,
                    filter: request.filter.clone(),
                });
                self.range_debounce.debounce();
            } else {
                self.facade.request_data(start, end, &request.filter);
            }
            break;
        }
        Ok(())
    }

    /// Host callback for a fired debounce timer. Stale ids (cancelled or
    /// already replaced) are ignored.
    pub fn on_timer(&mut self, id: TaskId) -> Result<(), ConnectorError> {
        if self.filter_debounce.try_claim(id) {
            return self.filter_settled();
        }
        if self.range_debounce.try_claim(id) {
            if let Some(DeferredRange { start, end, filter }) = self.deferred_range.take() {
                self.facade.request_data(start, end, &filter);
            }
            return Ok(());
        }
        trace!(target = "connector::timer", id, "ignoring stale timer");
        Ok(())
    }

    fn filter_settled(&mut self) -> Result<(), ConnectorError> {
        let Some(DeferredRequest { request, callback }) = self.deferred_filter.take() else {
            return Ok(());
        };
        if self.facade.last_filter_sent_to_server() == request.filter {
            // The filter changed away and back within the settle window; the
            // server still thinks nothing changed and would skip the data.
            self.facade.mark_reset_needed();
        }
        if request.filter != self.last_filter {
            return Err(ConnectorError::FilterDesync {
                expected: self.last_filter.clone(),
                got: request.filter,
            });
        }
        // Flush whatever is still awaited, then run the parked request as if
        // it had just arrived.
        let stale = self.pending.pages();
        self.clear_page_callbacks(&stale);
        self.request_page(request, callback)
    }

    /// Drops cached pages overlapping the absolute range
    /// `[start, start + length)`.
    pub fn clear(&mut self, start: usize, length: usize) {
        let first_page = start / self.page_size;
        let page_count = length.div_ceil(self.page_size);
        for page in first_page..first_page + page_count {
            self.cache.delete(page);
        }
    }

    /// Server push: items for the absolute range starting at `index`. The
    /// index must be page-aligned. A `filter` of `None` means the empty
    /// filter. Pushes tagged with a filter the server was never asked for
    /// (anymore) are dropped.
    pub fn set(
        &mut self,
        index: usize,
        items: Vec<DataItem>,
        filter: Option<&str>,
    ) -> Result<(), ConnectorError> {
        let filter = filter.unwrap_or("");
        if filter != self.facade.last_filter_sent_to_server() {
            trace!(target = "connector::data", index, filter, "discarding stale set");
            return Ok(());
        }
        if index % self.page_size != 0 {
            return Err(ConnectorError::UnalignedSet {
                index,
                page_size: self.page_size,
            });
        }

        if index == 0 && items.is_empty() && self.pending.contains(0) {
            // Record the empty result explicitly so the pending callback
            // resolves with "no results" instead of re-requesting forever.
            self.cache.put(0, Vec::new());
            return Ok(());
        }

        let first_page = index / self.page_size;
        for (offset, chunk) in items.chunks(self.page_size).enumerate() {
            self.cache.put(first_page + offset, chunk.to_vec());
        }
        Ok(())
    }

    /// Patches displayed items in place by key, leaving pagination untouched.
    pub fn update_data(&mut self, items: &[DataItem]) {
        for item in items {
            if !self.view.patch_by_key(item) {
                trace!(
                    target = "connector::data",
                    key = %item.key,
                    "update for an item that is not displayed"
                );
            }
        }
    }

    /// Server push of the authoritative dataset size. Ignored while filtering
    /// client-side, where the size is the filtered result length.
    pub fn update_size(&mut self, new_size: usize) {
        if self.client_side_filter {
            return;
        }
        self.size = new_size;
        self.view.resize(new_size);
    }

    /// Flushes every pending callback, drops the cache, and resets the
    /// display mirror to placeholders so the widget re-requests what it
    /// still shows.
    pub fn reset(&mut self) {
        debug!(target = "connector::data", "reset");
        let pages = self.pending.pages();
        self.clear_page_callbacks(&pages);
        self.cache.clear_all();
        self.view.invalidate();
    }

    /// Server signal that a batch of updates is complete: resolves every
    /// active page whose data has arrived, then acknowledges the batch.
    /// Confirmations for an outdated filter are dropped entirely.
    pub fn confirm(&mut self, id: UpdateId, filter: Option<&str>) {
        let filter = filter.unwrap_or("");
        if filter != self.facade.last_filter_sent_to_server() {
            trace!(
                target = "connector::data",
                id, filter, "discarding confirm for a stale filter"
            );
            return;
        }

        for page in self.pending.pages() {
            if self.cache.contains(page)
                && let Some(callback) = self.pending.remove(page)
            {
                self.commit_page(page, callback);
            }
        }

        if id != DIRECT_UPDATE_ID {
            self.facade.confirm_update(id);
        }
    }

    /// Whether `item` matches `filter` under the connector's label field,
    /// case-insensitively.
    pub fn matches_filter(&self, item: &DataItem, filter: &str) -> bool {
        item.label(&self.item_label_path)
            .to_lowercase()
            .contains(&filter.to_lowercase())
    }

    fn commit_page(&mut self, page: usize, callback: PageCallback) {
        if self.client_side_filter {
            // Keep the cache entry: later keystrokes refilter the same data.
            let items = self.cache.get(page).map(<[DataItem]>::to_vec).unwrap_or_default();
            let filter = self.widget_filter.clone();
            self.resolve_with_local_filter(&items, &filter, callback);
            return;
        }
        let Some(items) = self.cache.take(page) else {
            trace!(target = "connector::data", page, "commit for a page with no data");
            return;
        };
        self.view.write_items(page * self.page_size, &items);
        callback.resolve(items, self.size);
    }

    fn resolve_with_local_filter(&self, items: &[DataItem], filter: &str, callback: PageCallback) {
        let filtered: Vec<DataItem> = if filter.is_empty() {
            items.to_vec()
        } else {
            items
                .iter()
                .filter(|item| self.matches_filter(item, filter))
                .cloned()
                .collect()
        };
        let size = filtered.len();
        callback.resolve(filtered, size);
    }

    /// Resolves the given pages with an empty result and the current size,
    /// removes them from the active set, and turns their display slots back
    /// into placeholders.
    fn clear_page_callbacks(&mut self, pages: &[usize]) {
        for &page in pages {
            if let Some(callback) = self.pending.remove(page) {
                callback.resolve(Vec::new(), self.size);
            }
            let start = page * self.page_size;
            self.view.clear_range(start, start + self.page_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualTimers;
    use crate::server::RecordingEndpoint;
    use serde_json::json;

    const PAGE_SIZE: usize = 50;

    fn connector() -> (DataConnector, RecordingEndpoint, Arc<ManualTimers>) {
        let endpoint = RecordingEndpoint::new();
        let timers = ManualTimers::new();
        let connector = DataConnector::new(
            PAGE_SIZE,
            Box::new(endpoint.clone()),
            timers.clone(),
            ConnectorConfig::default(),
        );
        (connector, endpoint, timers)
    }

    fn request(page: usize, filter: &str) -> DataRequest {
        DataRequest {
            page,
            page_size: PAGE_SIZE,
            filter: filter.to_owned(),
        }
    }

    fn noop() -> PageCallback {
        PageCallback::new(|_, _| {})
    }

    fn page(start: usize, count: usize) -> Vec<DataItem> {
        (start..start + count)
            .map(|i| DataItem::new(i.to_string()))
            .collect()
    }

    #[test]
    fn clear_drops_only_the_overlapping_pages() {
        let (mut connector, _endpoint, _timers) = connector();
        for index in 0..4 {
            connector
                .set(index * PAGE_SIZE, page(index * PAGE_SIZE, PAGE_SIZE), None)
                .expect("aligned set");
        }

        connector.clear(75, 60);
        assert!(connector.cache.contains(0));
        assert!(!connector.cache.contains(1));
        assert!(!connector.cache.contains(2));
        assert!(connector.cache.contains(3));
    }

    #[test]
    fn filter_desync_at_settle_time_is_a_consistency_fault() {
        let (mut connector, _endpoint, timers) = connector();
        connector
            .request_page(request(0, "a"), noop())
            .expect("request");

        // Simulate the interleaving bug the fail-fast exists for: the
        // coordinator filter moved on without replacing the parked request.
        connector.last_filter = "b".to_owned();

        let armed = timers.drain();
        assert_eq!(armed.len(), 1);
        let outcome = connector.on_timer(armed[0].id);
        assert!(matches!(
            outcome,
            Err(ConnectorError::FilterDesync { .. })
        ));
    }

    #[test]
    fn stale_timer_ids_are_ignored() {
        let (mut connector, endpoint, _timers) = connector();
        connector.on_timer(99).expect("stale id is a no-op");
        assert!(endpoint.calls().is_empty());
    }

    #[test]
    fn local_filter_matches_case_insensitively_on_the_label() {
        let (connector, _endpoint, _timers) = connector();
        let item = DataItem::new("1").with_field("label", json!("Copenhagen"));
        assert!(connector.matches_filter(&item, "HAGEN"));
        assert!(!connector.matches_filter(&item, "berlin"));
    }
}
