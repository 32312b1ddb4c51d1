//! The outbound seam to the remote data source.
//!
//! Everything the connector ever sends upstream goes through
//! [`ServerEndpoint`]; responses come back through the connector's inbound
//! surface (`set`, `update_size`, `confirm`, ...). Requests are
//! fire-and-forget and correlated only by index range and filter value.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::protocol::{ServerCall, UpdateId};

pub trait ServerEndpoint: Send {
    /// Asks the server to push items for `[start, start + count)` under
    /// `filter`. The server responds asynchronously via `set`/`confirm`.
    fn set_requested_range(&self, start: usize, count: usize, filter: &str);

    /// Tells the server-side data communicator to forget its sent-range
    /// bookkeeping, so the next request is not treated as a duplicate.
    fn reset_data_communicator(&self);

    /// Acknowledges that a confirmed batch has been fully applied.
    fn confirm_update(&self, id: UpdateId);
}

/// Wraps the endpoint with the two pieces of state the protocol needs on the
/// way out: which filter the server last saw, and whether a communicator
/// reset must accompany the next request.
pub struct ServerFacade {
    endpoint: Box<dyn ServerEndpoint>,
    last_filter_sent: String,
    reset_needed: bool,
}

impl ServerFacade {
    pub fn new(endpoint: Box<dyn ServerEndpoint>) -> Self {
        Self {
            endpoint,
            last_filter_sent: String::new(),
            reset_needed: false,
        }
    }

    pub fn last_filter_sent_to_server(&self) -> &str {
        &self.last_filter_sent
    }

    /// Forces a data-communicator reset alongside the next outbound request.
    pub fn mark_reset_needed(&mut self) {
        self.reset_needed = true;
    }

    pub fn request_data(&mut self, start: usize, end: usize, filter: &str) {
        let count = end - start;
        debug!(
            target = "connector::server",
            start, count, filter, "requesting range"
        );
        self.endpoint.set_requested_range(start, count, filter);
        self.last_filter_sent = filter.to_owned();
        if self.reset_needed {
            self.endpoint.reset_data_communicator();
            self.reset_needed = false;
        }
    }

    pub fn confirm_update(&mut self, id: UpdateId) {
        self.endpoint.confirm_update(id);
    }
}

/// Endpoint double that records every outbound call into a shared log.
/// Clones share the log, so a test can hold one clone and hand another to the
/// connector.
#[derive(Clone, Default)]
pub struct RecordingEndpoint {
    calls: Arc<Mutex<Vec<ServerCall>>>,
}

impl RecordingEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ServerCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls and empties the log.
    pub fn take_calls(&self) -> Vec<ServerCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// The `(start, count, filter)` of every recorded range request.
    pub fn requested_ranges(&self) -> Vec<(usize, usize, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ServerCall::RequestedRange {
                    start,
                    count,
                    filter,
                } => Some((*start, *count, filter.clone())),
                _ => None,
            })
            .collect()
    }
}

impl ServerEndpoint for RecordingEndpoint {
    fn set_requested_range(&self, start: usize, count: usize, filter: &str) {
        self.calls.lock().push(ServerCall::RequestedRange {
            start,
            count,
            filter: filter.to_owned(),
        });
    }

    fn reset_data_communicator(&self) {
        self.calls.lock().push(ServerCall::ResetDataCommunicator);
    }

    fn confirm_update(&self, id: UpdateId) {
        self.calls.lock().push(ServerCall::ConfirmUpdate { id });
    }
}
