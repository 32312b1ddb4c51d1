//! Types shared by the widget-facing and server-facing halves of the
//! connector: the data-provider request, the opaque item record, and the
//! batch identifier attached to server confirmations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier the server attaches to each batch of pushed updates.
pub type UpdateId = i64;

/// Reserved id for updates that were never queued as a server batch; commits
/// carrying it are applied immediately and are not acknowledged back.
pub const DIRECT_UPDATE_ID: UpdateId = -1;

/// A widget request for one page of the dataset under a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub page: usize,
    pub page_size: usize,
    pub filter: String,
}

/// One dataset item: a stable key plus arbitrary display fields.
///
/// The key survives refilters and size changes; everything else is opaque to
/// the connector except the label field used for client-side filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub key: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DataItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The display label used for local filter matching. Falls back to the
    /// key when the item carries no field under `label_path`.
    pub fn label(&self, label_path: &str) -> String {
        match self.fields.get(label_path) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => self.key.clone(),
        }
    }
}

/// Recordable form of every call the connector pushes to the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCall {
    RequestedRange {
        start: usize,
        count: usize,
        filter: String,
    },
    ResetDataCommunicator,
    ConfirmUpdate {
        id: UpdateId,
    },
}
