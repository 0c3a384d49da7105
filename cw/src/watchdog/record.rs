//! Worker records, registry snapshots and subscriber notices

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection kind that marks a client session rather than a worker node
pub const CLIENT_KIND: &str = "client";

/// Returns true if the given connection kind marks a client connection
pub fn is_client_kind(kind: Option<&str>) -> bool {
    kind == Some(CLIENT_KIND)
}

/// A worker node known to the coordinator
///
/// Everything besides `id`, `serverType` and `type` is kept verbatim as
/// opaque metadata (host, port, frontend flag, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "serverType", default, skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,

    /// Connection kind; `"client"` marks a client connection
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub info: Map<String, Value>,
}

impl WorkerRecord {
    pub fn new(id: impl Into<String>, server_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server_type: Some(server_type.into()),
            kind: None,
            info: Map::new(),
        }
    }

    /// Set the connection kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Attach a metadata field
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    pub fn is_client(&self) -> bool {
        is_client_kind(self.kind.as_deref())
    }

    /// Whether this record passes the membership validity filter
    ///
    /// Tracked records have an id, a non-empty server type and are not
    /// client connections.
    pub fn is_trackable(&self) -> bool {
        !self.id.is_empty() && !self.is_client() && self.server_type.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Full set of tracked worker records, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub records: Vec<WorkerRecord>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&WorkerRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Notices pushed to subscribed monitor agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WatchdogNotice {
    /// A worker joined (or reconnected without being known)
    AddServer { server: WorkerRecord },

    /// A worker left
    RemoveServer { id: String },

    /// Full membership handed to a reconnecting worker
    ReplaceServer { servers: Vec<WorkerRecord> },

    /// Every expected worker has reported in
    StartOver,
}
