//! Scheduling strategy contract

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::PushError;
use super::sink::SessionSink;

/// Frontend session identifier
pub type SessionId = u64;

/// Options passed along with a push batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushOptions {
    /// Deliver to every connected session instead of `recvs`
    #[serde(default)]
    pub broadcast: bool,

    /// Anything else the caller wants strategies or selectors to see
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One outbound message batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushBatch {
    #[serde(rename = "req-id", default)]
    pub req_id: u64,
    pub route: String,
    #[serde(default)]
    pub msg: Value,
    #[serde(default)]
    pub recvs: Vec<SessionId>,
    #[serde(default)]
    pub opts: PushOptions,
}

impl PushBatch {
    pub fn new(req_id: u64, route: impl Into<String>, msg: Value, recvs: Vec<SessionId>) -> Self {
        Self {
            req_id,
            route: route.into(),
            msg,
            recvs,
            opts: PushOptions::default(),
        }
    }

    /// A batch for every connected session
    pub fn broadcast(req_id: u64, route: impl Into<String>, msg: Value) -> Self {
        Self {
            opts: PushOptions {
                broadcast: true,
                ..Default::default()
            },
            ..Self::new(req_id, route, msg, Vec::new())
        }
    }

    pub fn with_opts(mut self, opts: PushOptions) -> Self {
        self.opts = opts;
        self
    }
}

/// A pluggable deliverer
///
/// `start` and `stop` are optional and default to no-ops; `schedule` is the
/// one required capability.
#[async_trait]
pub trait PushStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), PushError> {
        Ok(())
    }

    async fn stop(&self, _force: bool) -> Result<(), PushError> {
        Ok(())
    }

    /// Deliver (or arrange delivery of) one batch
    async fn schedule(&self, batch: PushBatch) -> Result<(), PushError>;
}

/// Explicit context handed to strategy factories
#[derive(Clone)]
pub struct AppContext {
    server_id: String,
    sink: Arc<dyn SessionSink>,
}

impl AppContext {
    pub fn new(server_id: impl Into<String>, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            server_id: server_id.into(),
            sink,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn sink(&self) -> Arc<dyn SessionSink> {
        Arc::clone(&self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_deserialize() {
        let batch: PushBatch = serde_json::from_value(json!({
            "req-id": 3,
            "route": "onChat",
            "msg": {"text": "hi"},
            "recvs": [1, 2],
            "opts": {"broadcast": false, "priority": "high"}
        }))
        .unwrap();

        assert_eq!(batch.req_id, 3);
        assert_eq!(batch.recvs, vec![1, 2]);
        assert!(!batch.opts.broadcast);
        assert_eq!(batch.opts.extra["priority"], "high");
    }

    #[test]
    fn test_broadcast_batch() {
        let batch = PushBatch::broadcast(1, "onNotice", json!("maintenance"));
        assert!(batch.opts.broadcast);
        assert!(batch.recvs.is_empty());
    }
}
