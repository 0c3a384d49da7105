//! Message types for the watchdog actor

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use super::protocol::{WatchdogMessage, WatchdogReply};
use super::record::{RegistrySnapshot, WorkerRecord};

/// Errors surfaced to watchdog callers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchdogError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Watchdog channel closed")]
    ChannelClosed,
}

/// Reply to a monitor request
pub type WatchdogResponse = Result<WatchdogReply, WatchdogError>;

/// Commands consumed by the watchdog task
#[derive(Debug)]
pub enum WatchdogRequest {
    /// A worker joined the cluster
    AddServer {
        record: WorkerRecord,
        reply: oneshot::Sender<bool>,
    },

    /// A worker left the cluster
    RemoveServer {
        id: String,
        kind: Option<String>,
        reply: oneshot::Sender<bool>,
    },

    /// A worker's connection was re-established
    ReconnectServer {
        record: WorkerRecord,
        reply: oneshot::Sender<bool>,
    },

    /// A request from a monitor agent; `None` reply means no reply by design
    Dispatch {
        agent: String,
        msg: Option<WatchdogMessage>,
        reply: oneshot::Sender<Option<WatchdogResponse>>,
    },

    /// Read the current membership
    Query { reply: oneshot::Sender<RegistrySnapshot> },

    /// Read the current subscription set
    Subscribers { reply: oneshot::Sender<Vec<String>> },

    /// Get current metrics
    GetMetrics { reply: oneshot::Sender<WatchdogMetrics> },

    /// Shutdown the watchdog
    Shutdown,
}

/// Watchdog metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchdogMetrics {
    pub servers: usize,
    pub subscribers: usize,
    pub started: usize,
    pub events_applied: u64,
    pub events_filtered: u64,
    pub requests_handled: u64,
    pub unknown_actions: u64,
    pub notices_sent: u64,
}
