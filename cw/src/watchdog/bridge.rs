//! Cluster notification bus and the bridge into the watchdog
//!
//! The bus is a broadcast channel carrying register/disconnect/reconnect
//! events. The bridge drains it, applies the validity filter and forwards
//! qualifying events into the watchdog's command queue.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handle::WatchdogHandle;
use super::messages::WatchdogError;
use super::record::{WorkerRecord, is_client_kind};

/// Default bus capacity (events)
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Cluster-wide membership notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClusterEvent {
    Register {
        record: WorkerRecord,
    },
    Disconnect {
        id: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    Reconnect {
        record: WorkerRecord,
    },
}

impl ClusterEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClusterEvent::Register { .. } => "register",
            ClusterEvent::Disconnect { .. } => "disconnect",
            ClusterEvent::Reconnect { .. } => "reconnect",
        }
    }
}

/// Broadcast bus for cluster notifications
pub struct ClusterBus {
    tx: broadcast::Sender<ClusterEvent>,
}

impl ClusterBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "ClusterBus::new: creating bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers; dropped if nobody listens
    pub fn emit(&self, event: ClusterEvent) {
        debug!(event_type = event.event_type(), "ClusterBus::emit");
        let _ = self.tx.send(event);
    }

    pub fn register(&self, record: WorkerRecord) {
        self.emit(ClusterEvent::Register { record });
    }

    pub fn disconnect(&self, id: impl Into<String>, kind: Option<&str>) {
        self.emit(ClusterEvent::Disconnect {
            id: id.into(),
            kind: kind.map(str::to_string),
        });
    }

    pub fn reconnect(&self, record: WorkerRecord) {
        self.emit(ClusterEvent::Reconnect { record });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ClusterBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// Feeds cluster notifications into the watchdog
#[derive(Clone)]
pub struct EventBridge {
    handle: WatchdogHandle,
}

impl EventBridge {
    pub fn new(handle: WatchdogHandle) -> Self {
        Self { handle }
    }

    /// Apply one notification
    ///
    /// Returns once the watchdog has processed it; `Ok(false)` means the
    /// event was filtered out.
    pub async fn apply(&self, event: ClusterEvent) -> Result<bool, WatchdogError> {
        debug!(?event, "EventBridge::apply: called");
        match event {
            ClusterEvent::Register { record } => {
                if !record.is_trackable() {
                    debug!(id = %record.id, "EventBridge::apply: register filtered");
                    return Ok(false);
                }
                self.handle.add_server(record).await
            }

            ClusterEvent::Reconnect { record } => {
                if !record.is_trackable() {
                    warn!(id = %record.id, kind = ?record.kind, "Reconnect notification with invalid record");
                    return Ok(false);
                }
                self.handle.reconnect_server(record).await
            }

            ClusterEvent::Disconnect { id, kind } => {
                if id.is_empty() {
                    warn!("Disconnect notification with empty server id");
                    return Ok(false);
                }
                if is_client_kind(kind.as_deref()) {
                    debug!(%id, "EventBridge::apply: client disconnect ignored");
                    return Ok(false);
                }
                self.handle.remove_server(&id, kind.as_deref()).await
            }
        }
    }

    /// Drain a bus receiver until the bus closes or the watchdog goes away
    pub fn spawn(self, mut rx: broadcast::Receiver<ClusterEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Event bridge started");
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.apply(event).await {
                            warn!(error = %e, "Event bridge lost the watchdog");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event bridge lagged behind the cluster bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("Event bridge stopped");
        })
    }
}
