//! WatchdogHandle - Client interface for the watchdog task

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::messages::{WatchdogError, WatchdogMetrics, WatchdogRequest, WatchdogResponse};
use super::protocol::{WatchdogMessage, WatchdogReply};
use super::record::{RegistrySnapshot, WorkerRecord};

/// Handle for talking to the watchdog
///
/// Cheap to clone. Each call waits until the watchdog task has processed the
/// request, so a query issued after a mutation returned always sees it.
#[derive(Clone)]
pub struct WatchdogHandle {
    tx: mpsc::Sender<WatchdogRequest>,
}

impl WatchdogHandle {
    pub(crate) fn new(tx: mpsc::Sender<WatchdogRequest>) -> Self {
        Self { tx }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> WatchdogRequest) -> Result<T, WatchdogError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| WatchdogError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WatchdogError::ChannelClosed)
    }

    /// Track a worker; returns false if the record was filtered out
    pub async fn add_server(&self, record: WorkerRecord) -> Result<bool, WatchdogError> {
        debug!(id = %record.id, "WatchdogHandle::add_server: called");
        self.call(|reply| WatchdogRequest::AddServer { record, reply }).await
    }

    /// Forget a worker; returns false if the event was filtered out
    pub async fn remove_server(&self, id: &str, kind: Option<&str>) -> Result<bool, WatchdogError> {
        debug!(%id, ?kind, "WatchdogHandle::remove_server: called");
        self.call(|reply| WatchdogRequest::RemoveServer {
            id: id.to_string(),
            kind: kind.map(str::to_string),
            reply,
        })
        .await
    }

    /// Replace a worker after a reconnect; returns false if filtered out
    pub async fn reconnect_server(&self, record: WorkerRecord) -> Result<bool, WatchdogError> {
        debug!(id = %record.id, "WatchdogHandle::reconnect_server: called");
        self.call(|reply| WatchdogRequest::ReconnectServer { record, reply }).await
    }

    /// Dispatch a monitor request
    ///
    /// `Ok(None)` means the request gets no reply by design: `record`, an
    /// unknown action or an empty message.
    pub async fn request(
        &self,
        agent: &str,
        msg: Option<WatchdogMessage>,
    ) -> Result<Option<WatchdogResponse>, WatchdogError> {
        debug!(%agent, ?msg, "WatchdogHandle::request: called");
        self.call(|reply| WatchdogRequest::Dispatch {
            agent: agent.to_string(),
            msg,
            reply,
        })
        .await
    }

    /// Dispatch a raw JSON monitor request
    ///
    /// `action` decides the outcome: a missing or unknown one gets no reply,
    /// and fields of the wrong type read as absent. Only a request that is
    /// not an object at all is dropped here.
    pub async fn request_value(&self, agent: &str, value: Value) -> Result<Option<WatchdogResponse>, WatchdogError> {
        debug!(%agent, "WatchdogHandle::request_value: called");
        match WatchdogMessage::from_value(value) {
            Ok(msg) => self.request(agent, msg).await,
            Err(e) => {
                warn!(%agent, error = %e, "Watchdog received unparseable message");
                Ok(None)
            }
        }
    }

    /// Subscribe a monitor and get the current membership
    pub async fn subscribe(&self, agent: &str, monitor_id: &str) -> Result<RegistrySnapshot, WatchdogError> {
        let reply = self
            .request(agent, Some(WatchdogMessage::subscribe(monitor_id)))
            .await?;
        match reply {
            Some(Ok(WatchdogReply::Snapshot(snapshot))) => Ok(snapshot),
            Some(Err(e)) => Err(e),
            _ => Err(WatchdogError::Malformed("subscribe produced no snapshot".to_string())),
        }
    }

    /// Unsubscribe a monitor
    pub async fn unsubscribe(&self, agent: &str, monitor_id: &str) -> Result<(), WatchdogError> {
        match self
            .request(agent, Some(WatchdogMessage::unsubscribe(monitor_id)))
            .await?
        {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Note that a worker has started; never replies
    pub async fn record(&self, agent: &str, id: &str) -> Result<(), WatchdogError> {
        self.request(agent, Some(WatchdogMessage::record(id))).await.map(|_| ())
    }

    /// Current membership
    pub async fn query(&self) -> Result<RegistrySnapshot, WatchdogError> {
        debug!("WatchdogHandle::query: called");
        self.call(|reply| WatchdogRequest::Query { reply }).await
    }

    /// Currently subscribed monitors
    pub async fn subscribers(&self) -> Result<Vec<String>, WatchdogError> {
        self.call(|reply| WatchdogRequest::Subscribers { reply }).await
    }

    /// Get current watchdog metrics
    pub async fn metrics(&self) -> Result<WatchdogMetrics, WatchdogError> {
        self.call(|reply| WatchdogRequest::GetMetrics { reply }).await
    }

    /// Request shutdown of the watchdog task
    pub async fn shutdown(&self) -> Result<(), WatchdogError> {
        debug!("WatchdogHandle::shutdown: called");
        self.tx
            .send(WatchdogRequest::Shutdown)
            .await
            .map_err(|_| WatchdogError::ChannelClosed)
    }
}
