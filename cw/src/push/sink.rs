//! Session sink - where delivery strategies write to
//!
//! The transport adapter that owns client connections implements this.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::PushError;
use super::strategy::SessionId;

/// Outbound side of the transport layer
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Send one message to one session
    async fn send(&self, sid: SessionId, msg: &Value) -> Result<(), PushError>;

    /// Send several messages to one session in a single write
    async fn send_batch(&self, sid: SessionId, msgs: &[Value]) -> Result<(), PushError>;

    /// Send one message to every connected session
    async fn broadcast(&self, msg: &Value) -> Result<(), PushError>;
}

/// A single write performed on a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "delivery", rename_all = "kebab-case")]
pub enum Delivery {
    Single { sid: SessionId, msg: Value },
    Batch { sid: SessionId, msgs: Vec<Value> },
    Broadcast { msg: Value },
}

/// Sink that forwards every write into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, delivery: Delivery) -> Result<(), PushError> {
        self.tx.send(delivery).map_err(|_| PushError::SinkClosed)
    }
}

#[async_trait]
impl SessionSink for ChannelSink {
    async fn send(&self, sid: SessionId, msg: &Value) -> Result<(), PushError> {
        debug!(sid, "ChannelSink::send: called");
        self.forward(Delivery::Single { sid, msg: msg.clone() })
    }

    async fn send_batch(&self, sid: SessionId, msgs: &[Value]) -> Result<(), PushError> {
        debug!(sid, count = msgs.len(), "ChannelSink::send_batch: called");
        self.forward(Delivery::Batch {
            sid,
            msgs: msgs.to_vec(),
        })
    }

    async fn broadcast(&self, msg: &Value) -> Result<(), PushError> {
        debug!("ChannelSink::broadcast: called");
        self.forward(Delivery::Broadcast { msg: msg.clone() })
    }
}
