//! Fan-out of watchdog notices to subscribed monitors
//!
//! Delivering a notice to a monitor agent is the transport's job; the
//! watchdog only decides who gets what.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::record::WatchdogNotice;

/// Receives notices addressed to individual monitor agents
pub trait MonitorNotifier: Send + Sync {
    fn notify(&self, monitor_id: &str, notice: &WatchdogNotice);
}

/// A notice addressed to one monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorNotice {
    pub monitor: String,
    pub notice: WatchdogNotice,
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl MonitorNotifier for LogNotifier {
    fn notify(&self, monitor_id: &str, notice: &WatchdogNotice) {
        debug!(%monitor_id, ?notice, "LogNotifier::notify");
    }
}

/// Notifier that forwards notices into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<MonitorNotice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MonitorNotifier for ChannelNotifier {
    fn notify(&self, monitor_id: &str, notice: &WatchdogNotice) {
        debug!(%monitor_id, "ChannelNotifier::notify: called");
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(MonitorNotice {
            monitor: monitor_id.to_string(),
            notice: notice.clone(),
        });
    }
}
