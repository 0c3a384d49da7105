//! Main watchdog task implementation

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::WatchdogConfig;
use super::handle::WatchdogHandle;
use super::messages::{WatchdogMetrics, WatchdogRequest};
use super::notifier::{LogNotifier, MonitorNotifier};
use super::protocol;
use super::registry::{Announcement, Audience, MembershipRegistry, Mutation};

/// The watchdog owns the membership registry
///
/// Every mutation and every monitor request goes through one command queue
/// drained by a single task, so registry operations never interleave.
pub struct Watchdog {
    config: WatchdogConfig,
    tx: mpsc::Sender<WatchdogRequest>,
    rx: mpsc::Receiver<WatchdogRequest>,
    notifier: Arc<dyn MonitorNotifier>,
}

impl Watchdog {
    /// Create a new watchdog that only logs its notices
    pub fn new(config: WatchdogConfig) -> Self {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Create a new watchdog with a notifier for subscribed monitors
    pub fn with_notifier(config: WatchdogConfig, notifier: Arc<dyn MonitorNotifier>) -> Self {
        debug!(?config, "Watchdog::with_notifier: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self {
            config,
            tx,
            rx,
            notifier,
        }
    }

    /// Get a sender for raw requests
    pub fn sender(&self) -> mpsc::Sender<WatchdogRequest> {
        self.tx.clone()
    }

    /// Get a handle for issuing requests
    pub fn handle(&self) -> WatchdogHandle {
        WatchdogHandle::new(self.tx.clone())
    }

    /// Run the watchdog task
    ///
    /// This consumes the watchdog and runs until shutdown is requested or
    /// every sender is dropped.
    pub async fn run(self) {
        let Self {
            config,
            tx,
            mut rx,
            notifier,
        } = self;
        // Only handles keep the queue open
        drop(tx);

        let notifier = notifier.as_ref();
        let mut registry = MembershipRegistry::new(config.expected_servers);
        let mut metrics = WatchdogMetrics::default();

        info!("Watchdog started");

        while let Some(req) = rx.recv().await {
            match req {
                WatchdogRequest::AddServer { record, reply } => {
                    let mutation = registry.add_server(record);
                    let applied = apply(notifier, &registry, mutation, &mut metrics);
                    let _ = reply.send(applied);
                }

                WatchdogRequest::RemoveServer { id, kind, reply } => {
                    let mutation = registry.remove_server(&id, kind.as_deref());
                    let applied = apply(notifier, &registry, mutation, &mut metrics);
                    let _ = reply.send(applied);
                }

                WatchdogRequest::ReconnectServer { record, reply } => {
                    let mutation = registry.reconnect_server(record);
                    if !mutation.is_applied() {
                        warn!("Watchdog rejected reconnect for untrackable server");
                    }
                    let applied = apply(notifier, &registry, mutation, &mut metrics);
                    let _ = reply.send(applied);
                }

                WatchdogRequest::Dispatch { agent, msg, reply } => {
                    metrics.requests_handled += 1;
                    let dispatch = protocol::dispatch(&mut registry, &agent, msg.as_ref());
                    if !dispatch.recognized {
                        metrics.unknown_actions += 1;
                    }
                    if dispatch.filtered {
                        metrics.events_filtered += 1;
                    }
                    announce(notifier, &registry, dispatch.announcements, &mut metrics);
                    let _ = reply.send(dispatch.reply);
                }

                WatchdogRequest::Query { reply } => {
                    let _ = reply.send(registry.query());
                }

                WatchdogRequest::Subscribers { reply } => {
                    let _ = reply.send(registry.subscribers().map(str::to_string).collect());
                }

                WatchdogRequest::GetMetrics { reply } => {
                    metrics.servers = registry.len();
                    metrics.subscribers = registry.subscriber_count();
                    metrics.started = registry.started_count();
                    let _ = reply.send(metrics.clone());
                }

                WatchdogRequest::Shutdown => {
                    info!("Watchdog shutting down");
                    break;
                }
            }
        }

        info!(servers = registry.len(), "Watchdog stopped");
    }
}

/// Record a mutation outcome and fan out its notices
fn apply(
    notifier: &dyn MonitorNotifier,
    registry: &MembershipRegistry,
    mutation: Mutation,
    metrics: &mut WatchdogMetrics,
) -> bool {
    match mutation {
        Mutation::Filtered => {
            metrics.events_filtered += 1;
            false
        }
        Mutation::Applied(announcements) => {
            metrics.events_applied += 1;
            announce(notifier, registry, announcements, metrics);
            true
        }
    }
}

fn announce(
    notifier: &dyn MonitorNotifier,
    registry: &MembershipRegistry,
    announcements: Vec<Announcement>,
    metrics: &mut WatchdogMetrics,
) {
    for announcement in announcements {
        match &announcement.to {
            Audience::Subscribers => {
                for monitor_id in registry.subscribers() {
                    notifier.notify(monitor_id, &announcement.notice);
                    metrics.notices_sent += 1;
                }
            }
            Audience::Monitor(monitor_id) => {
                if registry.is_subscribed(monitor_id) {
                    notifier.notify(monitor_id, &announcement.notice);
                    metrics.notices_sent += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::notifier::ChannelNotifier;
    use crate::watchdog::protocol::{WatchdogMessage, WatchdogReply};
    use crate::watchdog::record::{WatchdogNotice, WorkerRecord};

    #[tokio::test]
    async fn test_watchdog_add_query_remove() {
        let watchdog = Watchdog::new(WatchdogConfig::default());
        let handle = watchdog.handle();
        let task = tokio::spawn(watchdog.run());

        assert!(handle.add_server(WorkerRecord::new("s1", "connector")).await.unwrap());
        assert!(handle.query().await.unwrap().contains("s1"));

        assert!(handle.remove_server("s1", Some("connector")).await.unwrap());
        assert!(handle.query().await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_notifies_subscribers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let watchdog = Watchdog::with_notifier(WatchdogConfig::default(), Arc::new(notifier));
        let handle = watchdog.handle();
        let task = tokio::spawn(watchdog.run());

        handle.subscribe("agent", "m1").await.unwrap();
        handle.add_server(WorkerRecord::new("s1", "chat")).await.unwrap();
        handle.remove_server("s1", None).await.unwrap();

        let added = rx.recv().await.unwrap();
        assert_eq!(added.monitor, "m1");
        assert!(matches!(added.notice, WatchdogNotice::AddServer { ref server } if server.id == "s1"));

        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.notice, WatchdogNotice::RemoveServer { id: "s1".to_string() });

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_start_over() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let config = WatchdogConfig {
            expected_servers: Some(2),
            ..Default::default()
        };
        let watchdog = Watchdog::with_notifier(config, Arc::new(notifier));
        let handle = watchdog.handle();
        let task = tokio::spawn(watchdog.run());

        handle.subscribe("agent", "m1").await.unwrap();
        assert!(handle.record("agent", "s1").await.is_ok());
        assert!(handle.record("agent", "s2").await.is_ok());

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.notice, WatchdogNotice::StartOver);

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.started, 2);
        assert_eq!(metrics.notices_sent, 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_metrics() {
        let watchdog = Watchdog::new(WatchdogConfig::default());
        let handle = watchdog.handle();
        let task = tokio::spawn(watchdog.run());

        handle.add_server(WorkerRecord::new("s1", "connector")).await.unwrap();
        handle
            .add_server(WorkerRecord::new("c1", "connector").with_kind("client"))
            .await
            .unwrap();
        let unknown = WatchdogMessage {
            action: "explode".to_string(),
            ..Default::default()
        };
        assert_eq!(handle.request("agent", Some(unknown)).await.unwrap(), None);
        let reply = handle.request("agent", Some(WatchdogMessage::query())).await.unwrap();
        assert!(matches!(reply, Some(Ok(WatchdogReply::Snapshot(_)))));

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.servers, 1);
        assert_eq!(metrics.events_applied, 1);
        assert_eq!(metrics.events_filtered, 1);
        assert_eq!(metrics.requests_handled, 2);
        assert_eq!(metrics.unknown_actions, 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_stops_when_senders_dropped() {
        let watchdog = Watchdog::new(WatchdogConfig::default());
        let handle = watchdog.handle();
        let task = tokio::spawn(watchdog.run());

        drop(handle);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("watchdog should stop")
            .unwrap();
    }
}
