//! Replay driver - runs a scripted session against live components
//!
//! A script is JSON lines, one step each. Cluster events go through the
//! event bridge, requests through the watchdog handle and push batches
//! through the push scheduler. Everything observable comes back as
//! `ReplayOutput` in the order it happened.

use std::sync::Arc;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::push::{AppContext, ChannelSink, Delivery, PushBatch, PushScheduler, StrategyCatalog};
use crate::watchdog::{
    ChannelNotifier, ClusterEvent, EventBridge, MonitorNotice, Watchdog, WatchdogMetrics, WatchdogNotice, WatchdogReply,
    WorkerRecord,
};

/// Server id the replay's push scheduler runs as
pub const REPLAY_SERVER_ID: &str = "replay";

fn default_agent() -> String {
    "monitor".to_string()
}

/// One line of a replay script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ScriptStep {
    /// Cluster register notification
    Register { record: WorkerRecord },

    /// Cluster disconnect notification
    Disconnect {
        id: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },

    /// Cluster reconnect notification
    Reconnect { record: WorkerRecord },

    /// Monitor request, `msg` as it would arrive on the wire
    Request {
        #[serde(default = "default_agent")]
        agent: String,
        #[serde(default)]
        msg: Value,
    },

    /// Outbound batch for the push scheduler
    Push { batch: PushBatch },
}

impl ScriptStep {
    fn into_event(self) -> Option<ClusterEvent> {
        match self {
            ScriptStep::Register { record } => Some(ClusterEvent::Register { record }),
            ScriptStep::Disconnect { id, kind } => Some(ClusterEvent::Disconnect { id, kind }),
            ScriptStep::Reconnect { record } => Some(ClusterEvent::Reconnect { record }),
            ScriptStep::Request { .. } | ScriptStep::Push { .. } => None,
        }
    }
}

/// Something the replay observed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "output", rename_all = "kebab-case")]
pub enum ReplayOutput {
    /// A cluster event and whether it changed membership
    Event {
        line: usize,
        event: &'static str,
        applied: bool,
    },

    /// A request reply; `null` is an empty acknowledgement
    Reply {
        line: usize,
        agent: String,
        reply: WatchdogReply,
    },

    /// A request answered with an error
    Rejected { line: usize, agent: String, error: String },

    /// A request that gets no reply
    Silent { line: usize, agent: String },

    /// A push batch and how scheduling went
    Pushed {
        line: usize,
        req_id: u64,
        route: String,
        error: Option<String>,
    },

    /// A notice delivered to a subscribed monitor
    Notice { monitor: String, notice: WatchdogNotice },

    /// A write performed on the session sink
    Delivery { delivery: Delivery },

    /// Final watchdog counters
    Metrics { metrics: WatchdogMetrics },
}

/// Parse a script; blank lines and `#` comments are skipped
///
/// Line numbers are 1-based and count every line of the input.
pub fn parse_script(text: &str) -> Result<Vec<(usize, ScriptStep)>> {
    debug!(len = text.len(), "parse_script: called");
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            let step = serde_json::from_str(line).context(format!("Invalid script step on line {}", line_no))?;
            Ok((line_no, step))
        })
        .collect()
}

/// Drive a watchdog, event bridge and push scheduler through a script
pub async fn run(config: &Config, steps: Vec<(usize, ScriptStep)>, force_stop: bool) -> Result<Vec<ReplayOutput>> {
    debug!(steps = steps.len(), force_stop, "replay::run: called");

    let (notifier, mut notices) = ChannelNotifier::new();
    let watchdog = Watchdog::with_notifier(config.watchdog.clone(), Arc::new(notifier));
    let handle = watchdog.handle();
    let watchdog_task = tokio::spawn(watchdog.run());
    let bridge = EventBridge::new(handle.clone());

    let (sink, mut deliveries) = ChannelSink::new();
    let ctx = AppContext::new(REPLAY_SERVER_ID, Arc::new(sink));
    let scheduler = PushScheduler::from_config(ctx, &config.push_scheduler, &StrategyCatalog::builtin())
        .context("Failed to build push scheduler")?;
    scheduler.after_start().await.context("Failed to start push scheduler")?;

    let mut outputs = Vec::new();
    for (line, step) in steps {
        match step {
            ScriptStep::Request { agent, msg } => {
                let reply = handle
                    .request_value(&agent, msg)
                    .await
                    .context("Watchdog stopped during replay")?;
                outputs.push(match reply {
                    Some(Ok(reply)) => ReplayOutput::Reply { line, agent, reply },
                    Some(Err(e)) => ReplayOutput::Rejected {
                        line,
                        agent,
                        error: e.to_string(),
                    },
                    None => ReplayOutput::Silent { line, agent },
                });
            }
            ScriptStep::Push { batch } => {
                let req_id = batch.req_id;
                let route = batch.route.clone();
                let error = scheduler.schedule(batch).await.err().map(|e| e.to_string());
                outputs.push(ReplayOutput::Pushed {
                    line,
                    req_id,
                    route,
                    error,
                });
            }
            step => {
                if let Some(event) = step.into_event() {
                    let event_type = event.event_type();
                    let applied = bridge.apply(event).await.context("Watchdog stopped during replay")?;
                    outputs.push(ReplayOutput::Event {
                        line,
                        event: event_type,
                        applied,
                    });
                }
            }
        }
        drain(&mut notices, &mut deliveries, &mut outputs);
    }

    if let Err(e) = scheduler.stop(force_stop).await {
        warn!(error = %e, "Push scheduler stop reported an error");
    }
    drain(&mut notices, &mut deliveries, &mut outputs);

    let metrics = handle.metrics().await.context("Failed to read watchdog metrics")?;
    outputs.push(ReplayOutput::Metrics { metrics });

    handle.shutdown().await.context("Failed to stop watchdog")?;
    watchdog_task.await.context("Watchdog task failed")?;

    info!(outputs = outputs.len(), "Replay finished");
    Ok(outputs)
}

fn drain(
    notices: &mut mpsc::UnboundedReceiver<MonitorNotice>,
    deliveries: &mut mpsc::UnboundedReceiver<Delivery>,
    outputs: &mut Vec<ReplayOutput>,
) {
    while let Ok(MonitorNotice { monitor, notice }) = notices.try_recv() {
        outputs.push(ReplayOutput::Notice { monitor, notice });
    }
    while let Ok(delivery) = deliveries.try_recv() {
        outputs.push(ReplayOutput::Delivery { delivery });
    }
}
