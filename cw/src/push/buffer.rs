//! Buffer scheduler - queues messages per session and flushes on a tick

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::PushError;
use super::sink::SessionSink;
use super::strategy::{AppContext, PushBatch, PushStrategy, SessionId};

/// Buffer scheduler options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferOptions {
    /// Flush interval in milliseconds
    #[serde(rename = "flush-interval-ms", default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_flush_interval_ms() -> u64 {
    20
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self { flush_interval_ms: 20 }
    }
}

impl BufferOptions {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}

struct BufferInner {
    sink: Arc<dyn SessionSink>,
    queues: Mutex<BTreeMap<SessionId, Vec<Value>>>,
}

impl BufferInner {
    /// Send everything queued so far, one batch per session
    async fn flush(&self) -> Result<usize, PushError> {
        let queues = std::mem::take(&mut *self.queues.lock().await);
        if queues.is_empty() {
            return Ok(0);
        }

        let total = queues.len();
        let mut failed = 0;
        for (sid, msgs) in queues {
            if let Err(e) = self.sink.send_batch(sid, &msgs).await {
                warn!(sid, dropped = msgs.len(), error = %e, "Buffered push failed");
                failed += 1;
            }
        }

        debug!(total, failed, "BufferInner::flush: done");
        if failed > 0 {
            return Err(PushError::Delivery { failed, total });
        }
        Ok(total)
    }
}

/// Background flush task
///
/// Dropping `shutdown` ends the task after its current flush, so a scheduler
/// dropped without `stop` does not leave the task behind.
struct Ticker {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Strategy that trades latency for fewer writes
pub struct BufferScheduler {
    inner: Arc<BufferInner>,
    options: BufferOptions,
    ticker: Mutex<Option<Ticker>>,
}

impl BufferScheduler {
    pub const KIND: &'static str = "buffer";

    pub fn new(ctx: &AppContext, options: BufferOptions) -> Self {
        debug!(server_id = %ctx.server_id(), ?options, "BufferScheduler::new: called");
        Self {
            inner: Arc::new(BufferInner {
                sink: ctx.sink(),
                queues: Mutex::new(BTreeMap::new()),
            }),
            options,
            ticker: Mutex::new(None),
        }
    }

    /// Build from loosely typed options; `null` means defaults
    pub fn from_options(ctx: &AppContext, options: &Value) -> Result<Self, PushError> {
        let options = if options.is_null() {
            BufferOptions::default()
        } else {
            serde_json::from_value(options.clone()).map_err(|source| PushError::InvalidOptions {
                kind: Self::KIND.to_string(),
                source,
            })?
        };
        Ok(Self::new(ctx, options))
    }

    /// Number of messages waiting for the next flush
    pub async fn pending(&self) -> usize {
        self.inner.queues.lock().await.values().map(Vec::len).sum()
    }

    /// Flush now instead of waiting for the tick
    pub async fn flush(&self) -> Result<usize, PushError> {
        self.inner.flush().await
    }
}

#[async_trait]
impl PushStrategy for BufferScheduler {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn start(&self) -> Result<(), PushError> {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            debug!("BufferScheduler::start: already running");
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let period = self.options.flush_interval();
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = inner.flush().await {
                            warn!(error = %e, "Buffer flush failed");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!("BufferScheduler: ticker exited");
        });
        *ticker = Some(Ticker { handle, shutdown });

        info!(interval_ms = self.options.flush_interval_ms, "Buffer scheduler started");
        Ok(())
    }

    async fn stop(&self, force: bool) -> Result<(), PushError> {
        let ticker = self.ticker.lock().await.take();

        if force {
            if let Some(ticker) = ticker {
                ticker.handle.abort();
            }
            let queues = std::mem::take(&mut *self.inner.queues.lock().await);
            let dropped: usize = queues.values().map(Vec::len).sum();
            if dropped > 0 {
                warn!(dropped, "Buffer scheduler force-stopped with queued messages");
            }
            return Ok(());
        }

        // Let an in-flight flush finish before the final one
        if let Some(Ticker { handle, shutdown }) = ticker {
            let _ = shutdown.send(());
            if let Err(e) = handle.await {
                warn!(error = %e, "Buffer ticker ended abnormally");
            }
        }

        self.inner.flush().await.map(|flushed| {
            info!(flushed, "Buffer scheduler stopped");
        })
    }

    async fn schedule(&self, batch: PushBatch) -> Result<(), PushError> {
        debug!(
            req_id = batch.req_id,
            route = %batch.route,
            recvs = batch.recvs.len(),
            "BufferScheduler::schedule: called"
        );
        if batch.opts.broadcast {
            return self.inner.sink.broadcast(&batch.msg).await;
        }

        let mut queues = self.inner.queues.lock().await;
        for sid in batch.recvs {
            queues.entry(sid).or_default().push(batch.msg.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::sink::{ChannelSink, Delivery};
    use serde_json::json;

    fn scheduler(interval_ms: u64) -> (BufferScheduler, tokio::sync::mpsc::UnboundedReceiver<Delivery>) {
        let (sink, rx) = ChannelSink::new();
        let ctx = AppContext::new("connector-1", Arc::new(sink));
        let options = BufferOptions {
            flush_interval_ms: interval_ms,
        };
        (BufferScheduler::new(&ctx, options), rx)
    }

    #[tokio::test]
    async fn test_buffer_groups_per_session() {
        let (scheduler, mut rx) = scheduler(1000);

        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("a"), vec![1, 2]))
            .await
            .unwrap();
        scheduler
            .schedule(PushBatch::new(2, "onChat", json!("b"), vec![1]))
            .await
            .unwrap();
        assert_eq!(scheduler.pending().await, 3);

        assert_eq!(scheduler.flush().await.unwrap(), 2);
        assert_eq!(
            rx.recv().await.unwrap(),
            Delivery::Batch {
                sid: 1,
                msgs: vec![json!("a"), json!("b")]
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Delivery::Batch {
                sid: 2,
                msgs: vec![json!("a")]
            }
        );
        assert_eq!(scheduler.pending().await, 0);
    }

    #[tokio::test]
    async fn test_buffer_ticker_flushes() {
        let (scheduler, mut rx) = scheduler(10);
        scheduler.start().await.unwrap();
        // Starting twice is harmless
        scheduler.start().await.unwrap();

        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("tick"), vec![5]))
            .await
            .unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("ticker should flush")
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Batch {
                sid: 5,
                msgs: vec![json!("tick")]
            }
        );

        scheduler.stop(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_buffer_stop_flushes_remainder() {
        let (scheduler, mut rx) = scheduler(60_000);
        scheduler.start().await.unwrap();
        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("late"), vec![9]))
            .await
            .unwrap();

        scheduler.stop(false).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::Batch {
                sid: 9,
                msgs: vec![json!("late")]
            }
        );
    }

    /// Sink whose batch writes take a while
    struct SlowSink {
        delay: Duration,
        delivered: std::sync::Mutex<Vec<(SessionId, usize)>>,
    }

    #[async_trait]
    impl SessionSink for SlowSink {
        async fn send(&self, sid: SessionId, msg: &Value) -> Result<(), PushError> {
            self.send_batch(sid, std::slice::from_ref(msg)).await
        }

        async fn send_batch(&self, sid: SessionId, msgs: &[Value]) -> Result<(), PushError> {
            tokio::time::sleep(self.delay).await;
            self.delivered.lock().unwrap().push((sid, msgs.len()));
            Ok(())
        }

        async fn broadcast(&self, _msg: &Value) -> Result<(), PushError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_buffer_stop_waits_for_in_flight_flush() {
        let sink = Arc::new(SlowSink {
            delay: Duration::from_millis(50),
            delivered: std::sync::Mutex::new(Vec::new()),
        });
        let ctx = AppContext::new("connector-1", sink.clone());
        let scheduler = BufferScheduler::new(&ctx, BufferOptions { flush_interval_ms: 10 });
        scheduler.start().await.unwrap();

        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("slow"), vec![3]))
            .await
            .unwrap();

        // The ticker has taken the queue and is inside send_batch
        tokio::time::sleep(Duration::from_millis(25)).await;
        scheduler.stop(false).await.unwrap();

        assert_eq!(scheduler.pending().await, 0);
        assert_eq!(*sink.delivered.lock().unwrap(), vec![(3, 1)]);
    }

    #[tokio::test]
    async fn test_dropped_buffer_releases_ticker() {
        let (scheduler, _rx) = scheduler(10);
        scheduler.start().await.unwrap();
        let inner = Arc::downgrade(&scheduler.inner);

        drop(scheduler);

        tokio::time::timeout(Duration::from_secs(2), async {
            while inner.upgrade().is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ticker should exit once the scheduler is gone");
    }

    #[tokio::test]
    async fn test_buffer_force_stop_drops_queue() {
        let (scheduler, mut rx) = scheduler(60_000);
        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("dropped"), vec![9]))
            .await
            .unwrap();

        scheduler.stop(true).await.unwrap();
        assert_eq!(scheduler.pending().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_buffer_broadcast_is_immediate() {
        let (scheduler, mut rx) = scheduler(60_000);
        scheduler
            .schedule(PushBatch::broadcast(1, "onNotice", json!("now")))
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Delivery::Broadcast { msg: json!("now") });
    }

    #[test]
    fn test_from_options() {
        let (sink, _rx) = ChannelSink::new();
        let ctx = AppContext::new("connector-1", Arc::new(sink));

        let scheduler = BufferScheduler::from_options(&ctx, &json!({"flush-interval-ms": 50})).unwrap();
        assert_eq!(scheduler.options.flush_interval_ms, 50);

        let scheduler = BufferScheduler::from_options(&ctx, &Value::Null).unwrap();
        assert_eq!(scheduler.options, BufferOptions::default());

        let result = BufferScheduler::from_options(&ctx, &json!({"flush-interval-ms": "soon"}));
        assert!(matches!(result, Err(PushError::InvalidOptions { .. })));
    }
}
