//! Direct scheduler - delivers every batch immediately

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::PushError;
use super::sink::SessionSink;
use super::strategy::{AppContext, PushBatch, PushStrategy};

/// Default strategy: no buffering, one write per receiver
pub struct DirectScheduler {
    sink: Arc<dyn SessionSink>,
}

impl DirectScheduler {
    pub const KIND: &'static str = "direct";

    pub fn new(ctx: &AppContext) -> Self {
        debug!(server_id = %ctx.server_id(), "DirectScheduler::new: called");
        Self { sink: ctx.sink() }
    }
}

#[async_trait]
impl PushStrategy for DirectScheduler {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn schedule(&self, batch: PushBatch) -> Result<(), PushError> {
        debug!(
            req_id = batch.req_id,
            route = %batch.route,
            recvs = batch.recvs.len(),
            "DirectScheduler::schedule: called"
        );
        if batch.opts.broadcast {
            return self.sink.broadcast(&batch.msg).await;
        }

        let mut failed = 0;
        for sid in &batch.recvs {
            if let Err(e) = self.sink.send(*sid, &batch.msg).await {
                warn!(sid, route = %batch.route, error = %e, "Direct push failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(PushError::Delivery {
                failed,
                total: batch.recvs.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::sink::{ChannelSink, Delivery};
    use serde_json::json;

    #[tokio::test]
    async fn test_direct_sends_to_each_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = AppContext::new("connector-1", Arc::new(sink));
        let scheduler = DirectScheduler::new(&ctx);

        scheduler
            .schedule(PushBatch::new(1, "onChat", json!("hi"), vec![1, 2]))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Delivery::Single { sid: 1, msg: json!("hi") });
        assert_eq!(rx.recv().await.unwrap(), Delivery::Single { sid: 2, msg: json!("hi") });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_direct_broadcast() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = AppContext::new("connector-1", Arc::new(sink));
        let scheduler = DirectScheduler::new(&ctx);

        scheduler
            .schedule(PushBatch::broadcast(1, "onNotice", json!("down")))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Delivery::Broadcast { msg: json!("down") });
    }

    #[tokio::test]
    async fn test_direct_reports_failures() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let ctx = AppContext::new("connector-1", Arc::new(sink));
        let scheduler = DirectScheduler::new(&ctx);

        let result = scheduler
            .schedule(PushBatch::new(1, "onChat", json!("hi"), vec![1, 2, 3]))
            .await;
        assert!(matches!(result, Err(PushError::Delivery { failed: 3, total: 3 })));
    }
}
