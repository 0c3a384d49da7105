//! Selectors - pick a scheduler id for each batch

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::strategy::PushBatch;

/// Routing policy for selectable mode
///
/// The facade calls `select` exactly once per batch. Implementations may look
/// at anything in the batch (request id, route, message, receivers, options).
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(&self, batch: &PushBatch) -> String;
}

type SelectFn = dyn Fn(&PushBatch) -> BoxFuture<'static, String> + Send + Sync;

/// Selector backed by a closure
pub struct FnSelector {
    f: Box<SelectFn>,
}

#[async_trait]
impl Selector for FnSelector {
    async fn select(&self, batch: &PushBatch) -> String {
        (self.f)(batch).await
    }
}

/// Wrap a synchronous closure as a selector
pub fn selector_fn<F, S>(f: F) -> Arc<dyn Selector>
where
    F: Fn(&PushBatch) -> S + Send + Sync + 'static,
    S: Into<String>,
{
    Arc::new(FnSelector {
        f: Box::new(move |batch: &PushBatch| -> BoxFuture<'static, String> {
            let id = f(batch).into();
            Box::pin(async move { id })
        }),
    })
}

/// Wrap an async closure as a selector
///
/// The closure receives an owned copy of the batch so the returned future
/// can outlive the borrow.
pub fn async_selector_fn<F, Fut>(f: F) -> Arc<dyn Selector>
where
    F: Fn(PushBatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    Arc::new(FnSelector {
        f: Box::new(move |batch: &PushBatch| -> BoxFuture<'static, String> { Box::pin(f(batch.clone())) }),
    })
}

/// Route selector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSelectorConfig {
    /// Scheduler id used when no prefix matches
    pub default: String,

    /// Route prefix -> scheduler id
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

/// Picks a scheduler by longest matching route prefix
#[derive(Debug, Clone)]
pub struct RouteSelector {
    default: String,
    routes: BTreeMap<String, String>,
}

impl RouteSelector {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            routes: BTreeMap::new(),
        }
    }

    pub fn route(mut self, prefix: impl Into<String>, id: impl Into<String>) -> Self {
        self.routes.insert(prefix.into(), id.into());
        self
    }

    pub fn from_config(config: &RouteSelectorConfig) -> Self {
        Self {
            default: config.default.clone(),
            routes: config.routes.clone(),
        }
    }

    /// Scheduler ids this selector can produce
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default.as_str()).chain(self.routes.values().map(String::as_str))
    }

    fn pick(&self, route: &str) -> &str {
        self.routes
            .iter()
            .filter(|(prefix, _)| route.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, id)| id.as_str())
            .unwrap_or(self.default.as_str())
    }
}

#[async_trait]
impl Selector for RouteSelector {
    async fn select(&self, batch: &PushBatch) -> String {
        let id = self.pick(&batch.route);
        debug!(route = %batch.route, %id, "RouteSelector::select: picked");
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(route: &str) -> PushBatch {
        PushBatch::new(1, route, json!(null), vec![1])
    }

    #[tokio::test]
    async fn test_route_selector_longest_prefix() {
        let selector = RouteSelector::new("direct")
            .route("chat.", "buffer")
            .route("chat.room.", "room");

        assert_eq!(selector.select(&batch("chat.room.onJoin")).await, "room");
        assert_eq!(selector.select(&batch("chat.onSend")).await, "buffer");
        assert_eq!(selector.select(&batch("area.onMove")).await, "direct");
    }

    #[tokio::test]
    async fn test_route_selector_from_config() {
        let config: RouteSelectorConfig = serde_yaml::from_str(
            r#"
default: a
routes:
  onChat: b
"#,
        )
        .unwrap();
        let selector = RouteSelector::from_config(&config);

        assert_eq!(selector.select(&batch("onChat")).await, "b");
        assert_eq!(selector.select(&batch("onMove")).await, "a");
        let mut targets: Vec<_> = selector.targets().collect();
        targets.sort();
        assert_eq!(targets, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_selector_fn_sees_whole_batch() {
        let selector = selector_fn(|batch: &PushBatch| if batch.recvs.len() > 1 { "fanout" } else { "single" });

        let many = PushBatch::new(1, "onChat", json!(null), vec![1, 2, 3]);
        assert_eq!(selector.select(&many).await, "fanout");
        assert_eq!(selector.select(&batch("onChat")).await, "single");
    }

    #[tokio::test]
    async fn test_async_selector_fn() {
        let selector = async_selector_fn(|batch: PushBatch| async move {
            tokio::task::yield_now().await;
            format!("by-{}", batch.req_id)
        });
        assert_eq!(selector.select(&batch("onChat")).await, "by-1");
    }
}
