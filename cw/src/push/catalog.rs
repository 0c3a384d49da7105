//! StrategyCatalog - named strategy kinds for YAML-driven setups

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use super::buffer::BufferScheduler;
use super::config::PushSchedulerConfig;
use super::direct::DirectScheduler;
use super::error::PushError;
use super::resolver::{SchedulerEntry, SchedulerSetup, SchedulerSource, StrategyFactory};
use super::selector::{RouteSelector, Selector};
use super::strategy::{AppContext, PushStrategy};

/// Maps kind names to strategy factories
#[derive(Clone)]
pub struct StrategyCatalog {
    kinds: BTreeMap<String, StrategyFactory>,
}

impl StrategyCatalog {
    /// Catalog with the built-in kinds
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();

        catalog.register(DirectScheduler::KIND, |ctx, _| {
            Ok(Arc::new(DirectScheduler::new(ctx)) as Arc<dyn PushStrategy>)
        });
        catalog.register(BufferScheduler::KIND, |ctx, options| {
            Ok(Arc::new(BufferScheduler::from_options(ctx, options)?) as Arc<dyn PushStrategy>)
        });

        catalog
    }

    /// Create an empty catalog (for testing)
    pub fn empty() -> Self {
        Self { kinds: BTreeMap::new() }
    }

    /// Add or replace a kind
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&AppContext, &Value) -> Result<Arc<dyn PushStrategy>, PushError> + Send + Sync + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    pub fn factory(&self, kind: &str) -> Result<StrategyFactory, PushError> {
        self.kinds.get(kind).cloned().ok_or_else(|| {
            error!(%kind, known = ?self.kinds(), "Unknown scheduler kind");
            PushError::UnknownKind(kind.to_string())
        })
    }

    /// Build a setup from configuration
    ///
    /// Selector targets are checked against the configured ids here, so a
    /// route that could never resolve is a configuration error up front.
    pub fn setup(&self, config: &PushSchedulerConfig) -> Result<SchedulerSetup, PushError> {
        debug!(selectable = config.is_selectable(), "StrategyCatalog::setup: called");
        if !config.is_selectable() {
            return Ok(SchedulerSetup::Single {
                scheduler: SchedulerSource::Factory(self.factory(&config.scheduler)?),
                options: config.options.clone(),
            });
        }

        let entries = config
            .schedulers
            .iter()
            .map(|entry| {
                Ok(SchedulerEntry::new(&entry.id, SchedulerSource::Factory(self.factory(&entry.kind)?))
                    .with_options(entry.options.clone()))
            })
            .collect::<Result<Vec<_>, PushError>>()?;

        let selector = match &config.selector {
            Some(selector_config) => {
                let selector = RouteSelector::from_config(selector_config);
                if let Some(target) = selector
                    .targets()
                    .find(|target| !entries.iter().any(|entry| entry.id == *target))
                {
                    error!(%target, "Selector routes to an unknown pushScheduler id");
                    return Err(PushError::UnknownScheduler(target.to_string()));
                }
                Some(Arc::new(selector) as Arc<dyn Selector>)
            }
            None => None,
        };

        Ok(SchedulerSetup::Selectable { entries, selector })
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
