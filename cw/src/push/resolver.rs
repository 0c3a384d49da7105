//! Scheduler resolver - turns a setup into live strategies
//!
//! A setup is resolved exactly once, at facade construction. After that the
//! id -> strategy table is fixed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use super::direct::DirectScheduler;
use super::error::PushError;
use super::selector::Selector;
use super::strategy::{AppContext, PushStrategy};

/// Builds a strategy from the application context and its options
pub type StrategyFactory =
    Arc<dyn Fn(&AppContext, &Value) -> Result<Arc<dyn PushStrategy>, PushError> + Send + Sync>;

/// Where a strategy comes from
#[derive(Clone)]
pub enum SchedulerSource {
    /// Called with `(context, options)` during resolution
    Factory(StrategyFactory),
    /// Used as-is; options are ignored
    Instance(Arc<dyn PushStrategy>),
}

impl SchedulerSource {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&AppContext, &Value) -> Result<Arc<dyn PushStrategy>, PushError> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    /// The built-in direct strategy
    pub fn direct() -> Self {
        Self::factory(|ctx, _| Ok(Arc::new(DirectScheduler::new(ctx)) as Arc<dyn PushStrategy>))
    }

    pub fn instance(strategy: impl PushStrategy + 'static) -> Self {
        Self::Instance(Arc::new(strategy))
    }

    pub fn instantiate(&self, ctx: &AppContext, options: &Value) -> Result<Arc<dyn PushStrategy>, PushError> {
        match self {
            Self::Factory(factory) => factory(ctx, options),
            Self::Instance(strategy) => Ok(Arc::clone(strategy)),
        }
    }
}

impl fmt::Debug for SchedulerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Instance(strategy) => write!(f, "Instance({})", strategy.name()),
        }
    }
}

/// One named entry of a selectable setup
#[derive(Debug, Clone)]
pub struct SchedulerEntry {
    pub id: String,
    pub scheduler: SchedulerSource,
    pub options: Value,
}

impl SchedulerEntry {
    pub fn new(id: impl Into<String>, scheduler: SchedulerSource) -> Self {
        Self {
            id: id.into(),
            scheduler,
            options: Value::Null,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

/// How the facade is configured
#[derive(Clone)]
pub enum SchedulerSetup {
    Single {
        scheduler: SchedulerSource,
        options: Value,
    },
    Selectable {
        entries: Vec<SchedulerEntry>,
        selector: Option<Arc<dyn Selector>>,
    },
}

impl SchedulerSetup {
    pub fn single(scheduler: SchedulerSource) -> Self {
        Self::Single {
            scheduler,
            options: Value::Null,
        }
    }

    pub fn selectable(entries: Vec<SchedulerEntry>, selector: Arc<dyn Selector>) -> Self {
        Self::Selectable {
            entries,
            selector: Some(selector),
        }
    }
}

impl Default for SchedulerSetup {
    fn default() -> Self {
        Self::single(SchedulerSource::direct())
    }
}

impl fmt::Debug for SchedulerSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { scheduler, options } => f
                .debug_struct("Single")
                .field("scheduler", scheduler)
                .field("options", options)
                .finish(),
            Self::Selectable { entries, selector } => f
                .debug_struct("Selectable")
                .field("entries", entries)
                .field("selector", &selector.is_some())
                .finish(),
        }
    }
}

/// Fixed id -> strategy mapping
#[derive(Clone, Default)]
pub struct SchedulerTable {
    entries: BTreeMap<String, Arc<dyn PushStrategy>>,
}

impl SchedulerTable {
    pub fn get(&self, id: &str) -> Option<&Arc<dyn PushStrategy>> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn PushStrategy>)> {
        self.entries.iter().map(|(id, strategy)| (id.as_str(), strategy))
    }
}

/// A setup after resolution
#[derive(Clone)]
pub enum Resolved {
    Single(Arc<dyn PushStrategy>),
    Selectable {
        table: SchedulerTable,
        selector: Arc<dyn Selector>,
    },
}

impl Resolved {
    /// Every strategy the facade owns, in id order for selectable mode
    pub fn strategies(&self) -> Vec<Arc<dyn PushStrategy>> {
        match self {
            Self::Single(strategy) => vec![Arc::clone(strategy)],
            Self::Selectable { table, .. } => table.iter().map(|(_, s)| Arc::clone(s)).collect(),
        }
    }
}

fn instantiate(
    ctx: &AppContext,
    id: &str,
    source: &SchedulerSource,
    options: &Value,
) -> Result<Arc<dyn PushStrategy>, PushError> {
    source.instantiate(ctx, options).map_err(|e| {
        error!(%id, error = %e, "Push scheduler could not be created");
        match e {
            PushError::InvalidOptions { .. } | PushError::UnknownKind(_) => e,
            other => PushError::MissingCapability {
                id: id.to_string(),
                reason: other.to_string(),
            },
        }
    })
}

/// Resolve a setup into live strategies
///
/// Configuration problems are logged and returned; nothing is retried.
pub fn resolve(ctx: &AppContext, setup: SchedulerSetup) -> Result<Resolved, PushError> {
    debug!(?setup, "resolve: called");
    match setup {
        SchedulerSetup::Single { scheduler, options } => {
            let strategy = instantiate(ctx, "default", &scheduler, &options)?;
            info!(strategy = strategy.name(), "Push scheduler resolved");
            Ok(Resolved::Single(strategy))
        }
        SchedulerSetup::Selectable { entries, selector } => {
            if entries.is_empty() {
                error!("Selectable push scheduler has no schedulers");
                return Err(PushError::EmptyTable);
            }
            let Some(selector) = selector else {
                error!("Selectable push scheduler has no selector");
                return Err(PushError::MissingSelector);
            };

            let mut table = SchedulerTable::default();
            for entry in entries {
                if table.entries.contains_key(&entry.id) {
                    error!(id = %entry.id, "Duplicate pushScheduler id");
                    return Err(PushError::DuplicateId(entry.id));
                }
                let strategy = instantiate(ctx, &entry.id, &entry.scheduler, &entry.options)?;
                debug!(id = %entry.id, strategy = strategy.name(), "resolve: entry ready");
                table.entries.insert(entry.id, strategy);
            }

            info!(ids = ?table.ids(), "Selectable push scheduler resolved");
            Ok(Resolved::Selectable { table, selector })
        }
    }
}
