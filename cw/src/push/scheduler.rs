//! PushScheduler - single entry point for outbound batches
//!
//! Owns the resolved strategies and decides, per batch, which one delivers it:
//! - **Single mode:** every batch goes to the one strategy
//! - **Selectable mode:** the selector is asked once per batch for a scheduler id
//!
//! Lifecycle calls wait for every strategy before returning.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info};

use super::catalog::StrategyCatalog;
use super::config::PushSchedulerConfig;
use super::error::PushError;
use super::resolver::{Resolved, SchedulerSetup, resolve};
use super::strategy::{AppContext, PushBatch, PushStrategy};

/// Push scheduler facade
pub struct PushScheduler {
    ctx: AppContext,
    resolved: Resolved,
}

impl PushScheduler {
    /// Component name the host registers this under
    pub const NAME: &'static str = "__pushScheduler__";

    pub fn new(ctx: AppContext, setup: SchedulerSetup) -> Result<Self, PushError> {
        debug!(server_id = %ctx.server_id(), "PushScheduler::new: called");
        let resolved = resolve(&ctx, setup)?;
        Ok(Self { ctx, resolved })
    }

    /// Resolve from YAML configuration through a catalog
    pub fn from_config(
        ctx: AppContext,
        config: &PushSchedulerConfig,
        catalog: &StrategyCatalog,
    ) -> Result<Self, PushError> {
        debug!(?config, "PushScheduler::from_config: called");
        let setup = catalog.setup(config)?;
        Self::new(ctx, setup)
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn server_id(&self) -> &str {
        self.ctx.server_id()
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self.resolved, Resolved::Selectable { .. })
    }

    /// Scheduler ids in selectable mode; empty in single mode
    pub fn scheduler_ids(&self) -> Vec<String> {
        match &self.resolved {
            Resolved::Single(_) => Vec::new(),
            Resolved::Selectable { table, .. } => table.ids(),
        }
    }

    /// Start every strategy and wait for all of them
    pub async fn after_start(&self) -> Result<(), PushError> {
        debug!("PushScheduler::after_start: called");
        let strategies = self.resolved.strategies();
        let results = join_all(strategies.iter().map(|s| s.start())).await;
        first_error("start", &strategies, results)?;
        info!(count = strategies.len(), "Push scheduler started");
        Ok(())
    }

    /// Stop every strategy and wait for all of them
    pub async fn stop(&self, force: bool) -> Result<(), PushError> {
        debug!(force, "PushScheduler::stop: called");
        let strategies = self.resolved.strategies();
        let results = join_all(strategies.iter().map(|s| s.stop(force))).await;
        first_error("stop", &strategies, results)?;
        info!(count = strategies.len(), force, "Push scheduler stopped");
        Ok(())
    }

    /// Deliver one batch through the resolved strategy
    pub async fn schedule(&self, batch: PushBatch) -> Result<(), PushError> {
        debug!(req_id = batch.req_id, route = %batch.route, "PushScheduler::schedule: called");
        match &self.resolved {
            Resolved::Single(strategy) => strategy.schedule(batch).await,
            Resolved::Selectable { table, selector } => {
                let id = selector.select(&batch).await;
                let Some(strategy) = table.get(&id) else {
                    error!(%id, route = %batch.route, req_id = batch.req_id, "Invalid pushScheduler id");
                    return Err(PushError::UnknownScheduler(id));
                };
                debug!(%id, strategy = strategy.name(), "PushScheduler::schedule: selected");
                strategy.schedule(batch).await
            }
        }
    }
}

/// Log every failure, return the first
fn first_error(
    phase: &str,
    strategies: &[Arc<dyn PushStrategy>],
    results: Vec<Result<(), PushError>>,
) -> Result<(), PushError> {
    let mut first = None;
    for (strategy, result) in strategies.iter().zip(results) {
        if let Err(e) = result {
            error!(phase, strategy = strategy.name(), error = %e, "Push scheduler lifecycle failed");
            first.get_or_insert(e);
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
