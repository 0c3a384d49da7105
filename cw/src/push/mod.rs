//! Push scheduling
//!
//! Outbound message batches go through one facade that hands them to a
//! pluggable delivery strategy, optionally chosen per batch by a selector.

mod buffer;
mod catalog;
mod config;
mod direct;
mod error;
mod resolver;
mod scheduler;
mod selector;
mod sink;
mod strategy;

pub use buffer::{BufferOptions, BufferScheduler};
pub use catalog::StrategyCatalog;
pub use config::{PushSchedulerConfig, SchedulerEntryConfig};
pub use direct::DirectScheduler;
pub use error::PushError;
pub use resolver::{Resolved, SchedulerEntry, SchedulerSetup, SchedulerSource, SchedulerTable, StrategyFactory, resolve};
pub use scheduler::PushScheduler;
pub use selector::{FnSelector, RouteSelector, RouteSelectorConfig, Selector, async_selector_fn, selector_fn};
pub use sink::{ChannelSink, Delivery, SessionSink};
pub use strategy::{AppContext, PushBatch, PushOptions, PushStrategy, SessionId};
