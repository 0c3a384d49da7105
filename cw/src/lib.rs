//! ClusterWatch - cluster membership watchdog and pluggable push scheduling
//!
//! Two independent pieces a cluster's master and frontend nodes run:
//!
//! - **Watchdog**: tracks which worker servers are alive, answers monitor
//!   agents' subscribe / unsubscribe / query / record requests and fans out
//!   membership notices to subscribed monitors
//! - **Push scheduling**: a facade that hands outbound message batches to a
//!   pluggable delivery strategy, optionally chosen per batch by a selector
//!
//! # Modules
//!
//! - [`watchdog`] - membership registry, request protocol, cluster event bridge
//! - [`push`] - push scheduler facade, strategies, selectors
//! - [`replay`] - scripted sessions against live components
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod push;
pub mod replay;
pub mod watchdog;

// Re-export commonly used types
pub use config::Config;
pub use push::{
    AppContext, BufferScheduler, DirectScheduler, PushBatch, PushError, PushScheduler, PushSchedulerConfig,
    PushStrategy, RouteSelector, SchedulerEntry, SchedulerSetup, SchedulerSource, Selector, SessionSink,
    StrategyCatalog, selector_fn,
};
pub use replay::{ReplayOutput, ScriptStep};
pub use watchdog::{
    ClusterBus, ClusterEvent, EventBridge, MembershipRegistry, Watchdog, WatchdogConfig, WatchdogError,
    WatchdogHandle, WatchdogMessage, WatchdogMetrics, WatchdogNotice, WatchdogReply, WorkerRecord,
};
