//! Membership watchdog
//!
//! The watchdog tracks which worker nodes are part of the cluster and answers
//! monitor agents:
//! - **Registry:** known workers plus subscribed monitors, owned by one task
//! - **Protocol:** subscribe / unsubscribe / query / record requests
//! - **Bridge:** register / disconnect / reconnect notifications from the cluster bus

mod bridge;
mod config;
mod core;
mod handle;
mod messages;
mod notifier;
mod protocol;
mod record;
mod registry;

pub use bridge::{ClusterBus, ClusterEvent, DEFAULT_BUS_CAPACITY, EventBridge};
pub use config::WatchdogConfig;
pub use core::Watchdog;
pub use handle::WatchdogHandle;
pub use messages::{WatchdogError, WatchdogMetrics, WatchdogRequest, WatchdogResponse};
pub use notifier::{ChannelNotifier, LogNotifier, MonitorNotice, MonitorNotifier};
pub use protocol::{Dispatch, WatchdogAction, WatchdogMessage, WatchdogReply, dispatch};
pub use record::{CLIENT_KIND, RegistrySnapshot, WatchdogNotice, WorkerRecord, is_client_kind};
pub use registry::{Announcement, Audience, MembershipRegistry, Mutation};
