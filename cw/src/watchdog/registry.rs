//! Membership registry
//!
//! Plain in-memory state. It is owned by the watchdog actor and never shared,
//! so none of it is behind a lock.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::record::{RegistrySnapshot, WatchdogNotice, WorkerRecord, is_client_kind};

/// Who should receive a notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every subscribed monitor
    Subscribers,
    /// A single monitor, only if it is subscribed
    Monitor(String),
}

/// A notice plus its audience
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub to: Audience,
    pub notice: WatchdogNotice,
}

impl Announcement {
    pub fn subscribers(notice: WatchdogNotice) -> Self {
        Self {
            to: Audience::Subscribers,
            notice,
        }
    }

    pub fn monitor(id: impl Into<String>, notice: WatchdogNotice) -> Self {
        Self {
            to: Audience::Monitor(id.into()),
            notice,
        }
    }
}

/// Outcome of a membership mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// The event did not pass the validity filter; nothing changed
    Filtered,
    /// The registry was updated
    Applied(Vec<Announcement>),
}

impl Mutation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Mutation::Applied(_))
    }

    pub fn into_announcements(self) -> Vec<Announcement> {
        match self {
            Mutation::Filtered => Vec::new(),
            Mutation::Applied(announcements) => announcements,
        }
    }
}

/// Known worker nodes and subscribed monitor agents
#[derive(Debug)]
pub struct MembershipRegistry {
    servers: BTreeMap<String, WorkerRecord>,
    subscribers: BTreeSet<String>,
    started: HashSet<String>,
    expected_servers: Option<usize>,
    started_over: bool,
    created_at: DateTime<Utc>,
}

impl MembershipRegistry {
    /// Create an empty registry
    ///
    /// With `expected_servers` set, `record` announces `StartOver` once that
    /// many distinct ids have reported in.
    pub fn new(expected_servers: Option<usize>) -> Self {
        debug!(?expected_servers, "MembershipRegistry::new: called");
        Self {
            servers: BTreeMap::new(),
            subscribers: BTreeSet::new(),
            started: HashSet::new(),
            expected_servers,
            started_over: false,
            created_at: Utc::now(),
        }
    }

    /// Insert or overwrite a worker record
    pub fn add_server(&mut self, record: WorkerRecord) -> Mutation {
        debug!(id = %record.id, server_type = ?record.server_type, "MembershipRegistry::add_server: called");
        if !record.is_trackable() {
            debug!(id = %record.id, "MembershipRegistry::add_server: filtered");
            return Mutation::Filtered;
        }

        self.servers.insert(record.id.clone(), record.clone());
        Mutation::Applied(vec![Announcement::subscribers(WatchdogNotice::AddServer { server: record })])
    }

    /// Remove a worker record; removing an unknown id is a no-op
    pub fn remove_server(&mut self, id: &str, kind: Option<&str>) -> Mutation {
        debug!(%id, ?kind, "MembershipRegistry::remove_server: called");
        if id.is_empty() || is_client_kind(kind) {
            debug!(%id, "MembershipRegistry::remove_server: filtered");
            return Mutation::Filtered;
        }

        // A departed worker's monitor agent goes with it
        self.subscribers.remove(id);

        match self.servers.remove(id) {
            Some(_) => Mutation::Applied(vec![Announcement::subscribers(WatchdogNotice::RemoveServer {
                id: id.to_string(),
            })]),
            None => {
                debug!(%id, "MembershipRegistry::remove_server: not present");
                Mutation::Applied(Vec::new())
            }
        }
    }

    /// Replace a worker record wholesale after its connection came back
    ///
    /// The reconnecting worker's monitor receives the full membership if it
    /// is subscribed; an unsubscribed one gets it from its next subscribe.
    /// Everyone else hears about it only if the id was not known before.
    pub fn reconnect_server(&mut self, record: WorkerRecord) -> Mutation {
        debug!(id = %record.id, server_type = ?record.server_type, "MembershipRegistry::reconnect_server: called");
        if !record.is_trackable() {
            debug!(id = %record.id, "MembershipRegistry::reconnect_server: filtered");
            return Mutation::Filtered;
        }

        let id = record.id.clone();
        let previous = self.servers.insert(id.clone(), record.clone());

        let mut announcements = vec![Announcement::monitor(
            id,
            WatchdogNotice::ReplaceServer {
                servers: self.servers.values().cloned().collect(),
            },
        )];
        if previous.is_none() {
            announcements.push(Announcement::subscribers(WatchdogNotice::AddServer { server: record }));
        }
        Mutation::Applied(announcements)
    }

    /// Add a monitor to the subscription set; returns true if it was new
    pub fn subscribe(&mut self, monitor_id: &str) -> bool {
        debug!(%monitor_id, "MembershipRegistry::subscribe: called");
        self.subscribers.insert(monitor_id.to_string())
    }

    /// Drop a monitor from the subscription set; returns true if it was present
    pub fn unsubscribe(&mut self, monitor_id: &str) -> bool {
        debug!(%monitor_id, "MembershipRegistry::unsubscribe: called");
        self.subscribers.remove(monitor_id)
    }

    /// Current membership, never filtered by subscription state
    pub fn query(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            records: self.servers.values().cloned().collect(),
        }
    }

    /// Note that a worker finished starting up
    pub fn record(&mut self, id: &str) -> Vec<Announcement> {
        debug!(%id, "MembershipRegistry::record: called");
        self.started.insert(id.to_string());

        match self.expected_servers {
            Some(expected) if !self.started_over && self.started.len() >= expected => {
                self.started_over = true;
                let elapsed = Utc::now() - self.created_at;
                info!(
                    started = self.started.len(),
                    elapsed_ms = elapsed.num_milliseconds(),
                    "All servers started"
                );
                vec![Announcement::subscribers(WatchdogNotice::StartOver)]
            }
            _ => Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkerRecord> {
        self.servers.get(id)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &str> {
        self.subscribers.iter().map(String::as_str)
    }

    pub fn is_subscribed(&self, monitor_id: &str) -> bool {
        self.subscribers.contains(monitor_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn started_count(&self) -> usize {
        self.started.len()
    }

    pub fn has_started_over(&self) -> bool {
        self.started_over
    }
}

impl Default for MembershipRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
