//! Watchdog protocol handler
//!
//! Maps monitor-agent requests onto registry operations. Runs inside the
//! watchdog actor, so every call sees a consistent registry: filtering,
//! then mutation, then the reply.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::messages::{WatchdogError, WatchdogResponse};
use super::record::{RegistrySnapshot, WorkerRecord};
use super::registry::{Announcement, MembershipRegistry, Mutation};

/// Actions understood by the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    AddServer,
    RemoveServer,
    ReconnectServer,
    Subscribe,
    Unsubscribe,
    Query,
    Record,
}

impl WatchdogAction {
    const TABLE: [(&'static str, WatchdogAction); 7] = [
        ("addServer", WatchdogAction::AddServer),
        ("removeServer", WatchdogAction::RemoveServer),
        ("reconnectServer", WatchdogAction::ReconnectServer),
        ("subscribe", WatchdogAction::Subscribe),
        ("unsubscribe", WatchdogAction::Unsubscribe),
        ("query", WatchdogAction::Query),
        ("record", WatchdogAction::Record),
    ];

    /// Look up an action by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .into_iter()
            .find(|&(n, _)| n == name)
            .map(|(_, action)| action)
    }

    /// Wire name of this action
    pub fn name(&self) -> &'static str {
        Self::TABLE
            .into_iter()
            .find(|&(_, action)| action == *self)
            .map(|(n, _)| n)
            .unwrap_or("unknown")
    }
}

/// Read a field, falling back to its default when it has the wrong shape
///
/// A bad field only matters to the actions that use it, so it must not
/// sink the whole request.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        debug!(error = %e, "Ignoring malformed watchdog message field");
        T::default()
    }))
}

/// A request from a monitor agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchdogMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub action: String,

    /// Monitor id for subscribe/unsubscribe/record, server id for removeServer
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Connection kind for removeServer
    #[serde(rename = "type", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Worker record for addServer/reconnectServer
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub server: Option<WorkerRecord>,
}

impl WatchdogMessage {
    fn with_action(action: WatchdogAction) -> Self {
        Self {
            action: action.name().to_string(),
            ..Default::default()
        }
    }

    pub fn subscribe(monitor_id: impl Into<String>) -> Self {
        Self {
            id: Some(monitor_id.into()),
            ..Self::with_action(WatchdogAction::Subscribe)
        }
    }

    pub fn unsubscribe(monitor_id: impl Into<String>) -> Self {
        Self {
            id: Some(monitor_id.into()),
            ..Self::with_action(WatchdogAction::Unsubscribe)
        }
    }

    pub fn query() -> Self {
        Self::with_action(WatchdogAction::Query)
    }

    pub fn record(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::with_action(WatchdogAction::Record)
        }
    }

    pub fn add_server(record: WorkerRecord) -> Self {
        Self {
            server: Some(record),
            ..Self::with_action(WatchdogAction::AddServer)
        }
    }

    pub fn remove_server(id: impl Into<String>, kind: Option<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind,
            ..Self::with_action(WatchdogAction::RemoveServer)
        }
    }

    pub fn reconnect_server(record: WorkerRecord) -> Self {
        Self {
            server: Some(record),
            ..Self::with_action(WatchdogAction::ReconnectServer)
        }
    }

    /// Parse a raw JSON request; `null` means no message at all
    ///
    /// Only a non-object fails. Fields of the wrong type read as absent, so
    /// `action` decides what happens and each action checks what it needs.
    pub fn from_value(value: Value) -> Result<Option<Self>, serde_json::Error> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }

    fn monitor_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Successful watchdog reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WatchdogReply {
    /// Current membership (subscribe, query)
    Snapshot(RegistrySnapshot),
    /// Acknowledgement with no payload
    Ack,
}

impl WatchdogReply {
    pub fn snapshot(&self) -> Option<&RegistrySnapshot> {
        match self {
            WatchdogReply::Snapshot(snapshot) => Some(snapshot),
            WatchdogReply::Ack => None,
        }
    }
}

/// What a single dispatch produced
#[derive(Debug, Default)]
pub struct Dispatch {
    /// `None` when the request gets no reply by design
    pub reply: Option<WatchdogResponse>,

    /// Notices for subscribed monitors
    pub announcements: Vec<Announcement>,

    /// Whether the action was found in the table
    pub recognized: bool,

    /// Whether a membership event was filtered out
    pub filtered: bool,
}

impl Dispatch {
    fn reply(reply: WatchdogResponse) -> Self {
        Self {
            reply: Some(reply),
            recognized: true,
            ..Default::default()
        }
    }

    fn silent() -> Self {
        Self {
            recognized: true,
            ..Default::default()
        }
    }
}

/// Route one monitor request to the registry
///
/// Never fails past this boundary: malformed subscribe/unsubscribe requests
/// come back as an error reply, unknown actions and empty messages are logged
/// and produce no reply, and `record` never replies.
pub fn dispatch(registry: &mut MembershipRegistry, agent: &str, msg: Option<&WatchdogMessage>) -> Dispatch {
    debug!(%agent, ?msg, "dispatch: called");
    let Some(msg) = msg else {
        warn!(%agent, "Watchdog received empty message");
        return Dispatch::default();
    };

    let Some(action) = WatchdogAction::from_name(&msg.action) else {
        info!(%agent, action = %msg.action, "Watchdog unknown action");
        return Dispatch::default();
    };

    match action {
        WatchdogAction::Subscribe => {
            let Some(monitor_id) = msg.monitor_id() else {
                return Dispatch::reply(Err(WatchdogError::Malformed(
                    "subscribe requires a monitor id".to_string(),
                )));
            };
            registry.subscribe(monitor_id);
            Dispatch::reply(Ok(WatchdogReply::Snapshot(registry.query())))
        }

        WatchdogAction::Unsubscribe => {
            let Some(monitor_id) = msg.monitor_id() else {
                return Dispatch::reply(Err(WatchdogError::Malformed(
                    "unsubscribe requires a monitor id".to_string(),
                )));
            };
            registry.unsubscribe(monitor_id);
            Dispatch::reply(Ok(WatchdogReply::Ack))
        }

        WatchdogAction::Query => Dispatch::reply(Ok(WatchdogReply::Snapshot(registry.query()))),

        WatchdogAction::Record => {
            let mut dispatch = Dispatch::silent();
            match msg.monitor_id() {
                Some(id) => dispatch.announcements = registry.record(id),
                None => warn!(%agent, "Watchdog record without id"),
            }
            dispatch
        }

        WatchdogAction::AddServer | WatchdogAction::ReconnectServer => {
            let mutation = match msg.server.clone() {
                Some(record) if action == WatchdogAction::AddServer => registry.add_server(record),
                Some(record) => registry.reconnect_server(record),
                None => {
                    warn!(%agent, action = action.name(), "Watchdog request without server record");
                    Mutation::Filtered
                }
            };
            let filtered = !mutation.is_applied();
            Dispatch {
                filtered,
                announcements: mutation.into_announcements(),
                ..Dispatch::reply(Ok(WatchdogReply::Ack))
            }
        }

        WatchdogAction::RemoveServer => {
            let mutation = registry.remove_server(msg.id.as_deref().unwrap_or_default(), msg.kind.as_deref());
            let filtered = !mutation.is_applied();
            Dispatch {
                filtered,
                announcements: mutation.into_announcements(),
                ..Dispatch::reply(Ok(WatchdogReply::Ack))
            }
        }
    }
}
