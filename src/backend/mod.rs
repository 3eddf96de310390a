//! Network management backends
//!
//! A backend is the source of truth for ports, connection profiles and
//! active connections. The `Network` reads everything once at start-up and
//! afterwards only learns about changes through `BackendEvent`s pushed into
//! the `EventSink` it hands to `Backend::subscribe`.

pub mod memory;
#[cfg(feature = "dbus-nm")]
pub mod nm;

use crate::error::NetworkResult;
use crate::model::{ActiveConnectionInfo, Connection, Port};
use crate::network::LoopMessage;
use tokio::sync::mpsc;

pub use memory::{BackendCall, MemoryBackend, Operation};
#[cfg(feature = "dbus-nm")]
pub use nm::NmBackend;

/// Change notification emitted by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    PortAdded(Port),
    /// Port properties (state, addresses, carrier) changed
    PortChanged(Port),
    PortRemoved { uuid: String },
    ConnectionAdded(Connection),
    /// A stored profile was replaced
    ConnectionUpdated(Connection),
    ConnectionRemoved { uuid: String },
    /// Properties of one active connection changed
    ActiveConnectionChanged(ActiveConnectionInfo),
    /// The set of active connections changed; carries the full new list
    ActiveConnectionsChanged(Vec<ActiveConnectionInfo>),
}

impl BackendEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::PortAdded(_) => "port-added",
            BackendEvent::PortChanged(_) => "port-changed",
            BackendEvent::PortRemoved { .. } => "port-removed",
            BackendEvent::ConnectionAdded(_) => "connection-added",
            BackendEvent::ConnectionUpdated(_) => "connection-updated",
            BackendEvent::ConnectionRemoved { .. } => "connection-removed",
            BackendEvent::ActiveConnectionChanged(_) => "active-connection-changed",
            BackendEvent::ActiveConnectionsChanged(_) => "active-connections-changed",
        }
    }
}

/// Outcome of an activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The connection is already applied
    Completed,
    /// Activation continues in the background; progress is reported through
    /// `ActiveConnectionChanged` events for `active_connection`
    Pending { active_connection: String },
}

/// Handle a backend uses to deliver events to the network's event loop
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<LoopMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LoopMessage>) -> Self {
        Self { tx }
    }

    /// Queues an event; returns false once the network has shut down
    pub fn send(&self, event: BackendEvent) -> bool {
        self.tx.send(LoopMessage::Backend(event)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Capabilities the network needs from a network management service
///
/// All methods block. `subscribe` is called once from the network's
/// background thread before the initial enumeration; events must be pushed
/// into the sink from then on, from any thread.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Get the name of this backend (e.g., "networkmanager", "memory")
    fn name(&self) -> &'static str;

    /// Enumerate current ports
    fn list_ports(&self) -> NetworkResult<Vec<Port>>;

    /// Enumerate stored connection profiles, with backend handles filled in
    fn list_connections(&self) -> NetworkResult<Vec<Connection>>;

    /// Enumerate active connections
    fn list_active_connections(&self) -> NetworkResult<Vec<ActiveConnectionInfo>>;

    /// Store a new profile and return its backend handle
    fn create_connection(&self, connection: &Connection) -> NetworkResult<String>;

    /// Replace the profile stored under `uuid`
    fn update_connection(&self, uuid: &str, connection: &Connection) -> NetworkResult<()>;

    /// Delete the profile stored under `uuid`
    fn delete_connection(&self, uuid: &str) -> NetworkResult<()>;

    /// Apply the profile `connection_uuid`, optionally on port `port_uuid`
    fn activate_connection(
        &self,
        connection_uuid: &str,
        port_uuid: Option<String>,
    ) -> NetworkResult<Activation>;

    /// Start delivering change events into `sink`
    fn subscribe(&self, sink: EventSink) -> NetworkResult<()>;

    /// Stop delivering change events
    fn unsubscribe(&self);
}
