//! Active connections - connections currently applied to ports

use serde::{Deserialize, Serialize};
use std::fmt;

/// Active connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveConnectionStatus {
    Unknown,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
}

impl fmt::Display for ActiveConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActiveConnectionStatus::Unknown => "unknown",
            ActiveConnectionStatus::Activating => "activating",
            ActiveConnectionStatus::Activated => "activated",
            ActiveConnectionStatus::Deactivating => "deactivating",
            ActiveConnectionStatus::Deactivated => "deactivated",
        };
        f.write_str(name)
    }
}

/// Active connection as tracked by the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveConnection {
    /// Backend handle, also used as identity
    pub uuid: String,
    /// Id of the applied connection, if known
    pub connection: Option<String>,
    /// Ids of the ports the connection is applied to
    pub ports: Vec<String>,
    pub status: ActiveConnectionStatus,
}

impl ActiveConnection {
    pub fn id(&self) -> &str {
        &self.uuid
    }
}

/// Active connection as reported by a backend
///
/// References point at backend handles and are resolved against the
/// network's ports and connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConnectionInfo {
    pub uuid: String,
    /// Backend handle of the applied connection
    pub connection_uuid: Option<String>,
    /// Backend handles of the ports
    pub port_uuids: Vec<String>,
    pub status: ActiveConnectionStatus,
}

impl ActiveConnectionInfo {
    pub fn new(uuid: impl Into<String>, status: ActiveConnectionStatus) -> Self {
        Self {
            uuid: uuid.into(),
            connection_uuid: None,
            port_uuids: Vec::new(),
            status,
        }
    }
}
