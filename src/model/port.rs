//! Port - an OS network interface

use super::address::IpConfig;
use crate::validation::mac_eq;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Ethernet,
    Wifi,
    Bond,
    Bridge,
    Loopback,
    Unknown,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortType::Ethernet => "ethernet",
            PortType::Wifi => "wifi",
            PortType::Bond => "bond",
            PortType::Bridge => "bridge",
            PortType::Loopback => "loopback",
            PortType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Administrative state requested for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortRequestedState {
    Unknown,
    Enabled,
    Disabled,
}

/// Operational status of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortOperatingStatus {
    Unknown,
    /// Unmanaged or unavailable
    NotAvailable,
    /// Available but no connection applied
    Dormant,
    /// Connection being applied
    Starting,
    InService,
    Stopping,
    Stopped,
}

impl fmt::Display for PortOperatingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortOperatingStatus::Unknown => "unknown",
            PortOperatingStatus::NotAvailable => "not available",
            PortOperatingStatus::Dormant => "dormant",
            PortOperatingStatus::Starting => "starting",
            PortOperatingStatus::InService => "in service",
            PortOperatingStatus::Stopping => "stopping",
            PortOperatingStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Network port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Backend handle
    pub uuid: String,
    /// Interface name
    pub id: String,
    pub kind: PortType,
    /// Current hardware address
    pub mac: Option<String>,
    /// Permanent hardware address
    pub permmac: Option<String>,
    pub mtu: Option<u32>,
    /// Configuration currently applied
    pub ipconfig: IpConfig,
    pub requested_state: PortRequestedState,
    pub operating_status: PortOperatingStatus,
    pub carrier: bool,
    /// Last disconnect reason reported by the backend
    pub state_reason: Option<String>,
}

impl Port {
    pub fn new(uuid: impl Into<String>, id: impl Into<String>, kind: PortType) -> Self {
        Self {
            uuid: uuid.into(),
            id: id.into(),
            kind,
            mac: None,
            permmac: None,
            mtu: None,
            ipconfig: IpConfig::default(),
            requested_state: PortRequestedState::Unknown,
            operating_status: PortOperatingStatus::Unknown,
            carrier: false,
            state_reason: None,
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    /// Hardware address profiles should bind to
    pub fn hw_address(&self) -> Option<&str> {
        self.permmac.as_deref().or(self.mac.as_deref())
    }

    /// Whether `mac` identifies this port
    pub fn matches_mac(&self, mac: &str) -> bool {
        [self.mac.as_deref(), self.permmac.as_deref()]
            .into_iter()
            .flatten()
            .any(|own| mac_eq(own, mac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_address_prefers_permanent() {
        let mut port = Port::new("/dev/1", "eth0", PortType::Ethernet).with_mac("02:00:00:00:00:01");
        assert_eq!(port.hw_address(), Some("02:00:00:00:00:01"));

        port.permmac = Some("00:11:22:33:44:55".to_string());
        assert_eq!(port.hw_address(), Some("00:11:22:33:44:55"));
    }

    #[test]
    fn test_matches_either_address() {
        let mut port = Port::new("/dev/1", "eth0", PortType::Ethernet).with_mac("02:00:00:00:00:01");
        port.permmac = Some("00:11:22:33:44:55".to_string());
        assert!(port.matches_mac("02:00:00:00:00:01"));
        assert!(port.matches_mac("00:11:22:33:44:55"));
        assert!(port.matches_mac("00:11:22:33:44:55".to_uppercase().as_str()));
        assert!(!port.matches_mac("00:11:22:33:44:56"));
    }
}
