//! Connection settings (one configuration facet each)

use super::address::{validate_search_domains, Address, DnsServer, ProtocolType, Route};
use crate::error::{NetworkError, NetworkResult};
use crate::validation::{validate_interface_name, validate_mac_address, validate_mtu};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Setting discriminant, used for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingType {
    Ipv4,
    Ipv6,
    Wired,
    Bond,
    Bridge,
    BridgeSlave,
}

/// IP configuration method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpMethod {
    Unknown,
    Disabled,
    Static,
    Dhcp,
    /// IPv6 stateless autoconfiguration
    Stateless,
    Dhcpv6,
    LinkLocal,
}

/// IPv4 or IPv6 setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSetting {
    pub method: IpMethod,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub dns_servers: Vec<DnsServer>,
    pub search_domains: Vec<String>,
    /// DHCP client identifier
    pub clientid: Option<String>,
}

impl IpSetting {
    pub fn new(method: IpMethod) -> Self {
        Self {
            method,
            addresses: Vec::new(),
            routes: Vec::new(),
            dns_servers: Vec::new(),
            search_domains: Vec::new(),
            clientid: None,
        }
    }

    fn validate(&self, family: ProtocolType) -> NetworkResult<()> {
        match (family, self.method) {
            (ProtocolType::Ipv4, IpMethod::Stateless | IpMethod::Dhcpv6) => {
                return Err(NetworkError::InvalidParameter(format!(
                    "Method {:?} is not available for IPv4",
                    self.method
                )));
            }
            (ProtocolType::Ipv6, IpMethod::Dhcp) => {
                return Err(NetworkError::InvalidParameter(
                    "Method Dhcp is not available for IPv6, use Dhcpv6".to_string(),
                ));
            }
            _ => {}
        }
        if self.method == IpMethod::Static && self.addresses.is_empty() {
            return Err(NetworkError::InvalidParameter(
                "Static configuration requires at least one address".to_string(),
            ));
        }
        for address in &self.addresses {
            address.validate(family)?;
        }
        for route in &self.routes {
            route.validate(family)?;
        }
        for dns in &self.dns_servers {
            if dns.protocol() != family {
                return Err(NetworkError::WrongParameter(format!(
                    "DNS server {} does not belong to {:?}",
                    dns.addr, family
                )));
            }
        }
        validate_search_domains(&self.search_domains)
    }
}

/// Wired ethernet setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiredSetting {
    pub mac: Option<String>,
    pub mtu: Option<u32>,
}

/// Bonding mode (kernel numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondMode {
    BalanceRr = 0,
    ActiveBackup = 1,
    BalanceXor = 2,
    Broadcast = 3,
    Ieee8023ad = 4,
    BalanceTlb = 5,
    BalanceAlb = 6,
}

impl BondMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BondMode::BalanceRr => "balance-rr",
            BondMode::ActiveBackup => "active-backup",
            BondMode::BalanceXor => "balance-xor",
            BondMode::Broadcast => "broadcast",
            BondMode::Ieee8023ad => "802.3ad",
            BondMode::BalanceTlb => "balance-tlb",
            BondMode::BalanceAlb => "balance-alb",
        }
    }
}

impl TryFrom<u8> for BondMode {
    type Error = NetworkError;

    fn try_from(value: u8) -> NetworkResult<Self> {
        Ok(match value {
            0 => BondMode::BalanceRr,
            1 => BondMode::ActiveBackup,
            2 => BondMode::BalanceXor,
            3 => BondMode::Broadcast,
            4 => BondMode::Ieee8023ad,
            5 => BondMode::BalanceTlb,
            6 => BondMode::BalanceAlb,
            _ => {
                return Err(NetworkError::InvalidParameter(format!(
                    "Bond mode {} out of range (0-6)",
                    value
                )))
            }
        })
    }
}

impl FromStr for BondMode {
    type Err = NetworkError;

    fn from_str(s: &str) -> NetworkResult<Self> {
        if let Ok(numeric) = s.parse::<u8>() {
            return BondMode::try_from(numeric);
        }
        [
            BondMode::BalanceRr,
            BondMode::ActiveBackup,
            BondMode::BalanceXor,
            BondMode::Broadcast,
            BondMode::Ieee8023ad,
            BondMode::BalanceTlb,
            BondMode::BalanceAlb,
        ]
        .into_iter()
        .find(|mode| mode.as_str() == s)
        .ok_or_else(|| NetworkError::InvalidParameter(format!("Unknown bond mode '{}'", s)))
    }
}

impl fmt::Display for BondMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bond master setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondSetting {
    pub interface_name: Option<String>,
    pub mode: BondMode,
    /// Link monitoring frequency (ms)
    pub miimon: u32,
    pub downdelay: u32,
    pub updelay: u32,
    pub arp_interval: u32,
    pub arp_ip_target: Vec<IpAddr>,
}

impl Default for BondSetting {
    fn default() -> Self {
        Self {
            interface_name: None,
            mode: BondMode::BalanceRr,
            miimon: 100,
            downdelay: 0,
            updelay: 0,
            arp_interval: 0,
            arp_ip_target: Vec::new(),
        }
    }
}

/// Bridge master setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSetting {
    pub interface_name: Option<String>,
    pub stp: bool,
    pub priority: u16,
    /// Seconds
    pub forward_delay: u32,
    /// Seconds
    pub hello_time: u32,
    /// Seconds
    pub max_age: u32,
    /// Seconds
    pub ageing_time: u32,
}

impl Default for BridgeSetting {
    fn default() -> Self {
        Self {
            interface_name: None,
            stp: true,
            priority: 32768,
            forward_delay: 15,
            hello_time: 2,
            max_age: 20,
            ageing_time: 300,
        }
    }
}

/// Bridge port setting of a bridge slave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSlaveSetting {
    pub priority: u16,
    pub path_cost: u32,
    pub hairpin_mode: bool,
}

impl Default for BridgeSlaveSetting {
    fn default() -> Self {
        Self {
            priority: 32,
            path_cost: 100,
            hairpin_mode: false,
        }
    }
}

/// Per-type setting payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKind {
    Ipv4(IpSetting),
    Ipv6(IpSetting),
    Wired(WiredSetting),
    Bond(BondSetting),
    Bridge(BridgeSetting),
    BridgeSlave(BridgeSlaveSetting),
}

/// One configuration facet of a connection
///
/// `id` and `caption` are only known once the owning connection has been
/// read back from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub id: Option<String>,
    pub caption: Option<String>,
    pub kind: SettingKind,
}

impl Setting {
    pub fn new(kind: SettingKind) -> Self {
        Self {
            id: None,
            caption: None,
            kind,
        }
    }

    pub fn setting_type(&self) -> SettingType {
        match &self.kind {
            SettingKind::Ipv4(_) => SettingType::Ipv4,
            SettingKind::Ipv6(_) => SettingType::Ipv6,
            SettingKind::Wired(_) => SettingType::Wired,
            SettingKind::Bond(_) => SettingType::Bond,
            SettingKind::Bridge(_) => SettingType::Bridge,
            SettingKind::BridgeSlave(_) => SettingType::BridgeSlave,
        }
    }

    /// IP payload of an IPv4/IPv6 setting
    pub fn ip(&self) -> Option<&IpSetting> {
        match &self.kind {
            SettingKind::Ipv4(ip) | SettingKind::Ipv6(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn ip_mut(&mut self) -> Option<&mut IpSetting> {
        match &mut self.kind {
            SettingKind::Ipv4(ip) | SettingKind::Ipv6(ip) => Some(ip),
            _ => None,
        }
    }

    /// Interface name carried by bond and bridge settings
    pub fn interface_name(&self) -> Option<&str> {
        match &self.kind {
            SettingKind::Bond(bond) => bond.interface_name.as_deref(),
            SettingKind::Bridge(bridge) => bridge.interface_name.as_deref(),
            _ => None,
        }
    }

    pub fn validate(&self) -> NetworkResult<()> {
        match &self.kind {
            SettingKind::Ipv4(ip) => ip.validate(ProtocolType::Ipv4),
            SettingKind::Ipv6(ip) => ip.validate(ProtocolType::Ipv6),
            SettingKind::Wired(wired) => {
                if let Some(mac) = &wired.mac {
                    validate_mac_address(mac)?;
                }
                if let Some(mtu) = wired.mtu {
                    validate_mtu(mtu)?;
                }
                Ok(())
            }
            SettingKind::Bond(bond) => {
                if let Some(name) = &bond.interface_name {
                    validate_interface_name(name)?;
                }
                if bond.arp_interval > 0 && bond.arp_ip_target.is_empty() {
                    return Err(NetworkError::InvalidParameter(
                        "ARP monitoring requires at least one ARP target".to_string(),
                    ));
                }
                Ok(())
            }
            SettingKind::Bridge(bridge) => {
                if let Some(name) = &bridge.interface_name {
                    validate_interface_name(name)?;
                }
                if bridge.stp && !(4..=30).contains(&bridge.forward_delay) {
                    return Err(NetworkError::InvalidParameter(format!(
                        "Forward delay {} out of range (4-30)",
                        bridge.forward_delay
                    )));
                }
                if !(1..=10).contains(&bridge.hello_time) {
                    return Err(NetworkError::InvalidParameter(format!(
                        "Hello time {} out of range (1-10)",
                        bridge.hello_time
                    )));
                }
                if !(6..=40).contains(&bridge.max_age) {
                    return Err(NetworkError::InvalidParameter(format!(
                        "Max age {} out of range (6-40)",
                        bridge.max_age
                    )));
                }
                Ok(())
            }
            SettingKind::BridgeSlave(slave) => {
                if slave.priority > 63 {
                    return Err(NetworkError::InvalidParameter(format!(
                        "Bridge port priority {} out of range (0-63)",
                        slave.priority
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bond_mode_range() {
        assert_eq!(BondMode::try_from(4).unwrap(), BondMode::Ieee8023ad);
        assert!(matches!(
            BondMode::try_from(7),
            Err(NetworkError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_bond_mode_parse() {
        assert_eq!("active-backup".parse::<BondMode>().unwrap(), BondMode::ActiveBackup);
        assert_eq!("6".parse::<BondMode>().unwrap(), BondMode::BalanceAlb);
        assert!("round-robin".parse::<BondMode>().is_err());
        assert_eq!(BondMode::Ieee8023ad.to_string(), "802.3ad");
    }

    #[test]
    fn test_static_ip_requires_address() {
        let setting = Setting::new(SettingKind::Ipv4(IpSetting::new(IpMethod::Static)));
        assert!(setting.validate().is_err());

        let mut ip = IpSetting::new(IpMethod::Static);
        ip.addresses.push(Address::new("10.1.1.1".parse().unwrap(), 24));
        assert!(Setting::new(SettingKind::Ipv4(ip)).validate().is_ok());
    }

    #[test]
    fn test_ip_method_family() {
        let v4 = Setting::new(SettingKind::Ipv4(IpSetting::new(IpMethod::Stateless)));
        assert!(v4.validate().is_err());
        let v6 = Setting::new(SettingKind::Ipv6(IpSetting::new(IpMethod::Dhcp)));
        assert!(v6.validate().is_err());
        let v6 = Setting::new(SettingKind::Ipv6(IpSetting::new(IpMethod::Dhcpv6)));
        assert!(v6.validate().is_ok());
    }

    #[test]
    fn test_dns_family_mismatch_is_wrong_parameter() {
        let mut ip = IpSetting::new(IpMethod::Dhcp);
        ip.dns_servers.push(DnsServer::new("2001:db8::53".parse().unwrap()));
        let setting = Setting::new(SettingKind::Ipv4(ip));
        assert!(matches!(setting.validate(), Err(NetworkError::WrongParameter(_))));
    }

    #[test]
    fn test_bond_arp_requires_targets() {
        let bond = BondSetting {
            arp_interval: 100,
            ..Default::default()
        };
        assert!(Setting::new(SettingKind::Bond(bond)).validate().is_err());
    }

    #[test]
    fn test_bridge_timers() {
        let bridge = BridgeSetting {
            forward_delay: 2,
            ..Default::default()
        };
        assert!(Setting::new(SettingKind::Bridge(bridge)).validate().is_err());

        let bridge = BridgeSetting {
            stp: false,
            forward_delay: 2,
            ..Default::default()
        };
        assert!(Setting::new(SettingKind::Bridge(bridge)).validate().is_ok());
    }

    #[test]
    fn test_interface_name_accessor() {
        let bond = BondSetting {
            interface_name: Some("bond0".to_string()),
            ..Default::default()
        };
        let setting = Setting::new(SettingKind::Bond(bond));
        assert_eq!(setting.interface_name(), Some("bond0"));
        assert_eq!(setting.setting_type(), SettingType::Bond);
        assert!(setting.ip().is_none());
    }
}
