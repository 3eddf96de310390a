//! IP value types shared by settings and ports

use crate::error::{NetworkError, NetworkResult};
use crate::validation::{validate_prefix_len, validate_search_domain};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// IP protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolType {
    Ipv4,
    Ipv6,
}

impl ProtocolType {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => ProtocolType::Ipv4,
            IpAddr::V6(_) => ProtocolType::Ipv6,
        }
    }

    pub fn is_ipv6(self) -> bool {
        self == ProtocolType::Ipv6
    }
}

/// Static address with prefix and optional gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub addr: IpAddr,
    pub prefix: u8,
    pub default_gateway: Option<IpAddr>,
}

impl Address {
    pub fn new(addr: IpAddr, prefix: u8) -> Self {
        Self {
            addr,
            prefix,
            default_gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: IpAddr) -> Self {
        self.default_gateway = Some(gateway);
        self
    }

    pub fn protocol(&self) -> ProtocolType {
        ProtocolType::of(&self.addr)
    }

    pub fn validate(&self, family: ProtocolType) -> NetworkResult<()> {
        if self.protocol() != family {
            return Err(NetworkError::WrongParameter(format!(
                "Address {} does not belong to {:?}",
                self.addr, family
            )));
        }
        validate_prefix_len(self.prefix, family.is_ipv6())?;
        if let Some(gateway) = &self.default_gateway {
            if ProtocolType::of(gateway) != family {
                return Err(NetworkError::WrongParameter(format!(
                    "Gateway {} does not belong to {:?}",
                    gateway, family
                )));
            }
        }
        Ok(())
    }
}

/// Static route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub route: IpAddr,
    pub prefix: u8,
    pub next_hop: Option<IpAddr>,
    pub metric: u32,
}

impl Route {
    pub fn new(route: IpAddr, prefix: u8) -> Self {
        Self {
            route,
            prefix,
            next_hop: None,
            metric: 0,
        }
    }

    pub fn validate(&self, family: ProtocolType) -> NetworkResult<()> {
        if ProtocolType::of(&self.route) != family {
            return Err(NetworkError::WrongParameter(format!(
                "Route {} does not belong to {:?}",
                self.route, family
            )));
        }
        validate_prefix_len(self.prefix, family.is_ipv6())?;
        match &self.next_hop {
            Some(hop) if ProtocolType::of(hop) != family => Err(NetworkError::WrongParameter(
                format!("Next hop {} does not belong to {:?}", hop, family),
            )),
            _ => Ok(()),
        }
    }
}

/// DNS server address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    pub addr: IpAddr,
}

impl DnsServer {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }

    pub fn protocol(&self) -> ProtocolType {
        ProtocolType::of(&self.addr)
    }
}

/// IP configuration actually applied on a port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub dns_servers: Vec<DnsServer>,
    pub search_domains: Vec<String>,
}

impl IpConfig {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.routes.is_empty()
            && self.dns_servers.is_empty()
            && self.search_domains.is_empty()
    }

    /// Addresses of a single family
    pub fn addresses_of(&self, family: ProtocolType) -> impl Iterator<Item = &Address> {
        self.addresses.iter().filter(move |a| a.protocol() == family)
    }

    /// Merge another family's configuration into this one
    pub fn extend(&mut self, other: IpConfig) {
        self.addresses.extend(other.addresses);
        self.routes.extend(other.routes);
        self.dns_servers.extend(other.dns_servers);
        for domain in other.search_domains {
            if !self.search_domains.contains(&domain) {
                self.search_domains.push(domain);
            }
        }
    }
}

pub(crate) fn validate_search_domains(domains: &[String]) -> NetworkResult<()> {
    domains.iter().try_for_each(|d| validate_search_domain(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_address_family_checks() {
        let address = Address::new(ip("192.168.1.10"), 24).with_gateway(ip("192.168.1.1"));
        assert!(address.validate(ProtocolType::Ipv4).is_ok());
        assert!(matches!(
            address.validate(ProtocolType::Ipv6),
            Err(NetworkError::WrongParameter(_))
        ));

        let mixed = Address::new(ip("192.168.1.10"), 24).with_gateway(ip("fe80::1"));
        assert!(mixed.validate(ProtocolType::Ipv4).is_err());

        let wide = Address::new(ip("10.0.0.1"), 40);
        assert!(matches!(
            wide.validate(ProtocolType::Ipv4),
            Err(NetworkError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_route_next_hop_family() {
        let mut route = Route::new(ip("2001:db8::"), 64);
        route.next_hop = Some(ip("fe80::1"));
        assert!(route.validate(ProtocolType::Ipv6).is_ok());

        route.next_hop = Some(ip("10.0.0.1"));
        assert!(route.validate(ProtocolType::Ipv6).is_err());
    }

    #[test]
    fn test_ipconfig_extend_dedups_domains() {
        let mut v4 = IpConfig {
            addresses: vec![Address::new(ip("10.0.0.2"), 8)],
            search_domains: vec!["example.com".to_string()],
            ..Default::default()
        };
        let v6 = IpConfig {
            addresses: vec![Address::new(ip("fd00::2"), 64)],
            search_domains: vec!["example.com".to_string(), "lab.example.com".to_string()],
            ..Default::default()
        };
        v4.extend(v6);

        assert_eq!(v4.addresses.len(), 2);
        assert_eq!(v4.addresses_of(ProtocolType::Ipv6).count(), 1);
        assert_eq!(v4.search_domains, vec!["example.com", "lab.example.com"]);
    }
}
