//! Translation between NetworkManager data and the entity model

use super::proxies::{OutgoingSettings, StoredSettings};
use crate::error::{NetworkError, NetworkResult};
use crate::model::{
    ActiveConnectionStatus, Address, BondMode, BondSetting, BridgeSetting, BridgeSlaveSetting,
    Connection, ConnectionType, DnsServer, IpMethod, IpSetting, PortOperatingStatus, PortType,
    Route, Setting, SettingKind, SlaveType, WiredSetting,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;
use zvariant::{OwnedValue, Value};

/// NMDeviceType
pub(crate) mod device_type {
    pub const ETHERNET: u32 = 1;
    pub const WIFI: u32 = 2;
    pub const BOND: u32 = 10;
    pub const BRIDGE: u32 = 13;
    pub const LOOPBACK: u32 = 32;
}

/// NMDeviceState
pub(crate) mod device_state {
    pub const UNKNOWN: u32 = 0;
    pub const UNMANAGED: u32 = 10;
    pub const UNAVAILABLE: u32 = 20;
    pub const DISCONNECTED: u32 = 30;
    pub const PREPARE: u32 = 40;
    pub const SECONDARIES: u32 = 90;
    pub const ACTIVATED: u32 = 100;
    pub const DEACTIVATING: u32 = 110;
    pub const FAILED: u32 = 120;
}

/// NMActiveConnectionState
pub(crate) mod active_state {
    pub const ACTIVATING: u32 = 1;
    pub const ACTIVATED: u32 = 2;
    pub const DEACTIVATING: u32 = 3;
    pub const DEACTIVATED: u32 = 4;
}

const SECTION_CONNECTION: &str = "connection";
const SECTION_WIRED: &str = "802-3-ethernet";
const SECTION_BOND: &str = "bond";
const SECTION_BRIDGE: &str = "bridge";
const SECTION_BRIDGE_PORT: &str = "bridge-port";
const SECTION_IPV4: &str = "ipv4";
const SECTION_IPV6: &str = "ipv6";

pub(crate) fn port_type(device_type: u32) -> PortType {
    match device_type {
        device_type::ETHERNET => PortType::Ethernet,
        device_type::WIFI => PortType::Wifi,
        device_type::BOND => PortType::Bond,
        device_type::BRIDGE => PortType::Bridge,
        device_type::LOOPBACK => PortType::Loopback,
        _ => PortType::Unknown,
    }
}

pub(crate) fn operating_status(state: u32) -> PortOperatingStatus {
    match state {
        device_state::UNKNOWN => PortOperatingStatus::Unknown,
        device_state::UNMANAGED | device_state::UNAVAILABLE => PortOperatingStatus::NotAvailable,
        device_state::DISCONNECTED => PortOperatingStatus::Dormant,
        device_state::PREPARE..=device_state::SECONDARIES => PortOperatingStatus::Starting,
        device_state::ACTIVATED => PortOperatingStatus::InService,
        device_state::DEACTIVATING => PortOperatingStatus::Stopping,
        device_state::FAILED => PortOperatingStatus::Stopped,
        _ => PortOperatingStatus::Unknown,
    }
}

pub(crate) fn active_status(state: u32) -> ActiveConnectionStatus {
    match state {
        active_state::ACTIVATING => ActiveConnectionStatus::Activating,
        active_state::ACTIVATED => ActiveConnectionStatus::Activated,
        active_state::DEACTIVATING => ActiveConnectionStatus::Deactivating,
        active_state::DEACTIVATED => ActiveConnectionStatus::Deactivated,
        _ => ActiveConnectionStatus::Unknown,
    }
}

/// Human readable NMDeviceStateReason, `None` when no reason was given
pub(crate) fn state_reason(reason: u32) -> Option<String> {
    let text = match reason {
        0 => return None,
        1 => "Unknown error",
        2 => "Device is now managed",
        3 => "Device is now unmanaged",
        4 => "Device could not be readied for configuration",
        5 => "IP configuration could not be reserved",
        6 => "IP configuration is no longer valid",
        15 => "DHCP client failed to start",
        16 => "DHCP client error",
        17 => "DHCP client failed",
        36 => "Device was removed",
        37 => "System is going to sleep",
        38 => "Connection was removed",
        39 => "Disconnected by user",
        40 => "Carrier lost",
        41 => "Existing connection assumed",
        50 => "Dependency failed",
        other => return Some(format!("Device state reason {}", other)),
    };
    Some(text.to_string())
}

pub(crate) fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub(crate) fn parse_mac(mac: &str) -> NetworkResult<Vec<u8>> {
    crate::validation::validate_mac_address(mac)?;
    mac.split(':')
        .map(|octet| {
            u8::from_str_radix(octet, 16)
                .map_err(|_| NetworkError::InvalidParameter(format!("Invalid MAC address: {}", mac)))
        })
        .collect()
}

// ---- reading ----

fn strip<'v>(value: &'v Value<'static>) -> &'v Value<'static> {
    match value {
        Value::Value(inner) => strip(inner),
        other => other,
    }
}

/// Decodes a dictionary entry into `T`, `None` when absent or mistyped
fn decode<T>(section: &HashMap<String, OwnedValue>, key: &str) -> Option<T>
where
    T: TryFrom<Value<'static>>,
{
    let value = section.get(key)?;
    strip(value)
        .try_clone()
        .ok()
        .and_then(|value| T::try_from(value).ok())
}

fn decode_ip(section: &HashMap<String, OwnedValue>, key: &str) -> Option<IpAddr> {
    decode::<String>(section, key).and_then(|text| text.parse().ok())
}

/// Reads NetworkManager `address-data` records
pub(crate) fn addresses_from_records(
    records: &[HashMap<String, OwnedValue>],
    gateway: Option<IpAddr>,
) -> Vec<Address> {
    let mut addresses: Vec<Address> = records
        .iter()
        .filter_map(|record| {
            let addr = decode_ip(record, "address")?;
            let prefix = decode::<u32>(record, "prefix")?;
            Some(Address::new(addr, u8::try_from(prefix).ok()?))
        })
        .collect();
    if let (Some(gateway), Some(first)) = (gateway, addresses.first_mut()) {
        first.default_gateway = Some(gateway);
    }
    addresses
}

/// Reads NetworkManager `route-data` records
pub(crate) fn routes_from_records(records: &[HashMap<String, OwnedValue>]) -> Vec<Route> {
    records
        .iter()
        .filter_map(|record| {
            let dest = decode_ip(record, "dest")?;
            let prefix = u8::try_from(decode::<u32>(record, "prefix")?).ok()?;
            let mut route = Route::new(dest, prefix);
            route.next_hop = decode_ip(record, "next-hop");
            route.metric = decode::<u32>(record, "metric").unwrap_or(0);
            Some(route)
        })
        .collect()
}

/// Reads IPv4 `nameserver-data` records
pub(crate) fn nameservers_from_records(records: &[HashMap<String, OwnedValue>]) -> Vec<DnsServer> {
    records
        .iter()
        .filter_map(|record| decode_ip(record, "address"))
        .map(DnsServer::new)
        .collect()
}

pub(crate) fn ipv6_from_bytes(bytes: &[u8]) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = bytes.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}

fn ip_method(text: &str, ipv6: bool) -> IpMethod {
    match (text, ipv6) {
        ("manual", _) => IpMethod::Static,
        ("disabled", _) | ("ignore", true) => IpMethod::Disabled,
        ("link-local", _) => IpMethod::LinkLocal,
        ("auto", false) => IpMethod::Dhcp,
        ("auto", true) => IpMethod::Stateless,
        ("dhcp", true) => IpMethod::Dhcpv6,
        _ => IpMethod::Unknown,
    }
}

fn ip_setting_from(section: &HashMap<String, OwnedValue>, ipv6: bool) -> IpSetting {
    let method = decode::<String>(section, "method")
        .map(|text| ip_method(&text, ipv6))
        .unwrap_or(IpMethod::Unknown);
    let mut setting = IpSetting::new(method);

    let gateway = decode_ip(section, "gateway");
    let records = decode::<Vec<HashMap<String, OwnedValue>>>(section, "address-data")
        .unwrap_or_default();
    setting.addresses = addresses_from_records(&records, gateway);

    let routes = decode::<Vec<HashMap<String, OwnedValue>>>(section, "route-data")
        .unwrap_or_default();
    setting.routes = routes_from_records(&routes);

    setting.dns_servers = if ipv6 {
        decode::<Vec<Vec<u8>>>(section, "dns")
            .unwrap_or_default()
            .iter()
            .filter_map(|bytes| ipv6_from_bytes(bytes))
            .map(|addr| DnsServer::new(IpAddr::V6(addr)))
            .collect()
    } else {
        // Network byte order packed into host integers
        decode::<Vec<u32>>(section, "dns")
            .unwrap_or_default()
            .into_iter()
            .map(|raw| DnsServer::new(IpAddr::V4(Ipv4Addr::from(raw.to_ne_bytes()))))
            .collect()
    };
    setting.search_domains = decode::<Vec<String>>(section, "dns-search").unwrap_or_default();
    if !ipv6 {
        setting.clientid = decode::<String>(section, "dhcp-client-id");
    }
    setting
}

fn bond_from(section: &HashMap<String, OwnedValue>, interface_name: Option<String>) -> BondSetting {
    let options = decode::<HashMap<String, String>>(section, "options").unwrap_or_default();
    let number = |key: &str| options.get(key).and_then(|v| v.parse::<u32>().ok());
    let defaults = BondSetting::default();

    BondSetting {
        interface_name,
        mode: options
            .get("mode")
            .and_then(|mode| mode.parse::<BondMode>().ok())
            .unwrap_or(defaults.mode),
        miimon: number("miimon").unwrap_or(defaults.miimon),
        downdelay: number("downdelay").unwrap_or(defaults.downdelay),
        updelay: number("updelay").unwrap_or(defaults.updelay),
        arp_interval: number("arp_interval").unwrap_or(defaults.arp_interval),
        arp_ip_target: options
            .get("arp_ip_target")
            .map(|targets| {
                targets
                    .split(',')
                    .filter_map(|t| t.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn bridge_from(section: &HashMap<String, OwnedValue>, interface_name: Option<String>) -> BridgeSetting {
    let defaults = BridgeSetting::default();
    BridgeSetting {
        interface_name,
        stp: decode(section, "stp").unwrap_or(defaults.stp),
        priority: decode::<u32>(section, "priority")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(defaults.priority),
        forward_delay: decode(section, "forward-delay").unwrap_or(defaults.forward_delay),
        hello_time: decode(section, "hello-time").unwrap_or(defaults.hello_time),
        max_age: decode(section, "max-age").unwrap_or(defaults.max_age),
        ageing_time: decode(section, "ageing-time").unwrap_or(defaults.ageing_time),
    }
}

fn bridge_port_from(section: &HashMap<String, OwnedValue>) -> BridgeSlaveSetting {
    let defaults = BridgeSlaveSetting::default();
    BridgeSlaveSetting {
        priority: decode::<u32>(section, "priority")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(defaults.priority),
        path_cost: decode(section, "path-cost").unwrap_or(defaults.path_cost),
        hairpin_mode: decode(section, "hairpin-mode").unwrap_or(defaults.hairpin_mode),
    }
}

fn connection_type(text: &str) -> ConnectionType {
    match text {
        SECTION_WIRED => ConnectionType::Ethernet,
        SECTION_BOND => ConnectionType::Bond,
        SECTION_BRIDGE => ConnectionType::Bridge,
        _ => ConnectionType::Unknown,
    }
}

/// Builds a connection from the dictionary `GetSettings` returned for `path`
pub(crate) fn connection_from_settings(
    path: &str,
    settings: &StoredSettings,
) -> NetworkResult<Connection> {
    let general = settings.get(SECTION_CONNECTION).ok_or_else(|| {
        NetworkError::Backend(format!("Profile {} has no connection section", path))
    })?;
    let id = decode::<String>(general, "uuid")
        .ok_or_else(|| NetworkError::Backend(format!("Profile {} has no uuid", path)))?;
    let name = decode::<String>(general, "id").unwrap_or_else(|| id.clone());
    let kind = decode::<String>(general, "type")
        .map(|text| connection_type(&text))
        .unwrap_or(ConnectionType::Unknown);

    let mut connection = Connection::new(id, name, kind);
    connection.uuid = Some(path.to_string());
    connection.autoconnect = decode(general, "autoconnect").unwrap_or(true);
    connection.master_id = decode(general, "master");
    connection.slave_type = match decode::<String>(general, "slave-type").as_deref() {
        Some(SECTION_BOND) => Some(SlaveType::Bond),
        Some(SECTION_BRIDGE) => Some(SlaveType::Bridge),
        _ => None,
    };

    let interface_name = decode::<String>(general, "interface-name").filter(|n| !n.is_empty());
    if !connection.is_master() {
        connection.interface_name = interface_name.clone();
    }

    if let Some(section) = settings.get(SECTION_WIRED) {
        let mac = decode::<Vec<u8>>(section, "mac-address")
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| format_mac(&bytes));
        let mtu = decode::<u32>(section, "mtu").filter(|mtu| *mtu != 0);
        connection.mac = mac.clone();
        connection.add_setting(Setting::new(SettingKind::Wired(WiredSetting { mac, mtu })));
    }
    if let Some(section) = settings.get(SECTION_BOND) {
        let bond = bond_from(section, interface_name.clone());
        connection.add_setting(Setting::new(SettingKind::Bond(bond)));
    }
    if let Some(section) = settings.get(SECTION_BRIDGE) {
        let bridge = bridge_from(section, interface_name.clone());
        connection.add_setting(Setting::new(SettingKind::Bridge(bridge)));
    }
    if let Some(section) = settings.get(SECTION_BRIDGE_PORT) {
        connection.add_setting(Setting::new(SettingKind::BridgeSlave(bridge_port_from(section))));
    }
    if let Some(section) = settings.get(SECTION_IPV4) {
        connection.add_setting(Setting::new(SettingKind::Ipv4(ip_setting_from(section, false))));
    }
    if let Some(section) = settings.get(SECTION_IPV6) {
        connection.add_setting(Setting::new(SettingKind::Ipv6(ip_setting_from(section, true))));
    }

    debug!(
        "Read profile {} ({}) with {} settings",
        connection.id,
        connection.kind,
        connection.settings.len()
    );
    Ok(connection)
}

// ---- writing ----

type Section = HashMap<String, Value<'static>>;

fn put(section: &mut Section, key: &str, value: impl Into<Value<'static>>) {
    section.insert(key.to_string(), value.into());
}

fn method_name(method: IpMethod, ipv6: bool) -> &'static str {
    match (method, ipv6) {
        (IpMethod::Static, _) => "manual",
        (IpMethod::Disabled, false) => "disabled",
        (IpMethod::Disabled, true) => "ignore",
        (IpMethod::LinkLocal, _) => "link-local",
        (IpMethod::Dhcpv6, true) | (IpMethod::Dhcp, true) => "dhcp",
        _ => "auto",
    }
}

fn ip_section(setting: &IpSetting, ipv6: bool) -> Section {
    let mut section = Section::new();
    put(&mut section, "method", method_name(setting.method, ipv6).to_string());

    let records: Vec<HashMap<String, Value<'static>>> = setting
        .addresses
        .iter()
        .map(|address| {
            let mut record = HashMap::new();
            put(&mut record, "address", address.addr.to_string());
            put(&mut record, "prefix", u32::from(address.prefix));
            record
        })
        .collect();
    if !records.is_empty() {
        put(&mut section, "address-data", records);
    }
    if let Some(gateway) = setting.addresses.iter().find_map(|a| a.default_gateway) {
        put(&mut section, "gateway", gateway.to_string());
    }

    let routes: Vec<HashMap<String, Value<'static>>> = setting
        .routes
        .iter()
        .map(|route| {
            let mut record = HashMap::new();
            put(&mut record, "dest", route.route.to_string());
            put(&mut record, "prefix", u32::from(route.prefix));
            if let Some(next_hop) = route.next_hop {
                put(&mut record, "next-hop", next_hop.to_string());
            }
            if route.metric != 0 {
                put(&mut record, "metric", route.metric);
            }
            record
        })
        .collect();
    if !routes.is_empty() {
        put(&mut section, "route-data", routes);
    }

    if ipv6 {
        let servers: Vec<Vec<u8>> = setting
            .dns_servers
            .iter()
            .filter_map(|server| match server.addr {
                IpAddr::V6(addr) => Some(addr.octets().to_vec()),
                IpAddr::V4(_) => None,
            })
            .collect();
        if !servers.is_empty() {
            put(&mut section, "dns", servers);
        }
    } else {
        let servers: Vec<u32> = setting
            .dns_servers
            .iter()
            .filter_map(|server| match server.addr {
                IpAddr::V4(addr) => Some(u32::from_ne_bytes(addr.octets())),
                IpAddr::V6(_) => None,
            })
            .collect();
        if !servers.is_empty() {
            put(&mut section, "dns", servers);
        }
        if let Some(clientid) = &setting.clientid {
            put(&mut section, "dhcp-client-id", clientid.clone());
        }
    }
    if !setting.search_domains.is_empty() {
        put(&mut section, "dns-search", setting.search_domains.clone());
    }
    section
}

fn bond_section(bond: &BondSetting) -> Section {
    let mut options: HashMap<String, String> = HashMap::new();
    options.insert("mode".to_string(), bond.mode.as_str().to_string());
    options.insert("miimon".to_string(), bond.miimon.to_string());
    options.insert("downdelay".to_string(), bond.downdelay.to_string());
    options.insert("updelay".to_string(), bond.updelay.to_string());
    if bond.arp_interval != 0 {
        options.insert("arp_interval".to_string(), bond.arp_interval.to_string());
    }
    if !bond.arp_ip_target.is_empty() {
        let targets: Vec<String> = bond.arp_ip_target.iter().map(IpAddr::to_string).collect();
        options.insert("arp_ip_target".to_string(), targets.join(","));
    }

    let mut section = Section::new();
    put(&mut section, "options", options);
    section
}

fn bridge_section(bridge: &BridgeSetting) -> Section {
    let mut section = Section::new();
    put(&mut section, "stp", bridge.stp);
    put(&mut section, "priority", u32::from(bridge.priority));
    put(&mut section, "forward-delay", bridge.forward_delay);
    put(&mut section, "hello-time", bridge.hello_time);
    put(&mut section, "max-age", bridge.max_age);
    put(&mut section, "ageing-time", bridge.ageing_time);
    section
}

fn bridge_port_section(port: &BridgeSlaveSetting) -> Section {
    let mut section = Section::new();
    put(&mut section, "priority", u32::from(port.priority));
    put(&mut section, "path-cost", port.path_cost);
    put(&mut section, "hairpin-mode", port.hairpin_mode);
    section
}

fn type_name(kind: ConnectionType) -> NetworkResult<&'static str> {
    match kind {
        ConnectionType::Ethernet => Ok(SECTION_WIRED),
        ConnectionType::Bond => Ok(SECTION_BOND),
        ConnectionType::Bridge => Ok(SECTION_BRIDGE),
        ConnectionType::Unknown => Err(NetworkError::InvalidParameter(
            "Connection type is unknown".to_string(),
        )),
    }
}

/// Builds the dictionary handed to `AddConnection` and `Update`
pub(crate) fn settings_from_connection(connection: &Connection) -> NetworkResult<OutgoingSettings> {
    let mut settings = OutgoingSettings::new();

    let mut general = Section::new();
    put(&mut general, "uuid", connection.id.clone());
    put(&mut general, "id", connection.name.clone());
    put(&mut general, "type", type_name(connection.kind)?.to_string());
    put(&mut general, "autoconnect", connection.autoconnect);

    let interface_name = if connection.is_master() {
        connection.master_interface_name().map(str::to_string)
    } else {
        connection.interface_name.clone().or_else(|| connection.port.clone())
    };
    if let Some(name) = interface_name {
        put(&mut general, "interface-name", name);
    }
    if let Some(master) = &connection.master_id {
        put(&mut general, "master", master.clone());
    }
    match connection.slave_type {
        Some(SlaveType::Bond) => put(&mut general, "slave-type", SECTION_BOND.to_string()),
        Some(SlaveType::Bridge) => put(&mut general, "slave-type", SECTION_BRIDGE.to_string()),
        None => {}
    }
    settings.insert(SECTION_CONNECTION.to_string(), general);

    let mut wired: Option<Section> = None;
    for setting in &connection.settings {
        match &setting.kind {
            SettingKind::Wired(w) => {
                let section = wired.get_or_insert_with(Section::new);
                if let Some(mac) = &w.mac {
                    put(section, "mac-address", parse_mac(mac)?);
                }
                if let Some(mtu) = w.mtu {
                    put(section, "mtu", mtu);
                }
            }
            SettingKind::Ipv4(ip) => {
                settings.insert(SECTION_IPV4.to_string(), ip_section(ip, false));
            }
            SettingKind::Ipv6(ip) => {
                settings.insert(SECTION_IPV6.to_string(), ip_section(ip, true));
            }
            SettingKind::Bond(bond) => {
                settings.insert(SECTION_BOND.to_string(), bond_section(bond));
            }
            SettingKind::Bridge(bridge) => {
                settings.insert(SECTION_BRIDGE.to_string(), bridge_section(bridge));
            }
            SettingKind::BridgeSlave(port) => {
                settings.insert(SECTION_BRIDGE_PORT.to_string(), bridge_port_section(port));
            }
        }
    }

    if connection.kind == ConnectionType::Ethernet {
        let section = wired.get_or_insert_with(Section::new);
        if let (Some(mac), false) = (&connection.mac, section.contains_key("mac-address")) {
            put(section, "mac-address", parse_mac(mac)?);
        }
    }
    if let Some(section) = wired {
        settings.insert(SECTION_WIRED.to_string(), section);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(value: Value<'static>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    fn section(entries: Vec<(&str, Value<'static>)>) -> HashMap<String, OwnedValue> {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), owned(value)))
            .collect()
    }

    /// Turns an outgoing dictionary into what `GetSettings` would return
    fn stored(settings: OutgoingSettings) -> StoredSettings {
        settings
            .into_iter()
            .map(|(name, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(key, value)| (key, owned(value)))
                    .collect();
                (name, entries)
            })
            .collect()
    }

    #[test]
    fn test_device_state_mapping() {
        assert_eq!(operating_status(device_state::ACTIVATED), PortOperatingStatus::InService);
        assert_eq!(operating_status(device_state::DISCONNECTED), PortOperatingStatus::Dormant);
        assert_eq!(operating_status(70), PortOperatingStatus::Starting);
        assert_eq!(operating_status(device_state::UNMANAGED), PortOperatingStatus::NotAvailable);
        assert_eq!(operating_status(device_state::FAILED), PortOperatingStatus::Stopped);
        assert_eq!(operating_status(7), PortOperatingStatus::Unknown);
        assert_eq!(port_type(device_type::BOND), PortType::Bond);
        assert_eq!(port_type(99), PortType::Unknown);
    }

    #[test]
    fn test_active_state_mapping() {
        assert_eq!(active_status(1), ActiveConnectionStatus::Activating);
        assert_eq!(active_status(2), ActiveConnectionStatus::Activated);
        assert_eq!(active_status(4), ActiveConnectionStatus::Deactivated);
        assert_eq!(active_status(0), ActiveConnectionStatus::Unknown);
    }

    #[test]
    fn test_state_reasons() {
        assert_eq!(state_reason(0), None);
        assert_eq!(state_reason(40).as_deref(), Some("Carrier lost"));
        assert_eq!(state_reason(999).as_deref(), Some("Device state reason 999"));
    }

    #[test]
    fn test_mac_conversion() {
        assert_eq!(format_mac(&[0, 0x1b, 0x21, 0xaa, 0xbb, 0x0c]), "00:1B:21:AA:BB:0C");
        assert_eq!(
            parse_mac("00:1b:21:aa:bb:0c").unwrap(),
            vec![0, 0x1b, 0x21, 0xaa, 0xbb, 0x0c]
        );
        assert!(parse_mac("00:1b:21").is_err());
    }

    #[test]
    fn test_reads_ethernet_profile() {
        let mut settings = StoredSettings::new();
        settings.insert(
            "connection".to_string(),
            section(vec![
                ("uuid", Value::from("5d1b0c9e-1111-2222-3333-444455556666")),
                ("id", Value::from("Wired 1")),
                ("type", Value::from("802-3-ethernet")),
                ("interface-name", Value::from("eth0")),
            ]),
        );
        settings.insert(
            "802-3-ethernet".to_string(),
            section(vec![("mac-address", Value::from(vec![0u8, 1, 2, 3, 4, 5]))]),
        );
        settings.insert(
            "ipv4".to_string(),
            section(vec![
                ("method", Value::from("manual")),
                ("dns", Value::from(vec![u32::from_ne_bytes([192, 168, 1, 53])])),
                ("dns-search", Value::from(vec!["example.com".to_string()])),
            ]),
        );

        let connection = connection_from_settings("/settings/3", &settings).unwrap();
        assert_eq!(connection.id, "5d1b0c9e-1111-2222-3333-444455556666");
        assert_eq!(connection.name, "Wired 1");
        assert_eq!(connection.uuid.as_deref(), Some("/settings/3"));
        assert_eq!(connection.kind, ConnectionType::Ethernet);
        assert!(connection.autoconnect);
        assert_eq!(connection.interface_name.as_deref(), Some("eth0"));
        assert_eq!(connection.mac.as_deref(), Some("00:01:02:03:04:05"));

        let ip = connection
            .settings
            .iter()
            .find_map(|s| match &s.kind {
                SettingKind::Ipv4(ip) => Some(ip),
                _ => None,
            })
            .unwrap();
        assert_eq!(ip.method, IpMethod::Static);
        assert_eq!(ip.dns_servers, vec![DnsServer::new("192.168.1.53".parse().unwrap())]);
        assert_eq!(ip.search_domains, vec!["example.com"]);
    }

    #[test]
    fn test_profile_without_uuid_is_rejected() {
        let mut settings = StoredSettings::new();
        settings.insert("connection".to_string(), section(vec![("id", Value::from("x"))]));
        assert!(connection_from_settings("/settings/1", &settings).is_err());
        assert!(connection_from_settings("/settings/1", &StoredSettings::new()).is_err());
    }

    #[test]
    fn test_bond_master_survives_a_write_read_cycle() {
        let bond = BondSetting {
            interface_name: Some("bond0".to_string()),
            mode: BondMode::ActiveBackup,
            arp_ip_target: vec!["10.0.0.1".parse().unwrap()],
            ..Default::default()
        };
        let mut ip = IpSetting::new(IpMethod::Static);
        ip.addresses
            .push(Address::new("10.0.0.5".parse().unwrap(), 24).with_gateway("10.0.0.1".parse().unwrap()));
        let connection = Connection::new("b1", "Bond", ConnectionType::Bond)
            .with_setting(SettingKind::Bond(bond.clone()))
            .with_setting(SettingKind::Ipv4(ip));

        let written = settings_from_connection(&connection).unwrap();
        assert!(written.contains_key("bond"));
        assert!(!written.contains_key("802-3-ethernet"));

        let read = connection_from_settings("/settings/9", &stored(written)).unwrap();
        assert_eq!(read.id, "b1");
        assert!(read.is_master());
        assert_eq!(read.master_interface_name(), Some("bond0"));
        assert_eq!(read.interface_name, None);
        match &read.settings[0].kind {
            SettingKind::Bond(read_bond) => assert_eq!(read_bond, &bond),
            other => panic!("unexpected setting {:?}", other),
        }
    }

    #[test]
    fn test_slave_profile_carries_master_reference() {
        let mut slave = Connection::new("s1", "Port 1", ConnectionType::Ethernet).with_port("eth1");
        slave.master_id = Some("br1".to_string());
        slave.slave_type = Some(SlaveType::Bridge);
        slave.mac = Some("00:11:22:33:44:55".to_string());
        let slave = slave.with_setting(SettingKind::BridgeSlave(BridgeSlaveSetting::default()));

        let read = connection_from_settings("/settings/2", &stored(
            settings_from_connection(&slave).unwrap(),
        ))
        .unwrap();
        assert_eq!(read.master_id.as_deref(), Some("br1"));
        assert_eq!(read.slave_type, Some(SlaveType::Bridge));
        assert_eq!(read.interface_name.as_deref(), Some("eth1"));
        assert_eq!(read.mac.as_deref(), Some("00:11:22:33:44:55"));
    }

    #[test]
    fn test_unknown_type_cannot_be_written() {
        let connection = Connection::new("u1", "Mystery", ConnectionType::Unknown);
        assert!(matches!(
            settings_from_connection(&connection),
            Err(NetworkError::InvalidParameter(_))
        ));
    }
}
