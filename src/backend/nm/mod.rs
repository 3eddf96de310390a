//! NetworkManager backend
//!
//! Talks to NetworkManager over the system D-Bus with blocking zbus
//! proxies. Backend handles are D-Bus object paths: devices for ports,
//! settings objects for connections and active connection objects.

mod convert;
mod proxies;
mod signals;

use crate::backend::{Activation, Backend, EventSink};
use crate::error::{NetworkError, NetworkResult};
use crate::model::{
    ActiveConnectionInfo, ActiveConnectionStatus, Connection, DnsServer, IpConfig, Port,
    PortRequestedState, PortType,
};
use convert::device_state;
use proxies::{
    ActiveConnectionProxyBlocking, DeviceProxyBlocking, Ip4ConfigProxyBlocking,
    Ip6ConfigProxyBlocking, NetworkManagerProxyBlocking, SettingsConnectionProxyBlocking,
    SettingsProxyBlocking, WiredDeviceProxyBlocking,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use zbus::blocking::Connection as DbusConnection;
use zbus::proxy::CacheProperties;
use zvariant::ObjectPath;

/// Object path NetworkManager uses for "none"
const NO_OBJECT: &str = "/";

/// Reads NetworkManager objects into model entities
#[derive(Clone)]
pub(crate) struct Reader {
    bus: DbusConnection,
}

macro_rules! proxy_at {
    ($proxy:ty, $bus:expr, $path:expr) => {
        <$proxy>::builder($bus)
            .path($path.to_string())?
            .cache_properties(CacheProperties::No)
            .build()
    };
}

impl Reader {
    fn manager(&self) -> NetworkResult<NetworkManagerProxyBlocking<'static>> {
        Ok(NetworkManagerProxyBlocking::builder(&self.bus)
            .cache_properties(CacheProperties::No)
            .build()?)
    }

    fn settings(&self) -> NetworkResult<SettingsProxyBlocking<'static>> {
        Ok(SettingsProxyBlocking::new(&self.bus)?)
    }

    fn profile(&self, path: &str) -> NetworkResult<SettingsConnectionProxyBlocking<'static>> {
        Ok(proxy_at!(SettingsConnectionProxyBlocking<'static>, &self.bus, path)?)
    }

    pub(crate) fn read_port(&self, path: &str) -> NetworkResult<Port> {
        let device = proxy_at!(DeviceProxyBlocking<'static>, &self.bus, path)?;
        let kind = convert::port_type(device.device_type()?);
        let state = device.state()?;

        let mut port = Port::new(path, device.interface()?, kind);
        port.operating_status = convert::operating_status(state);
        port.mac = device.hw_address().ok().filter(|mac| !mac.is_empty());
        port.mtu = device.mtu().ok().filter(|mtu| *mtu != 0);
        port.requested_state = match device.autoconnect() {
            Ok(true) => PortRequestedState::Enabled,
            Ok(false) => PortRequestedState::Disabled,
            Err(_) => PortRequestedState::Unknown,
        };
        if state != device_state::ACTIVATED {
            port.state_reason = device
                .state_reason()
                .ok()
                .and_then(|(_, reason)| convert::state_reason(reason));
        }

        port.carrier = state == device_state::ACTIVATED;
        if kind == PortType::Ethernet {
            let wired = proxy_at!(WiredDeviceProxyBlocking<'static>, &self.bus, path)?;
            port.permmac = wired.perm_hw_address().ok().filter(|mac| !mac.is_empty());
            port.carrier = wired.carrier().unwrap_or(port.carrier);
        }

        port.ipconfig = self.read_ipconfig(&device);
        Ok(port)
    }

    fn read_ipconfig(&self, device: &DeviceProxyBlocking<'_>) -> IpConfig {
        let mut config = IpConfig::default();
        if let Some(path) = device.ip4_config().ok().filter(|p| p.as_str() != NO_OBJECT) {
            match self.read_ip4(path.as_str()) {
                Ok(ip4) => config.extend(ip4),
                Err(e) => debug!("Failed to read {}: {}", path.as_str(), e),
            }
        }
        if let Some(path) = device.ip6_config().ok().filter(|p| p.as_str() != NO_OBJECT) {
            match self.read_ip6(path.as_str()) {
                Ok(ip6) => config.extend(ip6),
                Err(e) => debug!("Failed to read {}: {}", path.as_str(), e),
            }
        }
        config
    }

    fn read_ip4(&self, path: &str) -> NetworkResult<IpConfig> {
        let proxy = proxy_at!(Ip4ConfigProxyBlocking<'static>, &self.bus, path)?;
        let gateway = proxy.gateway().ok().and_then(|g| g.parse::<IpAddr>().ok());
        Ok(IpConfig {
            addresses: convert::addresses_from_records(&proxy.address_data()?, gateway),
            routes: convert::routes_from_records(&proxy.route_data().unwrap_or_default()),
            dns_servers: convert::nameservers_from_records(
                &proxy.nameserver_data().unwrap_or_default(),
            ),
            search_domains: proxy.searches().unwrap_or_default(),
        })
    }

    fn read_ip6(&self, path: &str) -> NetworkResult<IpConfig> {
        let proxy = proxy_at!(Ip6ConfigProxyBlocking<'static>, &self.bus, path)?;
        let gateway = proxy.gateway().ok().and_then(|g| g.parse::<IpAddr>().ok());
        Ok(IpConfig {
            addresses: convert::addresses_from_records(&proxy.address_data()?, gateway),
            routes: convert::routes_from_records(&proxy.route_data().unwrap_or_default()),
            dns_servers: proxy
                .nameservers()
                .unwrap_or_default()
                .iter()
                .filter_map(|bytes| convert::ipv6_from_bytes(bytes))
                .map(|addr| DnsServer::new(IpAddr::V6(addr)))
                .collect(),
            search_domains: proxy.searches().unwrap_or_default(),
        })
    }

    pub(crate) fn read_connection(&self, path: &str) -> NetworkResult<Connection> {
        let settings = self.profile(path)?.get_settings()?;
        convert::connection_from_settings(path, &settings)
    }

    pub(crate) fn read_active(&self, path: &str) -> NetworkResult<ActiveConnectionInfo> {
        let proxy = proxy_at!(ActiveConnectionProxyBlocking<'static>, &self.bus, path)?;
        let mut info = ActiveConnectionInfo::new(path, convert::active_status(proxy.state()?));
        info.connection_uuid = proxy
            .connection()
            .ok()
            .filter(|p| p.as_str() != NO_OBJECT)
            .map(|p| p.as_str().to_string());
        info.port_uuids = proxy
            .devices()
            .unwrap_or_default()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        Ok(info)
    }

    pub(crate) fn list_active(&self) -> NetworkResult<Vec<ActiveConnectionInfo>> {
        let paths = self.manager()?.active_connections()?;
        Ok(paths
            .iter()
            .filter_map(|path| match self.read_active(path.as_str()) {
                Ok(info) => Some(info),
                // Objects disappear while being enumerated
                Err(e) => {
                    debug!("Skipping active connection {}: {}", path.as_str(), e);
                    None
                }
            })
            .collect())
    }
}

/// Backend driving NetworkManager
pub struct NmBackend {
    reader: Reader,
    /// Stop flag of the running signal reader
    listener: Mutex<Option<Arc<AtomicBool>>>,
}

impl NmBackend {
    /// Connects to NetworkManager on the system bus
    pub fn connect() -> NetworkResult<Self> {
        let bus = DbusConnection::system()?;
        info!("Connected to the system bus");
        Ok(Self::with_connection(bus))
    }

    /// Uses an existing bus connection
    pub fn with_connection(bus: DbusConnection) -> Self {
        Self {
            reader: Reader { bus },
            listener: Mutex::new(None),
        }
    }

    fn listener(&self) -> std::sync::MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Backend for NmBackend {
    fn name(&self) -> &'static str {
        "networkmanager"
    }

    fn list_ports(&self) -> NetworkResult<Vec<Port>> {
        let devices = self.reader.manager()?.get_devices()?;
        let mut ports = Vec::with_capacity(devices.len());
        for path in devices {
            match self.reader.read_port(path.as_str()) {
                Ok(port) => ports.push(port),
                Err(e) => warn!("Skipping device {}: {}", path.as_str(), e),
            }
        }
        debug!("Enumerated {} ports", ports.len());
        Ok(ports)
    }

    fn list_connections(&self) -> NetworkResult<Vec<Connection>> {
        let paths = self.reader.settings()?.list_connections()?;
        let mut connections = Vec::with_capacity(paths.len());
        for path in paths {
            match self.reader.read_connection(path.as_str()) {
                Ok(connection) => connections.push(connection),
                Err(e) => warn!("Skipping profile {}: {}", path.as_str(), e),
            }
        }
        debug!("Enumerated {} connections", connections.len());
        Ok(connections)
    }

    fn list_active_connections(&self) -> NetworkResult<Vec<ActiveConnectionInfo>> {
        self.reader.list_active()
    }

    fn create_connection(&self, connection: &Connection) -> NetworkResult<String> {
        let settings = convert::settings_from_connection(connection)?;
        let path = self.reader.settings()?.add_connection(settings)?;
        info!("Created profile {} at {}", connection.id, path.as_str());
        Ok(path.as_str().to_string())
    }

    fn update_connection(&self, uuid: &str, connection: &Connection) -> NetworkResult<()> {
        let settings = convert::settings_from_connection(connection)?;
        self.reader.profile(uuid)?.update(settings)?;
        info!("Updated profile {}", connection.id);
        Ok(())
    }

    fn delete_connection(&self, uuid: &str) -> NetworkResult<()> {
        self.reader.profile(uuid)?.delete()?;
        info!("Deleted profile {}", uuid);
        Ok(())
    }

    fn activate_connection(
        &self,
        connection_uuid: &str,
        port_uuid: Option<String>,
    ) -> NetworkResult<Activation> {
        let connection = ObjectPath::try_from(connection_uuid)
            .map_err(|e| NetworkError::InvalidParameter(e.to_string()))?;
        let device = ObjectPath::try_from(port_uuid.as_deref().unwrap_or(NO_OBJECT))
            .map_err(|e| NetworkError::InvalidParameter(e.to_string()))?;
        let none = ObjectPath::from_static_str_unchecked(NO_OBJECT);

        let active = self
            .reader
            .manager()?
            .activate_connection(&connection, &device, &none)?;
        let active = active.as_str().to_string();
        info!("Activating {} as {}", connection_uuid, active);

        match self.reader.read_active(&active) {
            Ok(info) if info.status == ActiveConnectionStatus::Activated => Ok(Activation::Completed),
            _ => Ok(Activation::Pending {
                active_connection: active,
            }),
        }
    }

    fn subscribe(&self, sink: EventSink) -> NetworkResult<()> {
        let mut listener = self.listener();
        if let Some(previous) = listener.take() {
            previous.store(true, Ordering::SeqCst);
        }
        let stop = Arc::new(AtomicBool::new(false));
        signals::spawn(self.reader.clone(), sink, stop.clone())?;
        *listener = Some(stop);
        Ok(())
    }

    fn unsubscribe(&self) {
        if let Some(stop) = self.listener().take() {
            debug!("Stopping NetworkManager signal reader");
            stop.store(true, Ordering::SeqCst);
        }
    }
}
