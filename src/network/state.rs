//! Entity graph and every operation performed under the network lock

use super::listeners::{BoxedChangeListener, EntityListener, Listeners};
use crate::backend::{Activation, Backend, BackendEvent};
use crate::config::JobSettings;
use crate::error::{NetworkError, NetworkResult};
use crate::model::{
    ActiveConnection, ActiveConnectionInfo, AffectedElement, BondSetting, BridgeSetting,
    Connection, ConnectionType, Job, JobState, JobType, Port, PortRequestedState, Setting,
    SettingKind, SettingType, SlaveType,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful outcome of `NetworkState::activate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationResult {
    /// The backend applied the connection synchronously
    Completed,
    /// Activation continues; progress is tracked by the job with this id
    JobStarted(u64),
}

/// Network entity graph
///
/// Only reachable through `Network::lock`, so every read and every mutation
/// happens with the network lock held. Connections are never changed in
/// place by callers: updates go to the backend and come back as events.
pub struct NetworkState {
    backend: Arc<dyn Backend>,
    pub(super) job_settings: JobSettings,
    ports: Vec<Port>,
    connections: Vec<Connection>,
    active_connections: Vec<ActiveConnection>,
    pub(super) jobs: Vec<Job>,
    connection_listeners: Listeners<Connection>,
    port_listeners: Listeners<Port>,
    pub(super) job_listeners: Listeners<Job>,
}

impl NetworkState {
    pub(crate) fn new(backend: Arc<dyn Backend>, job_settings: JobSettings) -> Self {
        Self {
            backend,
            job_settings,
            ports: Vec::new(),
            connections: Vec::new(),
            active_connections: Vec::new(),
            jobs: Vec::new(),
            connection_listeners: Listeners::new(),
            port_listeners: Listeners::new(),
            job_listeners: Listeners::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // ==================== Accessors ====================

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == id)
    }

    pub fn port_by_uuid(&self, uuid: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.uuid == uuid)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn connection_by_uuid(&self, uuid: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.uuid.as_deref() == Some(uuid))
    }

    pub fn active_connections(&self) -> &[ActiveConnection] {
        &self.active_connections
    }

    pub fn active_connection(&self, id: &str) -> Option<&ActiveConnection> {
        self.active_connections.iter().find(|a| a.uuid == id)
    }

    /// Slaves enslaved to the connection `master_id`
    pub fn slaves_of<'a>(&'a self, master_id: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| c.master_id.as_deref() == Some(master_id))
    }

    /// Id of the port a connection applies to
    ///
    /// Slaves follow their master's interface, masters their own. Other
    /// connections use the pinned port, the bound interface name, or the
    /// port owning the bound hardware address, in that order.
    pub fn resolved_port(&self, connection: &Connection) -> Option<String> {
        if let Some(master_id) = &connection.master_id {
            return self
                .connection(master_id)
                .and_then(Connection::master_interface_name)
                .map(str::to_string);
        }
        if connection.is_master() {
            return connection.master_interface_name().map(str::to_string);
        }
        self.own_port(connection)
    }

    /// Port a connection is bound to by itself, ignoring any master
    pub fn own_port(&self, connection: &Connection) -> Option<String> {
        if let Some(port) = &connection.port {
            return Some(port.clone());
        }
        if let Some(name) = &connection.interface_name {
            return Some(name.clone());
        }
        connection
            .mac
            .as_deref()
            .and_then(|mac| self.ports.iter().find(|p| p.matches_mac(mac)))
            .map(|p| p.id.clone())
    }

    /// Connections that apply to the port `port_id`
    pub fn connections_on_port<'a>(
        &'a self,
        port_id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| self.resolved_port(c).as_deref() == Some(port_id))
    }

    /// Connection activated by `activate_default` on `port_id`
    pub fn default_connection(&self, port_id: &str) -> Option<&Connection> {
        let candidates: Vec<&Connection> = self
            .connections
            .iter()
            .filter(|c| self.resolved_port(c).as_deref() == Some(port_id))
            .collect();
        candidates
            .iter()
            .find(|c| c.autoconnect)
            .or(candidates.first())
            .copied()
    }

    // ==================== Listeners ====================

    pub fn set_connection_added_listener(&mut self, listener: Option<EntityListener<Connection>>) {
        self.connection_listeners.set_added(listener);
    }

    pub fn set_connection_changed_listener(
        &mut self,
        listener: Option<BoxedChangeListener<Connection>>,
    ) {
        self.connection_listeners.set_changed(listener);
    }

    pub fn set_connection_deleted_listener(
        &mut self,
        listener: Option<EntityListener<Connection>>,
    ) {
        self.connection_listeners.set_deleted(listener);
    }

    pub fn set_port_added_listener(&mut self, listener: Option<EntityListener<Port>>) {
        self.port_listeners.set_added(listener);
    }

    pub fn set_port_changed_listener(&mut self, listener: Option<BoxedChangeListener<Port>>) {
        self.port_listeners.set_changed(listener);
    }

    pub fn set_port_deleted_listener(&mut self, listener: Option<EntityListener<Port>>) {
        self.port_listeners.set_deleted(listener);
    }

    pub fn set_job_added_listener(&mut self, listener: Option<EntityListener<Job>>) {
        self.job_listeners.set_added(listener);
    }

    pub fn set_job_changed_listener(&mut self, listener: Option<BoxedChangeListener<Job>>) {
        self.job_listeners.set_changed(listener);
    }

    pub fn set_job_deleted_listener(&mut self, listener: Option<EntityListener<Job>>) {
        self.job_listeners.set_deleted(listener);
    }

    // ==================== Connection operations ====================

    /// Stores a new connection profile and returns its backend handle
    ///
    /// The connection shows up in `connections()` once the backend reports
    /// it.
    pub fn create_connection(&self, draft: Connection) -> NetworkResult<String> {
        if self.connection(&draft.id).is_some() {
            return Err(NetworkError::InvalidParameter(format!(
                "Connection {} already exists",
                draft.id
            )));
        }
        let connection = self.prepare(draft)?;

        info!("Creating connection {} ({})", connection.id, connection.name);
        let uuid = self.backend.create_connection(&connection)?;
        debug!("Connection {} stored as {}", connection.id, uuid);
        Ok(uuid)
    }

    /// Replaces the stored profile of `old_id` with `new`
    ///
    /// The live connection keeps its current values until the backend
    /// reports the update.
    pub fn update_connection(&self, old_id: &str, new: Connection) -> NetworkResult<()> {
        let old = self
            .connection(old_id)
            .ok_or_else(|| NetworkError::ConnectionUnknown(old_id.to_string()))?;
        let uuid = stored_handle(old)?;
        if new.id != old.id {
            return Err(NetworkError::InvalidParameter(format!(
                "Connection id cannot change from {} to {}",
                old.id, new.id
            )));
        }
        if new.master_id.as_deref() == Some(old_id) {
            return Err(NetworkError::InvalidParameter(format!(
                "Connection {} cannot be its own master",
                old_id
            )));
        }
        let new = self.prepare(new)?;

        info!("Updating connection {} ({})", new.id, new.name);
        self.backend.update_connection(uuid, &new)
    }

    /// Deletes a connection, slaves first
    ///
    /// Stops at the first failure; slaves deleted before it stay deleted.
    pub fn delete_connection(&self, id: &str) -> NetworkResult<()> {
        let connection = self
            .connection(id)
            .ok_or_else(|| NetworkError::ConnectionUnknown(id.to_string()))?;

        for slave in self.slaves_of(id) {
            debug!("Deleting slave {} of {}", slave.id, id);
            self.delete_stored(slave)?;
        }
        self.delete_stored(connection)
    }

    /// Enables or disables autoconnect of `connection_id` on `port_id`
    ///
    /// Enabling turns autoconnect off on every other connection that applies
    /// to the same port or to no port at all. Each change is a separate
    /// update; a failure stops the scan and keeps earlier changes.
    pub fn set_autoconnect(
        &self,
        port_id: &str,
        connection_id: &str,
        enable: bool,
    ) -> NetworkResult<()> {
        if self.port(port_id).is_none() {
            return Err(NetworkError::PortUnknown(port_id.to_string()));
        }
        let target = self
            .connection(connection_id)
            .ok_or_else(|| NetworkError::ConnectionUnknown(connection_id.to_string()))?;

        if enable {
            for other in &self.connections {
                if other.id == target.id || !other.autoconnect {
                    continue;
                }
                match self.resolved_port(other) {
                    Some(port) if port != port_id => continue,
                    _ => {}
                }
                debug!("Disabling autoconnect of {} on {}", other.id, port_id);
                let mut updated = other.clone();
                updated.autoconnect = false;
                self.update_connection(&other.id, updated)?;
            }
        }

        if target.autoconnect != enable {
            info!(
                "Setting autoconnect of {} on {} to {}",
                target.id, port_id, enable
            );
            let mut updated = target.clone();
            updated.autoconnect = enable;
            self.update_connection(&target.id, updated)?;
        }
        Ok(())
    }

    /// Applies `connection_id`, optionally on `port_id`
    ///
    /// Masters ignore the port. Otherwise a requested port that differs from
    /// the connection's own port is rejected before the backend is asked.
    pub fn activate(
        &mut self,
        port_id: Option<&str>,
        connection_id: &str,
    ) -> NetworkResult<ActivationResult> {
        let connection = self
            .connection(connection_id)
            .ok_or_else(|| NetworkError::ConnectionUnknown(connection_id.to_string()))?
            .clone();
        let uuid = stored_handle(&connection)?.to_string();

        let port = if connection.is_master() {
            if let Some(port_id) = port_id {
                debug!(
                    "Ignoring port {} for master connection {}",
                    port_id, connection.id
                );
            }
            None
        } else {
            let own = self.own_port(&connection);
            if let (Some(requested), Some(own)) = (port_id, own.as_deref()) {
                if requested != own {
                    return Err(NetworkError::ConnectionInvalid(format!(
                        "Connection {} applies to port {}, not {}",
                        connection.id, own, requested
                    )));
                }
            }
            match port_id {
                Some(requested) => Some(
                    self.port(requested)
                        .cloned()
                        .ok_or_else(|| NetworkError::PortUnknown(requested.to_string()))?,
                ),
                None => own.as_deref().and_then(|id| self.port(id)).cloned(),
            }
        };

        let tracked = AffectedElement::Connection(connection.id.clone());
        if self.jobs.iter().any(|job| {
            job.kind == JobType::ApplySettingData
                && job.state == JobState::Running
                && job.affects(&tracked)
        }) {
            return Err(NetworkError::ConnectionActivating(connection.id));
        }

        info!(
            "Activating connection {} on {}",
            connection.id,
            port.as_ref().map_or("any port", |p| p.id.as_str())
        );
        let activation = self
            .backend
            .activate_connection(&uuid, port.as_ref().map(|p| p.uuid.clone()))?;

        match activation {
            Activation::Completed => {
                info!("Connection {} activated", connection.id);
                Ok(ActivationResult::Completed)
            }
            Activation::Pending { active_connection } => {
                let mut affected = vec![AffectedElement::ActiveConnection(active_connection)];
                if let Some(port) = &port {
                    affected.push(AffectedElement::Port(port.id.clone()));
                }
                affected.push(tracked);
                let job_id = self.start_job(
                    JobType::ApplySettingData,
                    format!("Activate {}", connection.name),
                    affected,
                );
                Ok(ActivationResult::JobStarted(job_id))
            }
        }
    }

    /// Activates the default connection of `port_id`
    ///
    /// The default is the port's autoconnect connection, otherwise the first
    /// connection applying to it.
    pub fn activate_default(&mut self, port_id: &str) -> NetworkResult<ActivationResult> {
        if self.port(port_id).is_none() {
            return Err(NetworkError::PortUnknown(port_id.to_string()));
        }
        let connection_id = self
            .default_connection(port_id)
            .map(|c| c.id.clone())
            .ok_or_else(|| NetworkError::PortNoDefaultConnection(port_id.to_string()))?;
        self.activate(Some(port_id), &connection_id)
    }

    /// Deactivation is not supported
    pub fn deactivate(&self, _active_connection_id: &str) -> NetworkResult<()> {
        Err(NetworkError::NotImplemented("connection deactivation"))
    }

    /// Port state changes are not supported
    pub fn request_port_state(
        &self,
        _port_id: &str,
        _state: PortRequestedState,
    ) -> NetworkResult<()> {
        Err(NetworkError::NotImplemented("port state change"))
    }

    fn delete_stored(&self, connection: &Connection) -> NetworkResult<()> {
        let uuid = stored_handle(connection)?;
        info!("Deleting connection {} ({})", connection.id, connection.name);
        self.backend.delete_connection(uuid)
    }

    /// Validates a profile and fills in what the backend needs
    fn prepare(&self, mut connection: Connection) -> NetworkResult<Connection> {
        connection.validate()?;

        if let Some(master_id) = &connection.master_id {
            let master = self
                .connection(master_id)
                .ok_or_else(|| NetworkError::ConnectionUnknown(master_id.clone()))?;
            if !master.is_master() {
                return Err(NetworkError::ConnectionInvalid(format!(
                    "Connection {} cannot have slaves",
                    master.id
                )));
            }
        }

        if let Some(port_id) = &connection.port {
            let port = self
                .port(port_id)
                .ok_or_else(|| NetworkError::PortUnknown(port_id.clone()))?;
            if connection.mac.is_none() {
                connection.mac = port.hw_address().map(str::to_string);
            }
        }

        if connection.is_master() && connection.master_interface_name().is_none() {
            self.assign_interface_name(&mut connection)?;
        }
        Ok(connection)
    }

    fn assign_interface_name(&self, connection: &mut Connection) -> NetworkResult<()> {
        let (prefix, setting_type) = match connection.kind {
            ConnectionType::Bond => ("bond", SettingType::Bond),
            ConnectionType::Bridge => ("bridge", SettingType::Bridge),
            _ => return Ok(()),
        };
        let name = self.free_interface_name(prefix)?;
        debug!("Assigning interface {} to {}", name, connection.id);

        if connection.setting(setting_type).is_none() {
            let kind = match setting_type {
                SettingType::Bond => SettingKind::Bond(BondSetting::default()),
                _ => SettingKind::Bridge(BridgeSetting::default()),
            };
            connection.add_setting(Setting::new(kind));
        }
        match connection.setting_mut(setting_type).map(|s| &mut s.kind) {
            Some(SettingKind::Bond(bond)) => bond.interface_name = Some(name),
            Some(SettingKind::Bridge(bridge)) => bridge.interface_name = Some(name),
            _ => {}
        }
        Ok(())
    }

    /// `{prefix}{n}` with `n` one above the highest suffix in use
    pub(crate) fn free_interface_name(&self, prefix: &str) -> NetworkResult<String> {
        let next = self
            .ports
            .iter()
            .map(|p| p.id.as_str())
            .chain(
                self.connections
                    .iter()
                    .filter_map(Connection::master_interface_name),
            )
            .filter_map(|name| name.strip_prefix(prefix)?.parse::<u32>().ok())
            .max()
            .map_or(Some(0), |highest| highest.checked_add(1))
            .ok_or_else(|| {
                NetworkError::InvalidParameter(format!("No free {} interface name left", prefix))
            })?;
        Ok(format!("{}{}", prefix, next))
    }

    // ==================== Backend synchronization ====================

    /// Initial enumeration
    pub(crate) fn load(&mut self) -> NetworkResult<()> {
        let ports = self.backend.list_ports()?;
        let mut connections = self.backend.list_connections()?;
        let active = self.backend.list_active_connections()?;

        let known = connections.clone();
        for connection in &mut connections {
            resolve_master(&known, connection);
            connection.assign_setting_ids();
        }
        self.ports = ports;
        self.connections = connections;
        self.active_connections = active.iter().map(|a| self.resolve_active(a)).collect();

        info!(
            "Loaded {} ports, {} connections and {} active connections from {}",
            self.ports.len(),
            self.connections.len(),
            self.active_connections.len(),
            self.backend.name()
        );
        Ok(())
    }

    /// Applies one backend event to the entity graph
    pub(crate) fn apply_event(&mut self, event: BackendEvent) {
        debug!("Applying {} event", event.name());
        match event {
            BackendEvent::PortAdded(port) | BackendEvent::PortChanged(port) => {
                self.upsert_port(port)
            }
            BackendEvent::PortRemoved { uuid } => self.remove_port(&uuid),
            BackendEvent::ConnectionAdded(connection)
            | BackendEvent::ConnectionUpdated(connection) => self.upsert_connection(connection),
            BackendEvent::ConnectionRemoved { uuid } => self.remove_connection(&uuid),
            BackendEvent::ActiveConnectionChanged(info) => {
                let active = self.resolve_active(&info);
                match self
                    .active_connections
                    .iter_mut()
                    .find(|a| a.uuid == active.uuid)
                {
                    Some(existing) => *existing = active.clone(),
                    None => self.active_connections.push(active.clone()),
                }
                self.correlate_jobs(&active);
            }
            BackendEvent::ActiveConnectionsChanged(list) => {
                self.active_connections = list.iter().map(|a| self.resolve_active(a)).collect();
                debug!("{} active connections", self.active_connections.len());
            }
        }
    }

    fn upsert_port(&mut self, port: Port) {
        match self.ports.iter().position(|p| p.uuid == port.uuid) {
            Some(index) => {
                self.port_listeners
                    .change(&mut self.ports[index], move |live| *live = port);
            }
            None => {
                info!("Port {} appeared", port.id);
                let index = self.ports.len();
                self.ports.push(port);
                self.port_listeners.added(&self.ports[index]);
            }
        }
    }

    fn remove_port(&mut self, uuid: &str) {
        match self.ports.iter().position(|p| p.uuid == uuid) {
            Some(index) => {
                let port = self.ports.remove(index);
                info!("Port {} disappeared", port.id);
                self.port_listeners.deleted(&port);
            }
            None => warn!("Removal of unknown port {}", uuid),
        }
    }

    fn upsert_connection(&mut self, mut connection: Connection) {
        resolve_master(&self.connections, &mut connection);
        connection.assign_setting_ids();

        let existing = self.connections.iter().position(|c| {
            c.id == connection.id || (c.uuid.is_some() && c.uuid == connection.uuid)
        });
        match existing {
            Some(index) => {
                debug!("Connection {} updated", connection.id);
                self.connection_listeners
                    .change(&mut self.connections[index], move |live| *live = connection);
            }
            None => {
                info!("Connection {} ({}) added", connection.id, connection.name);
                let index = self.connections.len();
                self.connections.push(connection);
                self.connection_listeners.added(&self.connections[index]);
            }
        }
    }

    fn remove_connection(&mut self, uuid: &str) {
        match self
            .connections
            .iter()
            .position(|c| c.uuid.as_deref() == Some(uuid))
        {
            Some(index) => {
                let connection = self.connections.remove(index);
                info!("Connection {} removed", connection.id);
                self.connection_listeners.deleted(&connection);
            }
            None => warn!("Removal of unknown connection {}", uuid),
        }
    }

    fn resolve_active(&self, info: &ActiveConnectionInfo) -> ActiveConnection {
        ActiveConnection {
            uuid: info.uuid.clone(),
            connection: info
                .connection_uuid
                .as_deref()
                .and_then(|uuid| self.connection_by_uuid(uuid))
                .map(|c| c.id.clone()),
            ports: info
                .port_uuids
                .iter()
                .filter_map(|uuid| self.port_by_uuid(uuid))
                .map(|p| p.id.clone())
                .collect(),
            status: info.status,
        }
    }
}

/// Backend handle of a stored connection
fn stored_handle(connection: &Connection) -> NetworkResult<&str> {
    connection.uuid.as_deref().ok_or_else(|| {
        NetworkError::ConnectionInvalid(format!(
            "Connection {} is not stored in the backend",
            connection.id
        ))
    })
}

/// Points a slave's master reference at the master's id
///
/// Backends may name the master by interface instead of by id.
fn resolve_master(known: &[Connection], connection: &mut Connection) {
    let Some(reference) = connection.master_id.clone() else {
        return;
    };
    let master = known.iter().find(|c| c.id == reference).or_else(|| {
        known
            .iter()
            .find(|c| c.is_master() && c.master_interface_name() == Some(reference.as_str()))
    });
    if let Some(master) = master {
        connection.master_id = Some(master.id.clone());
        if connection.slave_type.is_none() {
            connection.slave_type = match master.kind {
                ConnectionType::Bond => Some(SlaveType::Bond),
                ConnectionType::Bridge => Some(SlaveType::Bridge),
                _ => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::model::{BondSetting, PortType};
    use mockall::Sequence;

    fn stored(id: &str, kind: ConnectionType) -> Connection {
        let mut connection = Connection::new(id, id.to_uppercase(), kind);
        connection.uuid = Some(format!("/settings/{}", id));
        connection
    }

    fn state_with(backend: MockBackend, connections: Vec<Connection>) -> NetworkState {
        let mut state = NetworkState::new(Arc::new(backend), JobSettings::default());
        for connection in connections {
            state.apply_event(BackendEvent::ConnectionAdded(connection));
        }
        state
    }

    fn bond_with_slaves() -> Vec<Connection> {
        let master = stored("bond", ConnectionType::Bond).with_setting(SettingKind::Bond(
            BondSetting {
                interface_name: Some("bond0".to_string()),
                ..Default::default()
            },
        ));
        let mut connections = vec![master.clone()];
        for name in ["s1", "s2", "s3"] {
            let mut slave = stored(name, ConnectionType::Ethernet);
            slave.set_master(&master).unwrap();
            connections.push(slave);
        }
        connections
    }

    #[test]
    fn test_delete_master_after_all_slaves() {
        let mut backend = MockBackend::new();
        let mut slaves_done = Sequence::new();
        for name in ["s1", "s2", "s3"] {
            let expected = format!("/settings/{}", name);
            backend
                .expect_delete_connection()
                .withf(move |uuid| uuid == expected)
                .times(1)
                .in_sequence(&mut slaves_done)
                .returning(|_| Ok(()));
        }
        backend
            .expect_delete_connection()
            .withf(|uuid| uuid == "/settings/bond")
            .times(1)
            .in_sequence(&mut slaves_done)
            .returning(|_| Ok(()));

        let state = state_with(backend, bond_with_slaves());
        state.delete_connection("bond").unwrap();
    }

    #[test]
    fn test_delete_stops_at_first_failed_slave() {
        let mut backend = MockBackend::new();
        backend
            .expect_delete_connection()
            .withf(|uuid| uuid == "/settings/s1")
            .times(1)
            .returning(|_| Ok(()));
        backend
            .expect_delete_connection()
            .withf(|uuid| uuid == "/settings/s2")
            .times(1)
            .returning(|_| Err(NetworkError::Backend("busy".to_string())));

        let state = state_with(backend, bond_with_slaves());
        let result = state.delete_connection("bond");
        assert!(matches!(result, Err(NetworkError::Backend(_))));
    }

    #[test]
    fn test_port_mismatch_never_reaches_backend() {
        let mut backend = MockBackend::new();
        backend.expect_activate_connection().times(0);

        let mut state = state_with(
            backend,
            vec![stored("c1", ConnectionType::Ethernet).with_port("eth1")],
        );
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/0", "eth0", PortType::Ethernet)));
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/1", "eth1", PortType::Ethernet)));

        let result = state.activate(Some("eth0"), "c1");
        assert!(matches!(result, Err(NetworkError::ConnectionInvalid(_))));
        assert!(state.jobs().is_empty());
    }

    #[test]
    fn test_master_ignores_requested_port() {
        let mut backend = MockBackend::new();
        backend
            .expect_activate_connection()
            .withf(|uuid, port| uuid == "/settings/bond" && port.is_none())
            .times(1)
            .returning(|_, _| Ok(Activation::Completed));

        let mut state = state_with(backend, bond_with_slaves());
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/0", "eth0", PortType::Ethernet)));
        assert_eq!(
            state.activate(Some("eth0"), "bond").unwrap(),
            ActivationResult::Completed
        );
    }

    #[test]
    fn test_free_interface_name() {
        let mut state = state_with(MockBackend::new(), bond_with_slaves());
        assert_eq!(state.free_interface_name("bond").unwrap(), "bond1");
        assert_eq!(state.free_interface_name("bridge").unwrap(), "bridge0");

        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/7", "bond7", PortType::Bond)));
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/8", "bondx", PortType::Bond)));
        assert_eq!(state.free_interface_name("bond").unwrap(), "bond8");
    }

    #[test]
    fn test_exhausted_interface_suffix_is_an_error() {
        let mut state = state_with(MockBackend::new(), Vec::new());
        state.apply_event(BackendEvent::PortAdded(Port::new(
            "/dev/9",
            "bond4294967295",
            PortType::Bond,
        )));

        assert!(matches!(
            state.free_interface_name("bond"),
            Err(NetworkError::InvalidParameter(_))
        ));
        assert!(matches!(
            state.create_connection(Connection::new("b2", "Bond", ConnectionType::Bond)),
            Err(NetworkError::InvalidParameter(_))
        ));
        assert_eq!(state.free_interface_name("bridge").unwrap(), "bridge0");
    }

    #[test]
    fn test_slave_activates_on_its_own_port() {
        let mut backend = MockBackend::new();
        backend
            .expect_activate_connection()
            .withf(|uuid, port| uuid == "/settings/s1" && port.as_deref() == Some("/dev/0"))
            .times(1)
            .returning(|_, _| Ok(Activation::Completed));

        let mut connections = bond_with_slaves();
        connections[1].port = Some("eth0".to_string());
        let mut state = state_with(backend, connections);
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/0", "eth0", PortType::Ethernet)));
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/5", "bond0", PortType::Bond)));

        assert_eq!(
            state.activate(Some("eth0"), "s1").unwrap(),
            ActivationResult::Completed
        );
        assert!(matches!(
            state.activate(Some("bond0"), "s1"),
            Err(NetworkError::ConnectionInvalid(_))
        ));
    }

    #[test]
    fn test_unpinned_slave_is_not_sent_to_master_device() {
        let mut backend = MockBackend::new();
        backend
            .expect_activate_connection()
            .withf(|uuid, port| uuid == "/settings/s2" && port.is_none())
            .times(1)
            .returning(|_, _| Ok(Activation::Completed));

        let mut state = state_with(backend, bond_with_slaves());
        state.apply_event(BackendEvent::PortAdded(Port::new("/dev/5", "bond0", PortType::Bond)));

        assert_eq!(state.activate(None, "s2").unwrap(), ActivationResult::Completed);
    }

    #[test]
    fn test_create_fills_master_interface_and_mac() {
        let mut backend = MockBackend::new();
        backend
            .expect_create_connection()
            .withf(|c| c.id == "br" && c.master_interface_name() == Some("bridge0"))
            .times(1)
            .returning(|_| Ok("/settings/br".to_string()));
        backend
            .expect_create_connection()
            .withf(|c| c.id == "e" && c.mac.as_deref() == Some("00:11:22:33:44:55"))
            .times(1)
            .returning(|_| Ok("/settings/e".to_string()));

        let mut state = state_with(backend, Vec::new());
        state.apply_event(BackendEvent::PortAdded(
            Port::new("/dev/0", "eth0", PortType::Ethernet).with_mac("00:11:22:33:44:55"),
        ));

        let bridge = Connection::new("br", "Bridge", ConnectionType::Bridge);
        assert_eq!(state.create_connection(bridge).unwrap(), "/settings/br");

        let ethernet = Connection::new("e", "Eth", ConnectionType::Ethernet).with_port("eth0");
        assert_eq!(state.create_connection(ethernet).unwrap(), "/settings/e");
    }

    #[test]
    fn test_create_rejects_unknown_master_and_port() {
        let state = state_with(MockBackend::new(), Vec::new());

        let mut slave = Connection::new("s", "Slave", ConnectionType::Ethernet);
        slave.master_id = Some("missing".to_string());
        slave.slave_type = Some(SlaveType::Bond);
        assert!(matches!(
            state.create_connection(slave),
            Err(NetworkError::ConnectionUnknown(_))
        ));

        let pinned = Connection::new("p", "Pinned", ConnectionType::Ethernet).with_port("eth5");
        assert!(matches!(
            state.create_connection(pinned),
            Err(NetworkError::PortUnknown(_))
        ));
    }

    #[test]
    fn test_slave_resolves_to_master_interface() {
        let state = state_with(MockBackend::new(), bond_with_slaves());
        let slave = state.connection("s2").unwrap();
        assert_eq!(state.resolved_port(slave).as_deref(), Some("bond0"));
        assert_eq!(state.connections_on_port("bond0").count(), 4);
    }

    #[test]
    fn test_master_reference_by_interface_name() {
        let mut connections = bond_with_slaves();
        connections[1].master_id = Some("bond0".to_string());
        connections[1].slave_type = None;

        let state = state_with(MockBackend::new(), connections);
        let slave = state.connection("s1").unwrap();
        assert_eq!(slave.master_id.as_deref(), Some("bond"));
        assert_eq!(slave.slave_type, Some(SlaveType::Bond));
    }

    #[test]
    fn test_unsupported_state_changes() {
        let state = state_with(MockBackend::new(), Vec::new());
        assert!(matches!(
            state.deactivate("ac1"),
            Err(NetworkError::NotImplemented(_))
        ));
        assert!(matches!(
            state.request_port_state("eth0", PortRequestedState::Disabled),
            Err(NetworkError::NotImplemented(_))
        ));
    }
}
