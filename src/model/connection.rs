//! Connection - reusable configuration profile applied to a port

use super::setting::{Setting, SettingKind, SettingType};
use crate::error::{NetworkError, NetworkResult};
use crate::validation::{validate_interface_name, validate_local_id, validate_mac_address};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Ethernet,
    Bond,
    Bridge,
    Unknown,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionType::Ethernet => "ethernet",
            ConnectionType::Bond => "bond",
            ConnectionType::Bridge => "bridge",
            ConnectionType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Kind of master a slave connection is enslaved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlaveType {
    Bond,
    Bridge,
}

/// Network connection profile
///
/// Live connections owned by a `Network` are never modified in place: clone
/// one, change the clone and hand it to `NetworkState::update_connection`.
/// The live copy is refreshed when the backend reports the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Backend handle, `None` until the backend has stored the profile
    pub uuid: Option<String>,
    /// Stable local identity
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Connection type
    pub kind: ConnectionType,
    /// Whether the backend activates this profile on its own
    pub autoconnect: bool,
    /// Configuration facets, addressed by position
    pub settings: Vec<Setting>,
    /// Id of the port this profile is pinned to
    pub port: Option<String>,
    /// Hardware address the profile is bound to
    pub mac: Option<String>,
    /// Interface name the profile is bound to
    pub interface_name: Option<String>,
    /// Id of the master connection when this is a slave
    pub master_id: Option<String>,
    /// Kind of the master when this is a slave
    pub slave_type: Option<SlaveType>,
}

impl Connection {
    /// Creates an empty connection with the given identity
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ConnectionType) -> Self {
        Self {
            uuid: None,
            id: id.into(),
            name: name.into(),
            kind,
            autoconnect: false,
            settings: Vec::new(),
            port: None,
            mac: None,
            interface_name: None,
            master_id: None,
            slave_type: None,
        }
    }

    /// Creates a draft with a freshly generated id
    pub fn draft(name: impl Into<String>, kind: ConnectionType) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name, kind)
    }

    /// Pins the connection to a port
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Appends a setting
    pub fn with_setting(mut self, kind: SettingKind) -> Self {
        self.add_setting(Setting::new(kind));
        self
    }

    /// Whether this connection can have slaves
    pub fn is_master(&self) -> bool {
        matches!(self.kind, ConnectionType::Bond | ConnectionType::Bridge)
    }

    /// Whether this connection is enslaved to a master
    pub fn is_slave(&self) -> bool {
        self.master_id.is_some()
    }

    /// Gets the first setting of a type
    pub fn setting(&self, ty: SettingType) -> Option<&Setting> {
        self.settings.iter().find(|s| s.setting_type() == ty)
    }

    /// Gets the first setting of a type, mutably
    pub fn setting_mut(&mut self, ty: SettingType) -> Option<&mut Setting> {
        self.settings.iter_mut().find(|s| s.setting_type() == ty)
    }

    pub fn add_setting(&mut self, setting: Setting) {
        self.settings.push(setting);
    }

    /// Removes the setting at `index`
    pub fn remove_setting(&mut self, index: usize) -> NetworkResult<Setting> {
        if index >= self.settings.len() {
            return Err(NetworkError::InvalidParameter(format!(
                "Connection {} has no setting {}",
                self.id, index
            )));
        }
        Ok(self.settings.remove(index))
    }

    /// Interface name declared by a master's bond or bridge setting
    pub fn master_interface_name(&self) -> Option<&str> {
        let ty = match self.kind {
            ConnectionType::Bond => SettingType::Bond,
            ConnectionType::Bridge => SettingType::Bridge,
            _ => return None,
        };
        self.setting(ty).and_then(Setting::interface_name)
    }

    /// Enslaves this connection to `master`
    pub fn set_master(&mut self, master: &Connection) -> NetworkResult<()> {
        let slave_type = match master.kind {
            ConnectionType::Bond => SlaveType::Bond,
            ConnectionType::Bridge => SlaveType::Bridge,
            _ => {
                return Err(NetworkError::ConnectionInvalid(format!(
                    "Connection {} is not a bond or bridge",
                    master.id
                )))
            }
        };
        self.master_id = Some(master.id.clone());
        self.slave_type = Some(slave_type);
        Ok(())
    }

    /// Assigns `{id}_{index}` identities to all settings
    pub(crate) fn assign_setting_ids(&mut self) {
        for (index, setting) in self.settings.iter_mut().enumerate() {
            let id = format!("{}_{}", self.id, index);
            setting.caption = Some(id.clone());
            setting.id = Some(id);
        }
    }

    /// Checks that the profile can be handed to a backend
    pub fn validate(&self) -> NetworkResult<()> {
        validate_local_id(&self.id)?;
        if self.name.is_empty() {
            return Err(NetworkError::InvalidParameter(
                "Connection name cannot be empty".to_string(),
            ));
        }
        if let Some(mac) = &self.mac {
            validate_mac_address(mac)?;
        }
        if let Some(name) = &self.interface_name {
            validate_interface_name(name)?;
        }
        if self.master_id.is_some() != self.slave_type.is_some() {
            return Err(NetworkError::InvalidParameter(format!(
                "Connection {} has an incomplete master reference",
                self.id
            )));
        }
        if self.is_slave() && self.is_master() {
            return Err(NetworkError::InvalidParameter(format!(
                "Master connection {} cannot be enslaved",
                self.id
            )));
        }
        for setting in &self.settings {
            setting.validate()?;
        }
        Ok(())
    }
}
