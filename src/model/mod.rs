//! Entity model
//!
//! Plain data types for the entities kept in sync with the backend. They
//! carry no locking of their own; the `Network` owns every live instance.

pub mod active_connection;
pub mod address;
pub mod connection;
pub mod instance_id;
pub mod job;
pub mod port;
pub mod setting;

pub use active_connection::{ActiveConnection, ActiveConnectionInfo, ActiveConnectionStatus};
pub use address::{Address, DnsServer, IpConfig, ProtocolType, Route};
pub use connection::{Connection, ConnectionType, SlaveType};
pub use instance_id::InstanceId;
pub use job::{AffectedElement, Job, JobChanges, JobState, JobType};
pub use port::{Port, PortOperatingStatus, PortRequestedState, PortType};
pub use setting::{
    BondMode, BondSetting, BridgeSetting, BridgeSlaveSetting, IpMethod, IpSetting, Setting,
    SettingKind, SettingType, WiredSetting,
};
