//! lminet - Network State Synchronization Library
//!
//! Keeps an in-memory graph of network entities in sync with a network
//! management backend and tracks long running activations as jobs:
//! - Ports (network interfaces)
//! - Connections (configuration profiles) and their settings
//! - Active connections
//! - Jobs
//!
//! Includes a NetworkManager D-Bus backend and an in-memory backend.

pub mod error;
pub mod config;
pub mod logging;
pub mod validation;
pub mod model;
pub mod backend;
pub mod network;
pub mod registry;

// Re-export commonly used types
pub use error::{NetworkError, NetworkResult};
pub use config::NetworkConfig;
pub use model::{
    ActiveConnection, ActiveConnectionInfo, ActiveConnectionStatus, AffectedElement,
    Connection, ConnectionType, InstanceId, Job, JobChanges, JobState, JobType, Port,
    PortOperatingStatus, PortType, Setting, SettingKind, SettingType,
};
pub use backend::{Activation, Backend, BackendEvent, EventSink, MemoryBackend};
pub use network::{ActivationResult, ChangeListener, Network, NetworkGuard, NetworkState};

#[cfg(feature = "dbus-nm")]
pub use backend::NmBackend;
