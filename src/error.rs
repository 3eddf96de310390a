//! Error types for lminet

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Allocation or resource exhaustion
    #[error("Out of memory")]
    Memory,
    /// The network management backend rejected or failed a call
    #[error("Backend error: {0}")]
    Backend(String),
    /// Caller-supplied data violates a precondition
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Caller-supplied data is well-formed but does not fit the target
    #[error("Wrong parameter: {0}")]
    WrongParameter(String),
    /// Connection cannot be used for the requested operation
    #[error("Connection invalid: {0}")]
    ConnectionInvalid(String),
    /// Connection not found
    #[error("Connection unknown: {0}")]
    ConnectionUnknown(String),
    /// Connection is already being activated
    #[error("Connection is activating: {0}")]
    ConnectionActivating(String),
    /// Port not found
    #[error("Port unknown: {0}")]
    PortUnknown(String),
    /// Port has no connection that could be activated on it
    #[error("Port has no default connection: {0}")]
    PortNoDefaultConnection(String),
    /// Port state change request failed
    #[error("Port state change failed: {0}")]
    PortStateChangeFailed(String),
    /// Job not found
    #[error("Job unknown: {0}")]
    JobUnknown(u64),
    /// Operation is intentionally unsupported
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl NetworkError {
    /// Whether the error was produced by the backend rather than by the core
    pub fn is_backend(&self) -> bool {
        matches!(self, NetworkError::Backend(_))
    }
}

impl From<toml::de::Error> for NetworkError {
    fn from(error: toml::de::Error) -> Self {
        NetworkError::Config(error.to_string())
    }
}

#[cfg(feature = "dbus-nm")]
impl From<zbus::Error> for NetworkError {
    fn from(error: zbus::Error) -> Self {
        // Method errors carry the backend's own reason; keep only that part
        match &error {
            zbus::Error::MethodError(name, Some(detail), _) => {
                NetworkError::Backend(format!("{}: {}", name.as_str(), detail))
            }
            _ => NetworkError::Backend(error.to_string()),
        }
    }
}

#[cfg(feature = "dbus-nm")]
impl From<zbus::fdo::Error> for NetworkError {
    fn from(error: zbus::fdo::Error) -> Self {
        NetworkError::Backend(error.to_string())
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
