//! Stable external identifiers: `LMI:{Class}:{local_id}[_{i}[_{j}]]`

use crate::error::{NetworkError, NetworkResult};
use crate::validation::{validate_local_id, INSTANCE_ID_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization prefix of every instance id
pub const ORGANIZATION: &str = "LMI";

/// Maximum number of positional indices
pub const MAX_INDICES: usize = 2;

/// Decoded instance id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    pub class: String,
    pub local_id: String,
    /// Positional sub-indices, e.g. setting then route
    pub indices: Vec<usize>,
}

impl InstanceId {
    pub fn new(class: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            local_id: local_id.into(),
            indices: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.indices.push(index);
        self
    }

    /// Encodes an entity id and up to two indices
    pub fn encode(class: &str, local_id: &str, indices: &[usize]) -> NetworkResult<String> {
        validate_local_id(local_id)?;
        if class.is_empty() || class.contains(INSTANCE_ID_SEPARATOR) {
            return Err(NetworkError::InvalidParameter(format!(
                "Invalid class name '{}'",
                class
            )));
        }
        if indices.len() > MAX_INDICES {
            return Err(NetworkError::InvalidParameter(format!(
                "At most {} indices can be encoded, got {}",
                MAX_INDICES,
                indices.len()
            )));
        }

        let mut value = format!(
            "{}{sep}{}{sep}{}",
            ORGANIZATION,
            class,
            local_id,
            sep = INSTANCE_ID_SEPARATOR
        );
        for index in indices {
            value.push('_');
            value.push_str(&index.to_string());
        }
        Ok(value)
    }

    /// Decodes `value` expecting `class` and exactly `index_count` indices
    ///
    /// Indices are split off from the right, so local ids may themselves
    /// contain underscores.
    pub fn decode(value: &str, class: &str, index_count: usize) -> NetworkResult<Self> {
        if index_count > MAX_INDICES {
            return Err(NetworkError::InvalidParameter(format!(
                "At most {} indices can be decoded",
                MAX_INDICES
            )));
        }

        let prefix = format!(
            "{}{sep}{}{sep}",
            ORGANIZATION,
            class,
            sep = INSTANCE_ID_SEPARATOR
        );
        let rest = value.strip_prefix(&prefix).ok_or_else(|| {
            NetworkError::WrongParameter(format!(
                "Instance id '{}' does not belong to class {}",
                value, class
            ))
        })?;

        let mut parts: Vec<&str> = rest.rsplitn(index_count + 1, '_').collect();
        if parts.len() != index_count + 1 {
            return Err(NetworkError::WrongParameter(format!(
                "Instance id '{}' lacks {} indices",
                value, index_count
            )));
        }
        parts.reverse();

        let local_id = parts[0];
        validate_local_id(local_id)
            .map_err(|e| NetworkError::WrongParameter(format!("Instance id '{}': {}", value, e)))?;

        let indices = parts[1..]
            .iter()
            .map(|part| {
                part.parse::<usize>().map_err(|_| {
                    NetworkError::WrongParameter(format!(
                        "Instance id '{}' has a non-numeric index '{}'",
                        value, part
                    ))
                })
            })
            .collect::<NetworkResult<Vec<_>>>()?;

        Ok(Self {
            class: class.to_string(),
            local_id: local_id.to_string(),
            indices,
        })
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            ORGANIZATION,
            self.class,
            self.local_id,
            sep = INSTANCE_ID_SEPARATOR
        )?;
        for index in &self.indices {
            write!(f, "_{}", index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_forms() {
        assert_eq!(
            InstanceId::encode("LANEndpoint", "eth0", &[]).unwrap(),
            "LMI:LANEndpoint:eth0"
        );
        assert_eq!(
            InstanceId::encode("IPRouteSettingData", "c1", &[2, 0]).unwrap(),
            "LMI:IPRouteSettingData:c1_2_0"
        );
        assert!(InstanceId::encode("X", "c1", &[1, 2, 3]).is_err());
        assert!(InstanceId::encode("X", "bad:id", &[]).is_err());
    }

    #[test]
    fn test_decode_keeps_underscores_in_local_id() {
        let id = InstanceId::decode("LMI:IPSettingData:veth_a_3", "IPSettingData", 1).unwrap();
        assert_eq!(id.local_id, "veth_a");
        assert_eq!(id.indices, vec![3]);

        let id = InstanceId::decode("LMI:IPSettingData:veth_a", "IPSettingData", 0).unwrap();
        assert_eq!(id.local_id, "veth_a");
        assert!(id.indices.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            InstanceId::decode("LMI:Other:c1", "IPSettingData", 0),
            Err(NetworkError::WrongParameter(_))
        ));
        assert!(InstanceId::decode("LMI:IPSettingData:c1", "IPSettingData", 1).is_err());
        assert!(InstanceId::decode("LMI:IPSettingData:c1_x", "IPSettingData", 1).is_err());
    }

    #[test]
    fn test_display_matches_encode() {
        let id = InstanceId::new("DNSSettingData", "c7").with_index(1);
        assert_eq!(
            id.to_string(),
            InstanceId::encode("DNSSettingData", "c7", &[1]).unwrap()
        );
    }
}
