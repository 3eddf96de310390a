//! Input validation for connection drafts and identifiers

use crate::error::{NetworkError, NetworkResult};

/// Kernel limit on interface names (IFNAMSIZ minus the terminator)
const IFNAME_MAX: usize = 15;

/// Maximum length for DNS search domains
const MAX_DOMAIN_LEN: usize = 253;

/// Separator used by instance identifiers; local ids must not contain it
pub const INSTANCE_ID_SEPARATOR: char = ':';

/// Checks a kernel interface name such as `eth0`, `bond1` or `br-lan.10`
pub fn validate_interface_name(name: &str) -> NetworkResult<()> {
    let invalid = |reason: String| Err(NetworkError::InvalidParameter(reason));

    if name.is_empty() || name.len() > IFNAME_MAX {
        return invalid(format!(
            "Interface name '{}' must be 1 to {} characters",
            name, IFNAME_MAX
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return invalid(format!("Interface name '{}' contains '{}'", name, c));
    }
    if name.starts_with('-') {
        return invalid(format!("Interface name '{}' starts with '-'", name));
    }
    Ok(())
}

/// Checks a colon separated hardware address (`00:11:22:AA:BB:CC`)
pub fn validate_mac_address(mac: &str) -> NetworkResult<()> {
    let octets: Vec<&str> = mac.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if well_formed {
        Ok(())
    } else {
        Err(NetworkError::InvalidParameter(format!(
            "Hardware address '{}' is not six colon separated hex octets",
            mac
        )))
    }
}

/// Compare two MAC addresses ignoring case
pub fn mac_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub fn validate_prefix_len(prefix: u8, is_ipv6: bool) -> NetworkResult<()> {
    let bits = if is_ipv6 { 128 } else { 32 };
    if prefix > bits {
        return Err(NetworkError::InvalidParameter(format!(
            "/{} is longer than a {} bit address",
            prefix, bits
        )));
    }
    Ok(())
}

/// MTU between the IPv4 minimum of 68 and 64 KiB
pub fn validate_mtu(mtu: u32) -> NetworkResult<()> {
    if (68..=65536).contains(&mtu) {
        Ok(())
    } else {
        Err(NetworkError::InvalidParameter(format!("MTU {} out of range", mtu)))
    }
}

/// Validate a DNS search domain
pub fn validate_search_domain(domain: &str) -> NetworkResult<()> {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return Err(NetworkError::InvalidParameter(
            format!("Invalid search domain length: {}", domain.len())
        ));
    }

    for c in domain.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '.' {
            return Err(NetworkError::InvalidParameter(
                format!("Invalid search domain character: {}", c)
            ));
        }
    }

    if domain.starts_with('-') || domain.starts_with('.') || domain.ends_with('-') {
        return Err(NetworkError::InvalidParameter(
            format!("Invalid search domain format: {}", domain)
        ));
    }

    Ok(())
}

/// Validate a local entity id so that it survives instance id encoding
pub fn validate_local_id(id: &str) -> NetworkResult<()> {
    if id.is_empty() {
        return Err(NetworkError::InvalidParameter("Id cannot be empty".to_string()));
    }
    if id.contains(INSTANCE_ID_SEPARATOR) {
        return Err(NetworkError::InvalidParameter(
            format!("Id '{}' contains reserved separator '{}'", id, INSTANCE_ID_SEPARATOR)
        ));
    }
    if id.chars().any(|c| c.is_control()) {
        return Err(NetworkError::InvalidParameter(
            format!("Id '{}' contains control characters", id.escape_debug())
        ));
    }
    Ok(())
}
