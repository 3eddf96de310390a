//! Process-wide shared network
//!
//! Embedders that need exactly one network per process (one per plugin
//! load, for instance) go through `acquire` and `release`. The first
//! `acquire` starts the network; it stops when the last handle is released.

use crate::error::NetworkResult;
use crate::network::Network;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

static SHARED: Mutex<Option<Weak<Network>>> = Mutex::new(None);

/// Returns the shared network, starting it with `factory` if none is running
pub fn acquire<F>(factory: F) -> NetworkResult<Arc<Network>>
where
    F: FnOnce() -> NetworkResult<Network>,
{
    let mut slot = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(network) = slot.as_ref().and_then(Weak::upgrade) {
        debug!("Reusing shared network");
        return Ok(network);
    }

    let network = Arc::new(factory()?);
    *slot = Some(Arc::downgrade(&network));
    debug!("Shared network created");
    Ok(network)
}

/// Releases a handle obtained from `acquire`
pub fn release(network: Arc<Network>) {
    if Arc::strong_count(&network) == 1 {
        debug!("Releasing last handle to the shared network");
    }
    drop(network);
}

/// Whether a shared network is currently alive
pub fn is_running() -> bool {
    SHARED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .as_ref()
        .is_some_and(|weak| weak.strong_count() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, BackendCall, MemoryBackend};
    use crate::config::NetworkConfig;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_acquire_shares_one_network() {
        let backend = Arc::new(MemoryBackend::new());
        let factory_backend = backend.clone();
        let first = acquire(move || {
            Network::start(factory_backend as Arc<dyn Backend>, &NetworkConfig::default())
        })
        .unwrap();
        let second = acquire(|| panic!("network must be reused")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_running());

        release(first);
        assert!(is_running());
        release(second);
        assert!(!is_running());
        assert_eq!(backend.calls().last(), Some(&BackendCall::Unsubscribe));
    }

    #[test]
    #[serial]
    fn test_failed_factory_leaves_slot_empty() {
        let result = acquire(|| {
            Err(crate::error::NetworkError::Backend(
                "unreachable".to_string(),
            ))
        });
        assert!(result.is_err());
        assert!(!is_running());
    }
}
