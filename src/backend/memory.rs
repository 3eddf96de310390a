//! In-memory backend
//!
//! Keeps ports, profiles and active connections in process memory. Every
//! call is recorded, activation results can be scripted, failures can be
//! injected per operation, and stored changes can optionally be echoed back
//! as events the way a real service reports its own writes.

use super::{Activation, Backend, BackendEvent, EventSink};
use crate::error::{NetworkError, NetworkResult};
use crate::model::{ActiveConnectionInfo, ActiveConnectionStatus, Connection, Port};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
    Activate,
    Subscribe,
}

/// Recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListPorts,
    ListConnections,
    ListActiveConnections,
    Create { id: String },
    Update { uuid: String },
    Delete { uuid: String },
    Activate {
        connection_uuid: String,
        port_uuid: Option<String>,
    },
    Subscribe,
    Unsubscribe,
}

struct Failure {
    operation: Operation,
    /// Connection id for creates, backend handle otherwise; `None` matches all
    target: Option<String>,
    message: String,
}

#[derive(Default)]
struct Inner {
    ports: Vec<Port>,
    connections: Vec<Connection>,
    active: Vec<ActiveConnectionInfo>,
    sink: Option<EventSink>,
    calls: Vec<BackendCall>,
    failures: Vec<Failure>,
    activations: VecDeque<Activation>,
    echo: bool,
    next_handle: u64,
}

impl Inner {
    fn check(&self, operation: Operation, target: &str) -> NetworkResult<()> {
        match self.failures.iter().find(|f| {
            f.operation == operation && f.target.as_deref().map_or(true, |t| t == target)
        }) {
            Some(failure) => Err(NetworkError::Backend(failure.message.clone())),
            None => Ok(()),
        }
    }

    fn handle(&mut self, kind: &str) -> String {
        self.next_handle += 1;
        format!("/memory/{}/{}", kind, self.next_handle)
    }

    fn echo(&self, event: BackendEvent) {
        if !self.echo {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.send(event);
        }
    }
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Memory backend lock poisoned, continuing");
            poisoned.into_inner()
        })
    }

    /// Report stored changes back as events
    pub fn with_echo(self, echo: bool) -> Self {
        self.inner().echo = echo;
        self
    }

    pub fn with_port(self, port: Port) -> Self {
        self.inner().ports.push(port);
        self
    }

    /// Adds a stored profile; a missing handle is generated
    pub fn with_connection(self, mut connection: Connection) -> Self {
        {
            let mut inner = self.inner();
            if connection.uuid.is_none() {
                connection.uuid = Some(inner.handle("connection"));
            }
            inner.connections.push(connection);
        }
        self
    }

    pub fn with_active_connection(self, info: ActiveConnectionInfo) -> Self {
        self.inner().active.push(info);
        self
    }

    /// Queues the result of the next activation
    pub fn script_activation(&self, activation: Activation) {
        self.inner().activations.push_back(activation);
    }

    /// Makes `operation` fail for `target` (or every target) until cleared
    pub fn fail(&self, operation: Operation, target: Option<&str>, message: &str) {
        self.inner().failures.push(Failure {
            operation,
            target: target.map(str::to_string),
            message: message.to_string(),
        });
    }

    pub fn clear_failures(&self) {
        self.inner().failures.clear();
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner().calls.clear();
    }

    /// Stored profile with backend handle `uuid`
    pub fn stored_connection(&self, uuid: &str) -> Option<Connection> {
        self.inner()
            .connections
            .iter()
            .find(|c| c.uuid.as_deref() == Some(uuid))
            .cloned()
    }

    /// Delivers `event` to the subscriber, as if the service had emitted it
    pub fn emit(&self, event: BackendEvent) -> bool {
        match &self.inner().sink {
            Some(sink) => sink.send(event),
            None => {
                debug!("No subscriber for {} event", event.name());
                false
            }
        }
    }

    /// Adds a port and reports it
    pub fn add_port(&self, port: Port) -> bool {
        let mut inner = self.inner();
        inner.ports.push(port.clone());
        inner
            .sink
            .as_ref()
            .map_or(false, |sink| sink.send(BackendEvent::PortAdded(port)))
    }

    /// Changes an active connection's status and reports it
    pub fn set_active_connection_status(&self, uuid: &str, status: ActiveConnectionStatus) -> bool {
        let mut inner = self.inner();
        let info = match inner.active.iter_mut().find(|a| a.uuid == uuid) {
            Some(info) => {
                info.status = status;
                info.clone()
            }
            None => {
                let info = ActiveConnectionInfo::new(uuid, status);
                inner.active.push(info.clone());
                info
            }
        };
        inner
            .sink
            .as_ref()
            .map_or(false, |sink| sink.send(BackendEvent::ActiveConnectionChanged(info)))
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list_ports(&self) -> NetworkResult<Vec<Port>> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::ListPorts);
        inner.check(Operation::List, "ports")?;
        Ok(inner.ports.clone())
    }

    fn list_connections(&self) -> NetworkResult<Vec<Connection>> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::ListConnections);
        inner.check(Operation::List, "connections")?;
        Ok(inner.connections.clone())
    }

    fn list_active_connections(&self) -> NetworkResult<Vec<ActiveConnectionInfo>> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::ListActiveConnections);
        inner.check(Operation::List, "active-connections")?;
        Ok(inner.active.clone())
    }

    fn create_connection(&self, connection: &Connection) -> NetworkResult<String> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Create {
            id: connection.id.clone(),
        });
        inner.check(Operation::Create, &connection.id)?;

        let uuid = inner.handle("connection");
        let mut stored = connection.clone();
        stored.uuid = Some(uuid.clone());
        inner.connections.push(stored.clone());
        inner.echo(BackendEvent::ConnectionAdded(stored));
        Ok(uuid)
    }

    fn update_connection(&self, uuid: &str, connection: &Connection) -> NetworkResult<()> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Update {
            uuid: uuid.to_string(),
        });
        inner.check(Operation::Update, uuid)?;

        let stored = inner
            .connections
            .iter_mut()
            .find(|c| c.uuid.as_deref() == Some(uuid))
            .ok_or_else(|| NetworkError::Backend(format!("No connection {}", uuid)))?;
        *stored = connection.clone();
        stored.uuid = Some(uuid.to_string());
        let stored = stored.clone();
        inner.echo(BackendEvent::ConnectionUpdated(stored));
        Ok(())
    }

    fn delete_connection(&self, uuid: &str) -> NetworkResult<()> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Delete {
            uuid: uuid.to_string(),
        });
        inner.check(Operation::Delete, uuid)?;

        let before = inner.connections.len();
        inner.connections.retain(|c| c.uuid.as_deref() != Some(uuid));
        if inner.connections.len() == before {
            return Err(NetworkError::Backend(format!("No connection {}", uuid)));
        }
        inner.echo(BackendEvent::ConnectionRemoved {
            uuid: uuid.to_string(),
        });
        Ok(())
    }

    fn activate_connection(
        &self,
        connection_uuid: &str,
        port_uuid: Option<String>,
    ) -> NetworkResult<Activation> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Activate {
            connection_uuid: connection_uuid.to_string(),
            port_uuid: port_uuid.clone(),
        });
        inner.check(Operation::Activate, connection_uuid)?;

        if !inner
            .connections
            .iter()
            .any(|c| c.uuid.as_deref() == Some(connection_uuid))
        {
            return Err(NetworkError::Backend(format!(
                "No connection {}",
                connection_uuid
            )));
        }

        let activation = inner.activations.pop_front().unwrap_or(Activation::Completed);
        let (uuid, status) = match &activation {
            Activation::Completed => (inner.handle("active"), ActiveConnectionStatus::Activated),
            Activation::Pending { active_connection } => {
                (active_connection.clone(), ActiveConnectionStatus::Activating)
            }
        };
        inner.active.retain(|a| a.uuid != uuid);
        inner.active.push(ActiveConnectionInfo {
            uuid,
            connection_uuid: Some(connection_uuid.to_string()),
            port_uuids: port_uuid.into_iter().collect(),
            status,
        });
        let active = inner.active.clone();
        inner.echo(BackendEvent::ActiveConnectionsChanged(active));
        Ok(activation)
    }

    fn subscribe(&self, sink: EventSink) -> NetworkResult<()> {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Subscribe);
        inner.check(Operation::Subscribe, "")?;
        inner.sink = Some(sink);
        Ok(())
    }

    fn unsubscribe(&self) {
        let mut inner = self.inner();
        inner.calls.push(BackendCall::Unsubscribe);
        inner.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionType, PortType};
    use crate::network::LoopMessage;
    use tokio::sync::mpsc;

    fn subscribed(backend: &MemoryBackend) -> mpsc::UnboundedReceiver<LoopMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        backend.subscribe(EventSink::new(tx)).unwrap();
        rx
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<LoopMessage>) -> Option<BackendEvent> {
        match rx.try_recv() {
            Ok(LoopMessage::Backend(event)) => Some(event),
            _ => None,
        }
    }

    #[test]
    fn test_create_assigns_handle_and_echoes() {
        let backend = MemoryBackend::new().with_echo(true);
        let mut rx = subscribed(&backend);

        let uuid = backend
            .create_connection(&Connection::new("c1", "Test1", ConnectionType::Ethernet))
            .unwrap();
        assert!(uuid.starts_with("/memory/connection/"));
        assert_eq!(backend.stored_connection(&uuid).unwrap().id, "c1");

        match next_event(&mut rx) {
            Some(BackendEvent::ConnectionAdded(c)) => assert_eq!(c.uuid.as_deref(), Some(uuid.as_str())),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_no_echo_by_default() {
        let backend = MemoryBackend::new();
        let mut rx = subscribed(&backend);
        backend
            .create_connection(&Connection::new("c1", "Test1", ConnectionType::Ethernet))
            .unwrap();
        assert!(next_event(&mut rx).is_none());
    }

    #[test]
    fn test_injected_failure_targets_one_handle() {
        let backend = MemoryBackend::new()
            .with_connection(Connection::new("a", "A", ConnectionType::Ethernet))
            .with_connection(Connection::new("b", "B", ConnectionType::Ethernet));
        let handles: Vec<String> = backend
            .list_connections()
            .unwrap()
            .into_iter()
            .filter_map(|c| c.uuid)
            .collect();

        backend.fail(Operation::Delete, Some(&handles[1]), "busy");
        assert!(backend.delete_connection(&handles[0]).is_ok());
        assert!(matches!(
            backend.delete_connection(&handles[1]),
            Err(NetworkError::Backend(msg)) if msg == "busy"
        ));

        backend.clear_failures();
        assert!(backend.delete_connection(&handles[1]).is_ok());
    }

    #[test]
    fn test_scripted_activation() {
        let backend = MemoryBackend::new()
            .with_port(Port::new("/memory/port/1", "port1", PortType::Ethernet))
            .with_connection(Connection::new("c1", "Test1", ConnectionType::Ethernet));
        let uuid = backend.list_connections().unwrap()[0].uuid.clone().unwrap();

        backend.script_activation(Activation::Pending {
            active_connection: "ac1".to_string(),
        });
        let first = backend
            .activate_connection(&uuid, Some("/memory/port/1".to_string()))
            .unwrap();
        assert_eq!(
            first,
            Activation::Pending {
                active_connection: "ac1".to_string()
            }
        );
        assert_eq!(
            backend.activate_connection(&uuid, None).unwrap(),
            Activation::Completed
        );

        let active = backend.list_active_connections().unwrap();
        let ac1 = active.iter().find(|a| a.uuid == "ac1").unwrap();
        assert_eq!(ac1.status, ActiveConnectionStatus::Activating);
        assert_eq!(ac1.port_uuids, vec!["/memory/port/1"]);
    }

    #[test]
    fn test_calls_are_recorded_in_order() {
        let backend = MemoryBackend::new();
        backend.list_ports().unwrap();
        let _ = backend.delete_connection("/memory/connection/9");
        backend.unsubscribe();

        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::ListPorts,
                BackendCall::Delete {
                    uuid: "/memory/connection/9".to_string()
                },
                BackendCall::Unsubscribe,
            ]
        );
    }

    #[test]
    fn test_emit_without_subscriber() {
        let backend = MemoryBackend::new();
        assert!(!backend.emit(BackendEvent::PortRemoved {
            uuid: "x".to_string()
        }));
    }
}
