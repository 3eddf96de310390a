//! NetworkManager signal reader
//!
//! One detached thread reads every signal NetworkManager emits, turns the
//! interesting ones into `BackendEvent`s and pushes them into the sink.
//! It exits on the first message after the stop flag is raised or after
//! the network has gone away.

use super::convert;
use super::proxies::{
    ACTIVE_INTERFACE, CONNECTION_INTERFACE, DEVICE_INTERFACE, NM_INTERFACE, NM_SERVICE,
    PROPERTIES_INTERFACE, SETTINGS_INTERFACE,
};
use super::Reader;
use crate::backend::{BackendEvent, EventSink};
use crate::error::NetworkResult;
use crate::model::ActiveConnectionInfo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};
use zbus::blocking::MessageIterator;
use zbus::message::Type as MessageType;
use zbus::{MatchRule, Message};
use zvariant::{OwnedObjectPath, OwnedValue};

/// Body of `org.freedesktop.DBus.Properties.PropertiesChanged`
type PropertiesChanged = (String, HashMap<String, OwnedValue>, Vec<String>);

pub(crate) fn spawn(reader: Reader, sink: EventSink, stop: Arc<AtomicBool>) -> NetworkResult<()> {
    let rule = MatchRule::builder()
        .msg_type(MessageType::Signal)
        .sender(NM_SERVICE)?
        .build();
    let messages = MessageIterator::for_match_rule(rule, &reader.bus, Some(256))?;

    thread::Builder::new()
        .name("lminet-nm-signals".to_string())
        .spawn(move || {
            for message in messages {
                if stop.load(Ordering::SeqCst) || sink.is_closed() {
                    break;
                }
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Failed to receive signal: {}", e);
                        continue;
                    }
                };
                for event in translate(&reader, &message) {
                    trace!("NetworkManager event: {}", event.name());
                    if !sink.send(event) {
                        break;
                    }
                }
            }
            debug!("NetworkManager signal reader finished");
        })?;
    Ok(())
}

fn translate(reader: &Reader, message: &Message) -> Vec<BackendEvent> {
    let header = message.header();
    let (Some(interface), Some(member), Some(path)) =
        (header.interface(), header.member(), header.path())
    else {
        return Vec::new();
    };
    let path = path.as_str();

    let result = match (interface.as_str(), member.as_str()) {
        (NM_INTERFACE, "DeviceAdded") => object_argument(message)
            .and_then(|device| reader.read_port(&device))
            .map(|port| vec![BackendEvent::PortAdded(port)]),
        (NM_INTERFACE, "DeviceRemoved") => object_argument(message)
            .map(|uuid| vec![BackendEvent::PortRemoved { uuid }]),
        (SETTINGS_INTERFACE, "NewConnection") => object_argument(message)
            .and_then(|profile| reader.read_connection(&profile))
            .map(|connection| vec![BackendEvent::ConnectionAdded(connection)]),
        (SETTINGS_INTERFACE, "ConnectionRemoved") => object_argument(message)
            .map(|uuid| vec![BackendEvent::ConnectionRemoved { uuid }]),
        (CONNECTION_INTERFACE, "Updated") => reader
            .read_connection(path)
            .map(|connection| vec![BackendEvent::ConnectionUpdated(connection)]),
        (PROPERTIES_INTERFACE, "PropertiesChanged") => properties_changed(reader, message, path),
        _ => Ok(Vec::new()),
    };

    result.unwrap_or_else(|e| {
        debug!("Dropping {}.{} on {}: {}", interface.as_str(), member.as_str(), path, e);
        Vec::new()
    })
}

fn object_argument(message: &Message) -> NetworkResult<String> {
    let path: OwnedObjectPath = message.body().deserialize()?;
    Ok(path.as_str().to_string())
}

fn properties_changed(
    reader: &Reader,
    message: &Message,
    path: &str,
) -> NetworkResult<Vec<BackendEvent>> {
    let (interface, changed, _): PropertiesChanged = message.body().deserialize()?;

    match interface.as_str() {
        ACTIVE_INTERFACE => match reader.read_active(path) {
            Ok(info) => Ok(vec![BackendEvent::ActiveConnectionChanged(info)]),
            // The object is already gone; the changed state is all that is left
            Err(e) => {
                let state = changed
                    .get("State")
                    .and_then(|value| u32::try_from(value).ok())
                    .ok_or(e)?;
                let info = ActiveConnectionInfo::new(path, convert::active_status(state));
                Ok(vec![BackendEvent::ActiveConnectionChanged(info)])
            }
        },
        NM_INTERFACE if changed.contains_key("ActiveConnections") => Ok(vec![
            BackendEvent::ActiveConnectionsChanged(reader.list_active()?),
        ]),
        DEVICE_INTERFACE => Ok(vec![BackendEvent::PortChanged(reader.read_port(path)?)]),
        _ => Ok(Vec::new()),
    }
}
