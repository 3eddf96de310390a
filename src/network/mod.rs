//! The network: entity graph, its lock and the backend event loop
//!
//! `Network::start` spawns one background thread. The thread subscribes to
//! the backend, loads the initial entity graph and then applies backend
//! events one at a time, each under the network lock. Foreground callers
//! take the same lock through `Network::lock`.

mod jobs;
mod listeners;
mod state;

pub use listeners::{
    change_listener, BoxedChangeListener, ChangeListener, DynChangeListener, EntityListener,
    FnChangeListener,
};
pub use state::{ActivationResult, NetworkState};

use crate::backend::{Backend, BackendEvent, EventSink};
use crate::config::NetworkConfig;
use crate::error::{NetworkError, NetworkResult};
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Message consumed by the event loop
#[derive(Debug)]
pub(crate) enum LoopMessage {
    Backend(BackendEvent),
    /// Answered once every message queued before it has been handled
    Barrier(oneshot::Sender<()>),
    Stop,
}

/// Network context
///
/// Dropping it stops the event loop and unsubscribes from the backend.
pub struct Network {
    state: Arc<Mutex<NetworkState>>,
    backend: Arc<dyn Backend>,
    tx: mpsc::UnboundedSender<LoopMessage>,
    worker: Option<JoinHandle<()>>,
}

/// Exclusive access to the entity graph
pub struct NetworkGuard<'a> {
    guard: MutexGuard<'a, NetworkState>,
}

impl Deref for NetworkGuard<'_> {
    type Target = NetworkState;

    fn deref(&self) -> &NetworkState {
        &self.guard
    }
}

impl DerefMut for NetworkGuard<'_> {
    fn deref_mut(&mut self) -> &mut NetworkState {
        &mut self.guard
    }
}

fn lock_state(state: &Mutex<NetworkState>) -> MutexGuard<'_, NetworkState> {
    // The graph is a cache of backend state; a panicking listener leaves it usable
    state.lock().unwrap_or_else(|poisoned| {
        warn!("Network lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl Network {
    /// Starts the event loop and waits for the initial enumeration
    pub fn start(backend: Arc<dyn Backend>, config: &NetworkConfig) -> NetworkResult<Self> {
        info!("Starting network on {} backend", backend.name());

        let state = Arc::new(Mutex::new(NetworkState::new(
            backend.clone(),
            config.jobs.clone(),
        )));
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = sync_channel(1);

        let worker = thread::Builder::new().name("lminet-events".to_string()).spawn({
            let state = state.clone();
            let backend = backend.clone();
            let sink = EventSink::new(tx.clone());
            move || run(backend, state, sink, rx, ready_tx)
        })?;

        let mut network = Self {
            state,
            backend,
            tx,
            worker: Some(worker),
        };

        match ready_rx.recv_timeout(config.backend.startup_timeout()) {
            Ok(Ok(())) => {
                info!("Network started");
                Ok(network)
            }
            Ok(Err(e)) => {
                error!("Network start-up failed: {}", e);
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                error!("Backend did not finish start-up in time");
                // The loop exits on its own once the backend returns
                network.worker.take();
                Err(NetworkError::Backend(
                    "Timed out waiting for backend start-up".to_string(),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => Err(NetworkError::Backend(
                "Event loop exited during start-up".to_string(),
            )),
        }
    }

    /// Takes the network lock
    ///
    /// Events are not applied while the guard is alive.
    pub fn lock(&self) -> NetworkGuard<'_> {
        NetworkGuard {
            guard: lock_state(&self.state),
        }
    }

    /// Waits until every backend event queued so far has been applied
    ///
    /// Must not be called while holding the lock.
    pub fn sync(&self) -> NetworkResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(LoopMessage::Barrier(done_tx))
            .map_err(|_| NetworkError::Backend("Event loop is not running".to_string()))?;
        done_rx
            .blocking_recv()
            .map_err(|_| NetworkError::Backend("Event loop stopped".to_string()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        debug!("Stopping network");
        self.backend.unsubscribe();
        let _ = self.tx.send(LoopMessage::Stop);

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("Event loop thread panicked");
            }
        }
        info!("Network stopped");
    }
}

fn run(
    backend: Arc<dyn Backend>,
    state: Arc<Mutex<NetworkState>>,
    sink: EventSink,
    mut rx: mpsc::UnboundedReceiver<LoopMessage>,
    ready: SyncSender<NetworkResult<()>>,
) {
    let startup = backend
        .subscribe(sink)
        .and_then(|()| lock_state(&state).load());
    let failed = startup.is_err();
    let _ = ready.send(startup);
    if failed {
        return;
    }

    while let Some(message) = rx.blocking_recv() {
        match message {
            LoopMessage::Backend(event) => lock_state(&state).apply_event(event),
            LoopMessage::Barrier(done) => {
                let _ = done.send(());
            }
            LoopMessage::Stop => break,
        }
    }
    debug!("Event loop finished");
}
