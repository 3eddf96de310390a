//! Activation jobs driven by active connection reports

use liblminet::config::JobSettings;
use liblminet::{
    Activation, ActivationResult, ActiveConnectionStatus, AffectedElement, Backend, Connection,
    ConnectionType, Job, JobChanges, JobState, MemoryBackend, Network, NetworkConfig,
    NetworkError, Port, PortType,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn backend() -> Arc<MemoryBackend> {
    let mut port = Port::new("/dev/1", "port1", PortType::Ethernet);
    port.state_reason = Some("Carrier lost".to_string());
    let mut connection = Connection::new("c1", "Wired", ConnectionType::Ethernet);
    connection.port = Some("port1".to_string());
    Arc::new(MemoryBackend::new().with_port(port).with_connection(connection))
}

fn start_with(backend: &Arc<MemoryBackend>, jobs: JobSettings) -> Network {
    let config = NetworkConfig {
        jobs,
        ..Default::default()
    };
    Network::start(backend.clone() as Arc<dyn Backend>, &config).unwrap()
}

fn start_activation(network: &Network, backend: &MemoryBackend) -> u64 {
    backend.script_activation(Activation::Pending {
        active_connection: "ac1".to_string(),
    });
    match network.lock().activate(None, "c1").unwrap() {
        ActivationResult::JobStarted(id) => id,
        ActivationResult::Completed => panic!("activation must be pending"),
    }
}

#[test]
fn test_activation_job_finishes_with_active_connection() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let id = start_activation(&network, &backend);
    let started = {
        let state = network.lock();
        let job = state.job(id).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(
            job.affected_elements,
            vec![
                AffectedElement::ActiveConnection("ac1".to_string()),
                AffectedElement::Port("port1".to_string()),
                AffectedElement::Connection("c1".to_string()),
            ]
        );
        job.last_change_time
    };

    thread::sleep(Duration::from_millis(5));
    assert!(backend.set_active_connection_status("ac1", ActiveConnectionStatus::Activated));
    network.sync().unwrap();

    let state = network.lock();
    let job = state.job(id).unwrap();
    assert_eq!(job.state, JobState::FinishedOk);
    assert!(job.last_change_time > started);
    assert!(job.errors.is_empty());
    assert_eq!(job.percent_complete(), 100);
    assert_eq!(
        state.active_connection("ac1").unwrap().connection.as_deref(),
        Some("c1")
    );
}

#[test]
fn test_completed_activation_starts_no_job() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let result = network.lock().activate(Some("port1"), "c1").unwrap();
    assert_eq!(result, ActivationResult::Completed);
    assert!(network.lock().jobs().is_empty());
}

#[test]
fn test_running_activation_blocks_another() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    start_activation(&network, &backend);
    let second = network.lock().activate(None, "c1");
    assert!(matches!(second, Err(NetworkError::ConnectionActivating(id)) if id == "c1"));
}

#[test]
fn test_failed_activation_collects_port_errors() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let id = start_activation(&network, &backend);
    backend.set_active_connection_status("ac1", ActiveConnectionStatus::Deactivated);
    network.sync().unwrap();

    let state = network.lock();
    assert_eq!(state.job(id).unwrap().state, JobState::Failed);
    assert_eq!(state.job_errors(id).unwrap(), ["Carrier lost".to_string()]);
}

#[test]
fn test_job_listeners_see_lifecycle() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let mut state = network.lock();
        let added = seen.clone();
        state.set_job_added_listener(Some(Box::new(move |job: &Job| {
            added.lock().unwrap().push(format!("added {}", job.state))
        })));
        let changed = seen.clone();
        state.set_job_changed_listener(Some(Box::new(liblminet::network::change_listener(
            |job: &Job| job.state,
            move |job: &Job, before: JobState| {
                changed
                    .lock()
                    .unwrap()
                    .push(format!("{} -> {}", before, job.state))
            },
        ))));
    }

    start_activation(&network, &backend);
    backend.set_active_connection_status("ac1", ActiveConnectionStatus::Activated);
    network.sync().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["added running".to_string(), "running -> finished".to_string()]
    );
}

#[test]
fn test_finished_jobs_expire_after_retention() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let id = start_activation(&network, &backend);
    backend.set_active_connection_status("ac1", ActiveConnectionStatus::Activated);
    network.sync().unwrap();

    let mut state = network.lock();
    let job = state.job(id).unwrap().clone();
    let retention = chrono::TimeDelta::from_std(job.time_before_removal).unwrap();

    assert_eq!(state.cleanup_jobs_at(job.last_change_time + retention), 0);
    assert!(state.job(id).is_some());
    assert_eq!(
        state.cleanup_jobs_at(job.last_change_time + retention + chrono::TimeDelta::seconds(1)),
        1
    );
    assert!(state.job(id).is_none());
}

#[test]
fn test_kept_jobs_survive_cleanup() {
    let backend = backend();
    let network = start_with(
        &backend,
        JobSettings {
            delete_on_completion: true,
            time_before_removal_secs: 0,
        },
    );

    let id = start_activation(&network, &backend);
    network
        .lock()
        .modify_job(
            id,
            JobChanges {
                delete_on_completion: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    backend.set_active_connection_status("ac1", ActiveConnectionStatus::Activated);
    network.sync().unwrap();
    thread::sleep(Duration::from_millis(5));

    let mut state = network.lock();
    assert_eq!(state.enumerate_jobs().len(), 1);
    assert!(!state.job(id).unwrap().delete_on_completion);
}

#[test]
fn test_enumerate_drops_expired_jobs() {
    let backend = backend();
    let network = start_with(
        &backend,
        JobSettings {
            delete_on_completion: true,
            time_before_removal_secs: 0,
        },
    );

    start_activation(&network, &backend);
    backend.set_active_connection_status("ac1", ActiveConnectionStatus::Activated);
    network.sync().unwrap();
    thread::sleep(Duration::from_millis(5));

    assert!(network.lock().enumerate_jobs().is_empty());
}

#[test]
fn test_kill_is_not_supported() {
    let backend = backend();
    let network = start_with(&backend, JobSettings::default());

    let id = start_activation(&network, &backend);
    let state = network.lock();
    assert!(matches!(state.kill_job(id), Err(NetworkError::NotImplemented(_))));
    assert!(matches!(state.kill_job(u64::MAX), Err(NetworkError::JobUnknown(_))));
}
