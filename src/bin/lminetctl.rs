//! lminetctl - inspect and drive NetworkManager through lminet
//!
//! Reads ports, connections, active connections and jobs from the synced
//! network state, and applies connections or autoconnect changes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use liblminet::config::NetworkConfig;
use liblminet::logging;
use liblminet::network::change_listener;
use liblminet::{
    ActivationResult, Backend, Connection, Job, JobState, Network, NmBackend, Port,
    PortOperatingStatus,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "lminetctl")]
#[command(version)]
#[command(about = "Inspect and apply NetworkManager configuration through lminet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to /etc/lminet/lminet.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List ports
    Ports,
    /// List connections
    Connections,
    /// List active connections
    Active,
    /// List jobs
    Jobs,
    /// Apply a connection
    Activate {
        /// Connection id
        connection: String,
        /// Port to apply the connection on
        #[arg(short, long)]
        port: Option<String>,
        /// Wait for the activation job to finish
        #[arg(short, long)]
        wait: bool,
        /// Seconds to wait for the job
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
    /// Enable or disable autoconnect of a connection on a port
    Autoconnect {
        connection: String,
        port: String,
        state: Switch,
    },
    /// Delete a connection, slaves first
    Delete { connection: String },
    /// Print changes until interrupted
    Watch,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NetworkConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => NetworkConfig::load_or_default(NetworkConfig::default_path())?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    logging::init(&config.logging);

    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            debug!("Not running as root; NetworkManager may refuse changes");
        }
    }

    let json = cli.json;
    match cli.command {
        Command::Watch => watch(config).await,
        command => tokio::task::spawn_blocking(move || run(command, &config, json)).await?,
    }
}

/// Starts the network; blocks until the initial enumeration finished
fn start(config: &NetworkConfig) -> Result<Network> {
    let backend = NmBackend::connect().context("Failed to connect to NetworkManager")?;
    let network = Network::start(Arc::new(backend) as Arc<dyn Backend>, config)?;
    Ok(network)
}

fn run(command: Command, config: &NetworkConfig, json: bool) -> Result<()> {
    let network = start(config)?;

    match command {
        Command::Ports => {
            let state = network.lock();
            print_list(state.ports(), json, print_port)
        }
        Command::Connections => {
            let state = network.lock();
            print_list(state.connections(), json, |c| {
                print_connection(c, state.resolved_port(c).as_deref())
            })
        }
        Command::Active => {
            let state = network.lock();
            print_list(state.active_connections(), json, |active| {
                println!(
                    "{:<48} {:<14} {:<38} {}",
                    active.uuid,
                    active.status.to_string(),
                    active.connection.as_deref().unwrap_or("-"),
                    active.ports.join(",")
                );
            })
        }
        Command::Jobs => {
            let mut state = network.lock();
            print_list(state.enumerate_jobs(), json, print_job)
        }
        Command::Activate {
            connection,
            port,
            wait,
            timeout,
        } => {
            let result = network.lock().activate(port.as_deref(), &connection)?;
            match result {
                ActivationResult::Completed => println!("Connection {} applied", connection),
                ActivationResult::JobStarted(id) => {
                    println!("Connection {} activating, job {}", connection, id);
                    if wait {
                        wait_for_job(&network, id, Duration::from_secs(timeout))?;
                    }
                }
            }
            Ok(())
        }
        Command::Autoconnect {
            connection,
            port,
            state,
        } => {
            let enable = matches!(state, Switch::On);
            network.lock().set_autoconnect(&port, &connection, enable)?;
            println!(
                "Autoconnect of {} on {} {}",
                connection,
                port,
                if enable { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Command::Delete { connection } => {
            network.lock().delete_connection(&connection)?;
            println!("Connection {} deleted", connection);
            Ok(())
        }
        Command::Watch => bail!("watch needs the async runtime"),
    }
}

fn wait_for_job(network: &Network, id: u64, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        network.sync()?;
        let (state, errors) = {
            let guard = network.lock();
            let job = guard
                .job(id)
                .with_context(|| format!("Job {} disappeared", id))?;
            (job.state, job.errors.clone())
        };
        match state {
            JobState::FinishedOk => {
                println!("Job {} finished", id);
                return Ok(());
            }
            state if state.is_terminal() => {
                bail!("Job {} {}: {}", id, state, errors.join("; "));
            }
            _ if Instant::now() >= deadline => bail!("Job {} still {} after {:?}", id, state, timeout),
            _ => thread::sleep(Duration::from_millis(200)),
        }
    }
}

async fn watch(config: NetworkConfig) -> Result<()> {
    let network = tokio::task::spawn_blocking(move || start(&config)).await??;
    info!("Watching {} for changes", network.backend_name());

    {
        let mut state = network.lock();
        state.set_port_added_listener(Some(Box::new(|port: &Port| {
            println!("port added: {} ({})", port.id, port.kind)
        })));
        state.set_port_deleted_listener(Some(Box::new(|port: &Port| {
            println!("port removed: {}", port.id)
        })));
        state.set_port_changed_listener(Some(Box::new(change_listener(
            |port: &Port| port.operating_status,
            |port: &Port, before: PortOperatingStatus| {
                if port.operating_status != before {
                    println!("port {}: {} -> {}", port.id, before, port.operating_status);
                }
            },
        ))));
        state.set_connection_added_listener(Some(Box::new(|c: &Connection| {
            println!("connection added: {} ({})", c.id, c.name)
        })));
        state.set_connection_deleted_listener(Some(Box::new(|c: &Connection| {
            println!("connection removed: {}", c.id)
        })));
        state.set_job_changed_listener(Some(Box::new(change_listener(
            |job: &Job| job.state,
            |job: &Job, before: JobState| {
                if job.state != before {
                    println!("job {}: {} -> {}", job.id, before, job.state);
                }
            },
        ))));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Interrupted, stopping");

    // Dropping joins the event thread
    tokio::task::spawn_blocking(move || drop(network)).await?;
    Ok(())
}

fn print_list<T, F>(items: &[T], json: bool, mut row: F) -> Result<()>
where
    T: Serialize,
    F: FnMut(&T),
{
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    if items.is_empty() {
        warn!("Nothing to show");
    }
    items.iter().for_each(|item| row(item));
    Ok(())
}

fn print_port(port: &Port) {
    println!(
        "{:<16} {:<10} {:<14} {:<18} {}",
        port.id,
        port.kind.to_string(),
        port.operating_status.to_string(),
        port.hw_address().unwrap_or("-"),
        port.ipconfig
            .addresses
            .iter()
            .map(|a| format!("{}/{}", a.addr, a.prefix))
            .collect::<Vec<_>>()
            .join(",")
    );
}

fn print_connection(connection: &Connection, port: Option<&str>) {
    println!(
        "{:<38} {:<24} {:<10} {:<6} {:<12} {}",
        connection.id,
        connection.name,
        connection.kind.to_string(),
        if connection.autoconnect { "auto" } else { "-" },
        port.unwrap_or("-"),
        connection.master_id.as_deref().unwrap_or("")
    );
}

fn print_job(job: &Job) {
    println!(
        "{:<6} {:<12} {:>4}% {}",
        job.id,
        job.state.to_string(),
        job.percent_complete(),
        job.name
    );
}
