//! Boot — logging init, config load, Docker connection, state creation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use crate::client::LiveRuntime;
use crate::conf::ConfigLoader;
use crate::docker::client::DockerClient;
use crate::docker::host::{host_name, local_socket_path, resolve_hosts, HostSpec};
use crate::notify::Dispatcher;
use crate::state::level::{filter_for, DEFAULT_LEVEL};
use crate::state::{LogControl, MonitorState, SharedState};

/// Read `.env` from the working directory, if there is one. Runs before
/// logging is up, so the caller logs the returned path.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Initialise the tracing / logging subsystem.
///
/// `RUST_LOG` wins and stays fixed. Otherwise the filter starts from
/// `LOG_LEVEL` and follows `settings.log_level` through the returned
/// control.
pub fn init_logging() -> LogControl {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            LogControl::disabled()
        }
        Err(_) => {
            let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
            let (filter, handle) = reload::Layer::new(filter_for(&level));
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            LogControl::new(handle)
        }
    }
}

/// Load config, connect to every Docker host, build one state per host.
///
/// A host that cannot be reached is logged and left out; boot fails only
/// when none is reachable.
pub async fn boot(log_control: LogControl) -> anyhow::Result<Vec<SharedState>> {
    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let loader = ConfigLoader::from_env();
    let snapshot = loader.load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    log_control.apply(&snapshot.settings.log_level);
    info!("Loaded configuration: {}", snapshot.summary());

    let settings = &snapshot.settings;
    let local_exists = Path::new(&local_socket_path(&settings.docker_socket)).exists();
    let specs = resolve_hosts(&settings.docker_host, &settings.docker_socket, local_exists);

    let mut connected: Vec<(HostSpec, DockerClient)> = Vec::new();
    for spec in specs {
        info!("Connecting to Docker daemon at: {}", spec);
        match connect(&spec).await {
            Ok(docker) => {
                info!(address = docker.address(), "Successfully connected to Docker daemon");
                connected.push((spec, docker));
            }
            Err(e) => error!(host = %spec, "Could not connect to Docker: {:#}", e),
        }
    }
    if connected.is_empty() {
        bail!("Could not connect to any Docker host");
    }

    let multi_host = connected.len() > 1;
    let mut named = Vec::with_capacity(connected.len());
    for (number, (spec, docker)) in connected.into_iter().enumerate() {
        let name = if multi_host {
            let daemon = docker.daemon_name().await.unwrap_or_else(|e| {
                warn!(host = %spec, "Could not read the daemon name: {}", e);
                None
            });
            Some(host_name(&spec, daemon.as_deref(), number + 1))
        } else {
            None
        };
        named.push((name, docker));
    }

    let dispatcher = Dispatcher::http().context("Failed to build the notification client")?;
    let mut hosts: Vec<SharedState> = Vec::with_capacity(named.len());
    let mut named = named.into_iter();
    if let Some((name, docker)) = named.next() {
        let mut first = MonitorState::new(snapshot, loader, Arc::new(LiveRuntime::new(docker)), dispatcher)
            .with_log_control(log_control);
        if let Some(name) = name {
            first = first.with_host(name);
        }
        hosts.push(Arc::new(first));
    }
    for (name, docker) in named {
        let name = name.unwrap_or_default();
        let state = hosts[0].sibling(name, Arc::new(LiveRuntime::new(docker)));
        hosts.push(Arc::new(state));
    }
    if multi_host {
        let names: Vec<&str> = hosts.iter().filter_map(|h| h.host()).collect();
        info!(hosts = ?names, "Monitoring several Docker hosts");
    }
    info!("Initialized shared monitor state");

    Ok(hosts)
}

async fn connect(spec: &HostSpec) -> anyhow::Result<DockerClient> {
    let docker = DockerClient::connect(&spec.address)?;
    docker.ping().await.context("Docker daemon did not answer")?;
    Ok(docker)
}
