//! Hosts — which Docker daemons are monitored and how they are named.
//!
//! `docker_host` is a comma-separated list of addresses, each optionally
//! followed by `|label`. The local socket is added when it is configured,
//! when it exists, or when nothing else is listed.

use std::fmt;

pub const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub address: String,
    pub label: Option<String>,
}

impl HostSpec {
    fn new(address: &str, label: Option<&str>) -> Self {
        Self {
            address: address.trim().to_string(),
            label: label.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.address, label),
            None => f.write_str(&self.address),
        }
    }
}

pub fn parse_host_list(list: &str) -> Vec<HostSpec> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('|') {
            Some((address, label)) => HostSpec::new(address, Some(label)),
            None => HostSpec::new(item, None),
        })
        .filter(|spec| !spec.address.is_empty())
        .collect()
}

/// The daemons to connect to, in order, without duplicates.
pub fn resolve_hosts(docker_host: &str, docker_socket: &str, local_socket_exists: bool) -> Vec<HostSpec> {
    let mut hosts: Vec<HostSpec> = Vec::new();
    for spec in parse_host_list(docker_host) {
        if !hosts.iter().any(|h| h.address == spec.address) {
            hosts.push(spec);
        }
    }

    let socket = docker_socket.trim();
    let local = if socket.is_empty() {
        DEFAULT_SOCKET.to_string()
    } else if socket.contains("://") {
        socket.to_string()
    } else {
        format!("unix://{}", socket)
    };
    let wanted = !socket.is_empty() || local_socket_exists || hosts.is_empty();
    if wanted && !hosts.iter().any(|h| h.address == local) {
        hosts.push(HostSpec::new(&local, None));
    }
    hosts
}

/// Path of the local socket, for the existence check.
pub fn local_socket_path(docker_socket: &str) -> String {
    let socket = docker_socket.trim();
    if socket.is_empty() {
        DEFAULT_SOCKET.trim_start_matches("unix://").to_string()
    } else {
        socket.trim_start_matches("unix://").to_string()
    }
}

/// Name used in titles and logs when several hosts are monitored: the
/// label, else the daemon's reported name, else `Host-<number>`.
pub fn host_name(spec: &HostSpec, daemon_name: Option<&str>, number: usize) -> String {
    spec.label
        .clone()
        .or_else(|| daemon_name.map(str::to_string))
        .unwrap_or_else(|| format!("Host-{}", number))
}
