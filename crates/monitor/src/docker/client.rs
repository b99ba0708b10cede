//! Docker client — core struct, constructor, error types.
//!
//! Domain methods live in sibling modules (`container`, `event`) which add
//! `impl DockerClient` blocks.

use bollard::Docker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Stream closed")]
    StreamClosed,
    #[error("Bollard error: {0}")]
    BollardError(#[from] bollard::errors::Error),
}

impl DockerError {
    /// Map a bollard error for an operation on `container`, turning the
    /// daemon's 404/403 answers into the matching variants.
    pub(crate) fn for_container(err: bollard::errors::Error, container: &str) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                DockerError::ContainerNotFound(container.to_string())
            }
            bollard::errors::Error::DockerResponseServerError { status_code: 403, .. } => {
                DockerError::PermissionDenied
            }
            other => DockerError::BollardError(other),
        }
    }

    /// True when retrying the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DockerError::ContainerNotFound(_) | DockerError::PermissionDenied)
    }
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    /// `pub(super)` so that domain modules in sibling files can call
    /// bollard APIs directly.
    pub(super) client: Docker,
    address: String,
}

impl DockerClient {
    /// Connect to `address`: `unix://` or a bare socket path, `tcp://` or
    /// `http://`, or empty for bollard's defaults.
    pub fn connect(address: &str) -> Result<Self, DockerError> {
        let address = address.trim();
        let connection = if address.is_empty() {
            Docker::connect_with_defaults()
        } else if let Some(path) = socket_path(address) {
            Docker::connect_with_socket(path, REQUEST_TIMEOUT_SECS, &bollard::API_DEFAULT_VERSION)
        } else if address.starts_with("tcp://") || address.starts_with("http://") {
            Docker::connect_with_http(address, REQUEST_TIMEOUT_SECS, &bollard::API_DEFAULT_VERSION)
        } else {
            return Err(DockerError::ConnectionFailed(format!(
                "unsupported Docker address '{}', expected unix://, tcp:// or http://",
                address
            )));
        }
        .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?;

        Ok(DockerClient {
            client: connection,
            address: address.to_string(),
        })
    }

    /// The address this client was configured with (empty means defaults).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Round-trip to the daemon; used at boot to fail fast on a dead socket.
    pub async fn ping(&self) -> Result<(), DockerError> {
        self.client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DockerError::ConnectionFailed(e.to_string()))
    }

    /// The daemon's own host name, as reported by `docker info`.
    pub async fn daemon_name(&self) -> Result<Option<String>, DockerError> {
        let info = self.client.info().await?;
        Ok(info.name.filter(|name| !name.trim().is_empty()))
    }
}

const REQUEST_TIMEOUT_SECS: u64 = 120;

fn socket_path(address: &str) -> Option<&str> {
    match address.strip_prefix("unix://") {
        Some(path) => Some(path),
        None if address.starts_with('/') => Some(address),
        None => None,
    }
}
