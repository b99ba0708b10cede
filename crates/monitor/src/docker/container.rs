//! Container domain — listing, inspection, log streaming, lifecycle actions.

use super::client::{DockerClient, DockerError};
use super::stream::{convert_bollard_log, FrameStream};

use bollard::models::{ContainerInspectResponse, ContainerSummary};
use bollard::query_parameters::{ListContainersOptions, LogsOptions};
use futures_util::stream::StreamExt;

/// The subset of container state the monitor cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub running: bool,
    /// RFC3339 start time; changes whenever the container is restarted.
    pub started_at: Option<String>,
}

impl From<ContainerSummary> for ContainerInfo {
    fn from(s: ContainerSummary) -> Self {
        let running = s
            .state
            .map(|state| state.to_string().eq_ignore_ascii_case("running"))
            .unwrap_or(false);
        Self {
            id: s.id.unwrap_or_default(),
            name: s
                .names
                .as_deref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or("unknown")
                .to_string(),
            running,
            started_at: None, // Not available in list API
        }
    }
}

impl From<ContainerInspectResponse> for ContainerInfo {
    fn from(details: ContainerInspectResponse) -> Self {
        let state = details.state.as_ref();
        Self {
            id: details.id.clone().unwrap_or_default(),
            name: details
                .name
                .as_deref()
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or("unknown")
                .to_string(),
            running: state.and_then(|s| s.running).unwrap_or(false),
            started_at: state.and_then(|s| s.started_at.clone()),
        }
    }
}

impl DockerClient {
    /// Running containers only.
    pub async fn list_running(&self) -> Result<Vec<ContainerInfo>, DockerError> {
        let options = Some(ListContainersOptions {
            all: false,
            ..Default::default()
        });
        let containers = self.client.list_containers(options).await?;
        Ok(containers.into_iter().map(ContainerInfo::from).collect())
    }

    pub async fn inspect(&self, name: &str) -> Result<ContainerInfo, DockerError> {
        let details = self
            .client
            .inspect_container(name, None)
            .await
            .map_err(|e| DockerError::for_container(e, name))?;
        Ok(ContainerInfo::from(details))
    }

    /// Follow the log stream of `name` starting at `since` (Unix seconds).
    pub fn stream_logs(&self, name: &str, since: i64) -> FrameStream {
        let since = since.clamp(0, i32::MAX as i64) as i32;
        let options = LogsOptions {
            follow: true,
            stdout: true,
            stderr: true,
            since,
            until: 0,
            timestamps: true,
            tail: "0".to_string(),
        };

        let container = name.to_string();
        let stream = self
            .client
            .logs(name, Some(options))
            .map(move |result| match result {
                Ok(output) => Ok(convert_bollard_log(output)),
                Err(e) => Err(DockerError::for_container(e, &container)),
            });
        Box::pin(stream)
    }

    /// Return the last `lines` lines of the container's log as text.
    pub async fn tail_logs(&self, name: &str, lines: usize) -> Result<String, DockerError> {
        let options = LogsOptions {
            follow: false,
            stdout: true,
            stderr: true,
            since: 0,
            until: 0,
            timestamps: false,
            tail: lines.to_string(),
        };

        let mut stream = self.client.logs(name, Some(options));
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(|e| DockerError::for_container(e, name))?;
            text.push_str(&String::from_utf8_lossy(&output.into_bytes()));
        }
        Ok(text)
    }

    pub async fn restart_container(&self, name: &str) -> Result<(), DockerError> {
        self.client
            .restart_container(name, None)
            .await
            .map_err(|e| DockerError::for_container(e, name))
    }

    pub async fn stop_container(&self, name: &str) -> Result<(), DockerError> {
        self.client
            .stop_container(name, None)
            .await
            .map_err(|e| DockerError::for_container(e, name))
    }
}
