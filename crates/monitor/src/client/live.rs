//! Live — bollard-backed [`ContainerRuntime`].

use crate::client::runtime::{ContainerRuntime, RuntimeFuture};
use crate::docker::client::DockerClient;
use crate::docker::container::ContainerInfo;
use crate::docker::event::EventStream;
use crate::docker::stream::FrameStream;

pub struct LiveRuntime {
    docker: DockerClient,
}

impl LiveRuntime {
    pub fn new(docker: DockerClient) -> Self {
        Self { docker }
    }

    pub fn docker(&self) -> &DockerClient {
        &self.docker
    }
}

impl ContainerRuntime for LiveRuntime {
    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>> {
        Box::pin(self.docker.list_running())
    }

    fn inspect<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ContainerInfo> {
        Box::pin(self.docker.inspect(name))
    }

    fn stream_logs(&self, name: &str, since: i64) -> FrameStream {
        self.docker.stream_logs(name, since)
    }

    fn tail_logs<'a>(&'a self, name: &'a str, lines: usize) -> RuntimeFuture<'a, String> {
        Box::pin(self.docker.tail_logs(name, lines))
    }

    fn restart<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(self.docker.restart_container(name))
    }

    fn stop<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(self.docker.stop_container(name))
    }

    fn events(&self) -> EventStream {
        self.docker.container_events()
    }
}
