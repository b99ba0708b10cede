//! Event domain — container lifecycle events from the Docker engine.

use std::collections::HashMap;
use std::pin::Pin;

use bollard::models::EventMessage;
use bollard::query_parameters::EventsOptionsBuilder;
use futures_util::stream::StreamExt;
use tokio_stream::Stream;

use super::client::{DockerClient, DockerError};

/// Lifecycle transitions the supervisor reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    Started { id: String, name: String },
    Stopped { id: String, name: String },
}

impl ContainerEvent {
    pub fn name(&self) -> &str {
        match self {
            ContainerEvent::Started { name, .. } | ContainerEvent::Stopped { name, .. } => name,
        }
    }

    /// Map a raw engine event; anything but start/stop/die is ignored.
    pub fn from_message(message: &EventMessage) -> Option<Self> {
        let action = message.action.as_deref()?;
        let actor = message.actor.as_ref()?;
        let id = actor.id.clone().unwrap_or_default();
        let name = actor
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get("name"))
            .cloned()?;

        match action {
            "start" => Some(ContainerEvent::Started { id, name }),
            "stop" | "die" => Some(ContainerEvent::Stopped { id, name }),
            _ => None,
        }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<ContainerEvent, DockerError>> + Send>>;

impl DockerClient {
    /// Stream container start/stop events.
    pub fn container_events(&self) -> EventStream {
        let mut filters = HashMap::new();
        filters.insert("type", vec!["container"]);
        filters.insert("event", vec!["start", "stop", "die"]);

        let options = EventsOptionsBuilder::default().filters(&filters).build();

        let stream = self.client.events(Some(options)).filter_map(|result| async move {
            match result {
                Ok(message) => ContainerEvent::from_message(&message).map(Ok),
                Err(e) => Some(Err(DockerError::from(e))),
            }
        });
        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    fn message(action: &str, name: Option<&str>) -> EventMessage {
        let attributes = name.map(|n| {
            let mut attrs = HashMap::new();
            attrs.insert("name".to_string(), n.to_string());
            attrs
        });
        EventMessage {
            action: Some(action.to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_event() {
        let event = ContainerEvent::from_message(&message("start", Some("web")));
        assert_eq!(
            event,
            Some(ContainerEvent::Started {
                id: "abc123".to_string(),
                name: "web".to_string()
            })
        );
    }

    #[test]
    fn test_die_event_maps_to_stopped() {
        let event = ContainerEvent::from_message(&message("die", Some("web")));
        assert!(matches!(event, Some(ContainerEvent::Stopped { .. })));
    }

    #[test]
    fn test_other_actions_ignored() {
        assert_eq!(ContainerEvent::from_message(&message("exec_start", Some("web"))), None);
    }

    #[test]
    fn test_event_without_name_ignored() {
        assert_eq!(ContainerEvent::from_message(&message("start", None)), None);
    }
}
