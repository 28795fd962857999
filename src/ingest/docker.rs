//! Docker Engine implementation of [`ContainerRuntime`].

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::models::EventMessage;
use bollard::system::EventsOptions;
use futures::StreamExt;

use super::runtime::{ContainerRuntime, EventStream};
use crate::error::RuntimeError;
use crate::events::{ContainerAction, ContainerEvent};

/// Talks to the local Docker daemon (socket or `DOCKER_HOST`).
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using the platform's local defaults.
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerEvent>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            filters: HashMap::from([("status".to_string(), vec!["running".to_string()])]),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::List(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                ContainerEvent::new(
                    c.id.unwrap_or_default(),
                    ContainerAction::Start,
                    c.labels.unwrap_or_default(),
                )
            })
            .collect())
    }

    fn events(&self) -> EventStream {
        let options = EventsOptions::<String> {
            filters: HashMap::from([
                ("type".to_string(), vec!["container".to_string()]),
                (
                    "event".to_string(),
                    vec!["start".to_string(), "stop".to_string()],
                ),
            ]),
            ..Default::default()
        };

        self.docker
            .events(Some(options))
            .filter_map(|item| async move {
                match item {
                    Ok(msg) => to_container_event(msg).map(Ok),
                    Err(e) => Some(Err(RuntimeError::Stream(e.to_string()))),
                }
            })
            .boxed()
    }
}

/// Maps a daemon event; actions other than `start`/`stop` are dropped.
fn to_container_event(msg: EventMessage) -> Option<ContainerEvent> {
    let native = msg.action.unwrap_or_default();
    let Some(action) = ContainerAction::from_native(&native) else {
        tracing::debug!(action = %native, "skipping unmapped container action");
        return None;
    };

    let actor = msg.actor.unwrap_or_default();
    Some(ContainerEvent::new(
        actor.id.unwrap_or_default(),
        action,
        actor.attributes.unwrap_or_default(),
    ))
}
