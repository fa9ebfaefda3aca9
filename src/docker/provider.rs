//! bollard-backed container provider.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, EventMessage};
use bollard::system::EventsOptions;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::docker::{
    ContainerEvent, ContainerFilter, ContainerProvider, ContainerRecord, PROJECT_LABEL,
};
use crate::error::ProviderError;

/// Buffered events before the Docker pump waits on the reconciler.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connect to the local Docker daemon and make sure it answers.
///
/// Tries bollard's defaults first (which honour `DOCKER_HOST`), then the
/// rootless socket at `$XDG_RUNTIME_DIR/docker.sock`.
pub async fn connect_docker() -> Result<Docker, ProviderError> {
    let default_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    #[cfg(unix)]
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        let socket = std::path::Path::new(&runtime_dir).join("docker.sock");
        if socket.exists()
            && let Ok(docker) = Docker::connect_with_socket(
                &socket.to_string_lossy(),
                120,
                bollard::API_DEFAULT_VERSION,
            )
            && docker.ping().await.is_ok()
        {
            tracing::debug!("Connected to rootless Docker at {}", socket.display());
            return Ok(docker);
        }
    }

    Err(ProviderError::DockerNotAvailable {
        reason: default_error,
    })
}

/// Container provider backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerProvider {
    docker: Docker,
}

impl DockerProvider {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub async fn connect() -> Result<Self, ProviderError> {
        Ok(Self::new(connect_docker().await?))
    }
}

#[async_trait]
impl ContainerProvider for DockerProvider {
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, ProviderError> {
        let options = ListContainersOptions {
            all: false,
            filters: list_filters(filter),
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ProviderError::ListFailed {
                reason: e.to_string(),
            })?;

        Ok(summaries.into_iter().map(record_from_summary).collect())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ContainerEvent>, ProviderError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let options = EventsOptions::<String> {
                filters: HashMap::from([
                    ("type".to_string(), vec!["container".to_string()]),
                    ("event".to_string(), vec!["start".to_string()]),
                ]),
                ..Default::default()
            };

            let mut stream = docker.events(Some(options));
            while let Some(item) = stream.next().await {
                match item {
                    Ok(message) => {
                        if let Some(event) = event_from_message(message)
                            && tx.send(event).await.is_err()
                        {
                            // Receiver dropped; nobody is listening any more.
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Docker event stream failed: {}", e);
                        break;
                    }
                }
            }

            tracing::warn!("Docker event stream ended");
        });

        Ok(rx)
    }
}

fn list_filters(filter: &ContainerFilter) -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::from([("status".to_string(), vec!["running".to_string()])]);
    match filter {
        ContainerFilter::AllProjects => {
            filters.insert("label".to_string(), vec![PROJECT_LABEL.to_string()]);
        }
        ContainerFilter::Project(project) => {
            filters.insert(
                "label".to_string(),
                vec![format!("{}={}", PROJECT_LABEL, project)],
            );
        }
        ContainerFilter::Id(id) => {
            filters.insert("id".to_string(), vec![id.clone()]);
        }
    }
    filters
}

fn record_from_summary(summary: ContainerSummary) -> ContainerRecord {
    // Docker lists a port once per bound host address; keep the first.
    let mut ports: Vec<u16> = Vec::new();
    for port in summary.ports.unwrap_or_default() {
        if !ports.contains(&port.private_port) {
            ports.push(port.private_port);
        }
    }

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
        network_mode: summary
            .host_config
            .and_then(|h| h.network_mode)
            .unwrap_or_default(),
        ports,
    }
}

fn event_from_message(message: EventMessage) -> Option<ContainerEvent> {
    let actor = message.actor?;
    Some(ContainerEvent {
        action: message.action.unwrap_or_default(),
        actor_id: actor.id?,
        attributes: actor.attributes.unwrap_or_default(),
    })
}
