//! Container metadata provider.
//!
//! The reconciler never talks to Docker directly. It sees immutable
//! [`ContainerRecord`] snapshots and a channel of [`ContainerEvent`]s
//! through the [`ContainerProvider`] trait; [`DockerProvider`] is the
//! bollard-backed implementation.

mod provider;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProviderError;

pub use provider::{DockerProvider, connect_docker};

/// Compose label naming the project (orchestration grouping).
pub const PROJECT_LABEL: &str = "com.docker.compose.project";
/// Compose label naming the service within the project.
pub const SERVICE_LABEL: &str = "com.docker.compose.service";

/// Snapshot of one running container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    /// Display names as reported, usually with a leading `/`.
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
    /// `bridge`, `host`, `none`, `container:<id>`, a network name, ...
    pub network_mode: String,
    /// Container-internal ports, in provider order.
    pub ports: Vec<u16>,
}

impl ContainerRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn project(&self) -> Option<&str> {
        self.label(PROJECT_LABEL)
    }

    pub fn service(&self) -> Option<&str> {
        self.label(SERVICE_LABEL)
    }

    /// First name without the leading slash, or the id when unnamed.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or(&self.id)
    }

    pub fn exposes(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = mode.into();
        self
    }
}

/// Which running containers to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerFilter {
    /// Every container carrying a project label.
    AllProjects,
    /// Containers of one compose project.
    Project(String),
    /// A single container by id.
    Id(String),
}

/// A lifecycle event for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// `start`, `die`, `stop`, ...
    pub action: String,
    pub actor_id: String,
    /// Actor attributes; for containers these include the labels.
    pub attributes: HashMap<String, String>,
}

impl ContainerEvent {
    pub fn is_start(&self) -> bool {
        self.action == "start"
    }

    pub fn project(&self) -> Option<&str> {
        self.attributes.get(PROJECT_LABEL).map(String::as_str)
    }
}

/// Source of container listings and lifecycle events.
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    /// Running containers matching `filter`, in provider order.
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, ProviderError>;

    /// Current metadata of one running container, `None` if it is gone.
    async fn get_container(&self, id: &str) -> Result<Option<ContainerRecord>, ProviderError> {
        let mut found = self
            .list_containers(&ContainerFilter::Id(id.to_string()))
            .await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Subscribe to container events. The channel closes when the
    /// underlying stream ends; it cannot be resumed.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ContainerEvent>, ProviderError>;
}
