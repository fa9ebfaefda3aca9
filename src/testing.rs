//! In-memory stand-ins for Docker and the proxy-manager API.
//!
//! Provides:
//! - [`StubProvider`]: a container provider over a fixed container list
//!   with scripted events
//! - [`StubProxyApi`]: a proxy-manager API with scripted token and
//!   proxy-host outcomes and call counters
//! - [`compose_container`] / [`start_event`]: record builders
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npm_autoproxy::testing::{StubProvider, StubProxyApi, compose_container};
//!
//! let provider = StubProvider::new(vec![compose_container(
//!     "c1", "ix-radarr_radarr_1", "ix-radarr", "radarr", &[7878],
//! )]);
//! let api = Arc::new(StubProxyApi::new());
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use crate::docker::{
    ContainerEvent, ContainerFilter, ContainerProvider, ContainerRecord, PROJECT_LABEL,
    SERVICE_LABEL,
};
use crate::error::{ApiError, ProviderError};
use crate::npm::{ApiResponse, ProxyHostRequest, ProxyManagerApi, TokenGrant};

/// A running compose container on the default bridge network.
pub fn compose_container(
    id: &str,
    name: &str,
    project: &str,
    service: &str,
    ports: &[u16],
) -> ContainerRecord {
    ContainerRecord {
        id: id.to_string(),
        names: vec![format!("/{}", name.trim_start_matches('/'))],
        labels: HashMap::from([
            (PROJECT_LABEL.to_string(), project.to_string()),
            (SERVICE_LABEL.to_string(), service.to_string()),
        ]),
        network_mode: "bridge".to_string(),
        ports: ports.to_vec(),
    }
}

/// A `start` event for a container of `project`.
pub fn start_event(id: &str, project: &str) -> ContainerEvent {
    ContainerEvent {
        action: "start".to_string(),
        actor_id: id.to_string(),
        attributes: HashMap::from([(PROJECT_LABEL.to_string(), project.to_string())]),
    }
}

/// Container provider over an in-memory list.
///
/// Events passed to [`with_events`](Self::with_events) are delivered on
/// subscribe, after which the channel closes.
pub struct StubProvider {
    containers: Mutex<Vec<ContainerRecord>>,
    events: Mutex<Vec<ContainerEvent>>,
    failing: Mutex<Option<String>>,
    list_calls: AtomicU32,
}

impl StubProvider {
    pub fn new(containers: Vec<ContainerRecord>) -> Self {
        Self {
            containers: Mutex::new(containers),
            events: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
            list_calls: AtomicU32::new(0),
        }
    }

    pub fn with_events(self, events: Vec<ContainerEvent>) -> Self {
        *self.events.lock().expect("events lock") = events;
        self
    }

    /// Make every listing fail with `reason`.
    pub fn set_failing(&self, reason: impl Into<String>) {
        *self.failing.lock().expect("failing lock") = Some(reason.into());
    }

    pub fn remove_container(&self, id: &str) {
        self.containers
            .lock()
            .expect("containers lock")
            .retain(|c| c.id != id);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContainerProvider for StubProvider {
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self.failing.lock().expect("failing lock").clone() {
            return Err(ProviderError::ListFailed { reason });
        }

        let containers = self.containers.lock().expect("containers lock");
        Ok(containers
            .iter()
            .filter(|c| match filter {
                ContainerFilter::AllProjects => c.project().is_some(),
                ContainerFilter::Project(project) => c.project() == Some(project.as_str()),
                ContainerFilter::Id(id) => &c.id == id,
            })
            .cloned()
            .collect())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ContainerEvent>, ProviderError> {
        let events = std::mem::take(&mut *self.events.lock().expect("events lock"));
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event, so this never waits.
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }
}

#[derive(Default)]
struct StubApiState {
    token_lifetime: Option<TimeDelta>,
    create_failure: Option<ApiError>,
    refresh_failure: Option<ApiError>,
    proxy_host_status: Option<u16>,
    proxy_host_failure: Option<ApiError>,
    last_refresh_bearer: Option<String>,
    proxy_host_requests: Vec<(String, ProxyHostRequest)>,
}

/// Scripted proxy-manager API.
///
/// Issues tokens `token-1`, `token-2`, ... valid for an hour unless
/// [`set_token_lifetime`](Self::set_token_lifetime) says otherwise, and
/// answers proxy-host creation with 201 unless told otherwise.
#[derive(Default)]
pub struct StubProxyApi {
    state: Mutex<StubApiState>,
    issued: AtomicU32,
    create_calls: AtomicU32,
    refresh_calls: AtomicU32,
    proxy_host_calls: AtomicU32,
}

impl StubProxyApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StubApiState> {
        self.state.lock().expect("stub api lock")
    }

    fn issue(&self) -> TokenGrant {
        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        let lifetime = self.state().token_lifetime.unwrap_or(TimeDelta::hours(1));
        TokenGrant {
            token: SecretString::from(format!("token-{n}")),
            expires: Utc::now() + lifetime,
        }
    }

    pub fn set_token_lifetime(&self, lifetime: TimeDelta) {
        self.state().token_lifetime = Some(lifetime);
    }

    pub fn fail_create(&self, error: ApiError) {
        self.state().create_failure = Some(error);
    }

    pub fn fail_refresh(&self, error: ApiError) {
        self.state().refresh_failure = Some(error);
    }

    /// Answer proxy-host creation with `status`.
    pub fn set_proxy_host_status(&self, status: u16) {
        self.state().proxy_host_status = Some(status);
    }

    pub fn fail_proxy_host(&self, error: ApiError) {
        self.state().proxy_host_failure = Some(error);
    }

    /// Clear every scripted failure.
    pub fn recover(&self) {
        let mut state = self.state();
        state.create_failure = None;
        state.refresh_failure = None;
        state.proxy_host_failure = None;
        state.proxy_host_status = None;
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    pub fn proxy_host_calls(&self) -> u32 {
        self.proxy_host_calls.load(Ordering::Relaxed)
    }

    pub fn last_refresh_bearer(&self) -> Option<String> {
        self.state().last_refresh_bearer.clone()
    }

    /// Every proxy-host request received, in order.
    pub fn proxy_host_requests(&self) -> Vec<ProxyHostRequest> {
        self.state()
            .proxy_host_requests
            .iter()
            .map(|(_, req)| req.clone())
            .collect()
    }

    /// Bearer tokens presented with proxy-host requests, in order.
    pub fn proxy_host_bearers(&self) -> Vec<String> {
        self.state()
            .proxy_host_requests
            .iter()
            .map(|(bearer, _)| bearer.clone())
            .collect()
    }
}

#[async_trait]
impl ProxyManagerApi for StubProxyApi {
    async fn create_token(
        &self,
        _identity: &str,
        _secret: &SecretString,
    ) -> Result<TokenGrant, ApiError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.state().create_failure.clone() {
            return Err(err);
        }
        Ok(self.issue())
    }

    async fn refresh_token(&self, bearer: &SecretString) -> Result<TokenGrant, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        let failure = {
            let mut state = self.state();
            state.last_refresh_bearer = Some(bearer.expose_secret().to_string());
            state.refresh_failure.clone()
        };
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.issue())
    }

    async fn create_proxy_host(
        &self,
        bearer: &SecretString,
        request: &ProxyHostRequest,
    ) -> Result<ApiResponse, ApiError> {
        self.proxy_host_calls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state();
        state
            .proxy_host_requests
            .push((bearer.expose_secret().to_string(), request.clone()));

        if let Some(err) = state.proxy_host_failure.clone() {
            return Err(err);
        }
        Ok(ApiResponse {
            status: state.proxy_host_status.unwrap_or(201),
            body: String::new(),
        })
    }
}
