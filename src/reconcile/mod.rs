//! Reconciliation orchestrator.
//!
//! A startup [`Reconciler::sweep`] walks every running application one at a
//! time; [`Reconciler::watch`] then reacts to container `start` events.
//! Each event is handled in its own task after the settle delay. Events for
//! the same application are not coalesced: two near-simultaneous starts
//! reconcile twice, and the second create is answered with 400, which the
//! proxy-host client treats as already configured.

pub mod plan;
pub mod report;
pub mod service;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::ReconcileConfig;
use crate::docker::{ContainerEvent, ContainerFilter, ContainerProvider, ContainerRecord};
use crate::error::{ProviderError, ReconcileError};
use crate::proxy_host::ProxyHostClient;
use crate::resolver::{NAMESPACE_PREFIX, application_name, application_of};

pub use plan::{PlanEntry, PlanStatus, PlannedHost, group_by_application, plan, plan_application};
pub use report::{ApplicationOutcome, SweepReport};
pub use service::{run_service, run_sweep};

/// Why [`Reconciler::watch`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Shutdown,
    /// The provider closed the event channel; pending handlers were awaited.
    StreamEnded,
}

/// Drives container records through resolver, selector and proxy-host client.
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn ContainerProvider>,
    proxy_hosts: Arc<ProxyHostClient>,
    config: Arc<ReconcileConfig>,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn ContainerProvider>,
        proxy_hosts: Arc<ProxyHostClient>,
        config: Arc<ReconcileConfig>,
    ) -> Self {
        Self {
            provider,
            proxy_hosts,
            config,
        }
    }

    /// Reconcile every running application, sequentially.
    ///
    /// Only the listing itself can fail; per-application errors are logged
    /// and collected in the report.
    pub async fn sweep(&self) -> Result<SweepReport, ProviderError> {
        let records = self
            .provider
            .list_containers(&ContainerFilter::AllProjects)
            .await?;
        let groups = group_by_application(records);
        tracing::info!("Startup sweep over {} applications", groups.len());

        let mut report = SweepReport::default();
        for (application, members) in groups {
            if self.config.is_blacklisted(&application) {
                tracing::info!("Skipping blacklisted application {}", application);
                report.record(&application, ApplicationOutcome::Blacklisted);
                continue;
            }

            match self.reconcile_records(&application, &members).await {
                Ok(outcome) => report.record(&application, outcome),
                Err(e) => {
                    tracing::error!("Failed to reconcile {}: {}", application, e);
                    report.record_failure(&application, e);
                }
            }
        }

        tracing::info!("Startup sweep finished: {}", report);
        Ok(report)
    }

    /// Re-list one application's containers and reconcile it.
    pub async fn reconcile_application(
        &self,
        application: &str,
    ) -> Result<ApplicationOutcome, ReconcileError> {
        if self.config.is_blacklisted(application) {
            return Ok(ApplicationOutcome::Blacklisted);
        }

        let project = format!("{NAMESPACE_PREFIX}{application}");
        let records = self
            .provider
            .list_containers(&ContainerFilter::Project(project))
            .await?;
        self.reconcile_records(application, &records).await
    }

    async fn reconcile_records(
        &self,
        application: &str,
        records: &[ContainerRecord],
    ) -> Result<ApplicationOutcome, ReconcileError> {
        match plan_application(&self.config, application, records)? {
            Some(planned) => {
                tracing::debug!(
                    "Application {} served by container {}",
                    application,
                    planned.container
                );
                let outcome = self.proxy_hosts.ensure_proxy_host(&planned.request).await?;
                Ok(ApplicationOutcome::Configured(outcome))
            }
            None => {
                tracing::info!("No exposed port for application {}, nothing to proxy", application);
                Ok(ApplicationOutcome::NoTarget)
            }
        }
    }

    /// React to one container event.
    ///
    /// Returns the outcome when the event led to a reconciliation, `None`
    /// when it was ignored. Errors are logged here as well.
    pub async fn handle_event(
        &self,
        event: ContainerEvent,
    ) -> Option<Result<ApplicationOutcome, ReconcileError>> {
        if !event.is_start() {
            return None;
        }
        if event.project().and_then(application_name).is_none() {
            tracing::debug!("Ignoring start of {} outside the namespace", event.actor_id);
            return None;
        }

        let record = match self.provider.get_container(&event.actor_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!("Container {} is no longer running, ignoring", event.actor_id);
                return None;
            }
            Err(e) => {
                tracing::warn!("Could not inspect container {}: {}", event.actor_id, e);
                return Some(Err(e.into()));
            }
        };

        let application = application_of(&record)?;
        if self.config.is_blacklisted(&application) {
            tracing::debug!("Ignoring start of blacklisted application {}", application);
            return None;
        }

        tracing::info!(
            "Container {} of {} started, reconciling in {:?}",
            record.display_name(),
            application,
            self.config.settle_delay
        );
        tokio::time::sleep(self.config.settle_delay).await;

        let result = self.reconcile_application(&application).await;
        if let Err(e) = &result {
            tracing::error!("Failed to reconcile {}: {}", application, e);
        }
        Some(result)
    }

    /// Process events until `shutdown` resolves or the channel closes.
    ///
    /// On shutdown in-flight handlers are dropped without being awaited.
    pub async fn watch(
        &self,
        mut events: mpsc::Receiver<ContainerEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> WatchExit {
        tokio::pin!(shutdown);
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Stopping event processing");
                    handlers.abort_all();
                    return WatchExit::Shutdown;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        let reconciler = self.clone();
                        handlers.spawn(async move {
                            reconciler.handle_event(event).await;
                        });
                    }
                    None => break,
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Event handler panicked: {}", e);
                    }
                }
            }
        }

        tracing::warn!("Container event stream ended");
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Event handler panicked: {}", e);
            }
        }
        WatchExit::StreamEnded
    }
}
