//! Process-level sequencing: credentials, refresh timer, sweep, events.

use std::future::Future;
use std::sync::Arc;

use crate::auth::CredentialManager;
use crate::config::Config;
use crate::docker::ContainerProvider;
use crate::error::ProviderError;
use crate::npm::ProxyManagerApi;
use crate::proxy_host::ProxyHostClient;
use crate::reconcile::{Reconciler, SweepReport, WatchExit};

fn build_reconciler(
    config: &Config,
    provider: Arc<dyn ContainerProvider>,
    api: Arc<dyn ProxyManagerApi>,
) -> (Arc<CredentialManager>, Reconciler) {
    let credentials = Arc::new(CredentialManager::new(
        Arc::clone(&api),
        config.npm.credential.clone(),
    ));
    tracing::info!(
        "Authenticating against {} with {}",
        config.npm.base_url,
        config.npm.credential.kind()
    );

    let proxy_hosts = Arc::new(ProxyHostClient::new(api, Arc::clone(&credentials)));
    let reconciler = Reconciler::new(provider, proxy_hosts, Arc::new(config.reconcile.clone()));
    (credentials, reconciler)
}

/// Run the startup sweep once and return its report.
pub async fn run_sweep(
    config: &Config,
    provider: Arc<dyn ContainerProvider>,
    api: Arc<dyn ProxyManagerApi>,
) -> Result<SweepReport, ProviderError> {
    let (_, reconciler) = build_reconciler(config, provider, api);
    reconciler.sweep().await
}

/// Run until `shutdown` resolves.
///
/// Starts the refresh timer, subscribes to events, sweeps, then handles
/// events. The subscription is opened before the sweep so starts during
/// the sweep are queued, but they are only processed once it is done.
/// Returns an error when the event stream ends on its own.
pub async fn run_service(
    config: &Config,
    provider: Arc<dyn ContainerProvider>,
    api: Arc<dyn ProxyManagerApi>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ProviderError> {
    let (credentials, reconciler) = build_reconciler(config, Arc::clone(&provider), api);

    let refresh = config.npm.refresh_interval.map(|period| {
        tracing::info!("Refreshing the API token every {:?}", period);
        credentials.spawn_refresh_task(period)
    });
    if refresh.is_none() {
        tracing::info!("Periodic token refresh disabled");
    }

    let result: Result<(), ProviderError> = async {
        let events = provider.subscribe_events().await?;

        match reconciler.sweep().await {
            Ok(report) if report.has_failures() => {
                tracing::warn!("Startup sweep had failures: {:?}", report.failed);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Startup sweep could not list containers: {}", e),
        }

        tracing::info!("Watching for container starts");
        match reconciler.watch(events, shutdown).await {
            WatchExit::Shutdown => Ok(()),
            WatchExit::StreamEnded => Err(ProviderError::EventStream {
                reason: "event stream closed by the daemon".to_string(),
            }),
        }
    }
    .await;

    if let Some(task) = refresh {
        task.stop().await;
    }
    tracing::info!("Token state at exit: {}", credentials.state().await);
    result
}
