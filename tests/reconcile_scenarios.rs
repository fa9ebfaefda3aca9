//! End-to-end reconciliation scenarios over the in-memory provider and API.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;

use npm_autoproxy::auth::{Credential, CredentialManager};
use npm_autoproxy::config::{ReconcileConfig, override_key};
use npm_autoproxy::error::ReconcileError;
use npm_autoproxy::npm::ProxyHostRequest;
use npm_autoproxy::proxy_host::ProxyHostClient;
use npm_autoproxy::reconcile::{ApplicationOutcome, Reconciler, plan_application};
use npm_autoproxy::selector::{ForwardScheme, Override};
use npm_autoproxy::testing::{StubProvider, StubProxyApi, compose_container, start_event};

const DOMAIN: &str = "home.example.com";

fn config() -> ReconcileConfig {
    ReconcileConfig {
        domain: DOMAIN.to_string(),
        settle_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn with_override(application: &str, directive: &str) -> ReconcileConfig {
    let mut config = config();
    config.overrides.insert(
        override_key(application),
        directive.parse::<Override>().unwrap(),
    );
    config
}

fn reconciler(
    provider: Arc<StubProvider>,
    api: Arc<StubProxyApi>,
    config: ReconcileConfig,
) -> Reconciler {
    let credentials = Arc::new(CredentialManager::new(
        api.clone(),
        Credential::Password {
            identity: "admin@example.com".to_string(),
            secret: SecretString::from("changeme".to_string()),
        },
    ));
    Reconciler::new(
        provider,
        Arc::new(ProxyHostClient::new(api, credentials)),
        Arc::new(config),
    )
}

fn radarr() -> npm_autoproxy::docker::ContainerRecord {
    compose_container("r1", "ix-radarr_radarr_1", "ix-radarr", "radarr", &[7878])
}

#[tokio::test]
async fn single_container_application() {
    let provider = Arc::new(StubProvider::new(vec![radarr()]));
    let api = Arc::new(StubProxyApi::new());

    let report = reconciler(provider, api.clone(), config())
        .sweep()
        .await
        .unwrap();

    assert_eq!(report.configured, vec!["radarr"]);
    assert_eq!(
        api.proxy_host_requests(),
        vec![ProxyHostRequest {
            domain_name: "radarr.home.example.com".to_string(),
            forward_scheme: ForwardScheme::Http,
            forward_host: "radarr.ix-radarr.svc.cluster.local".to_string(),
            forward_port: 7878,
            certificate_id: 0,
        }]
    );
}

#[tokio::test]
async fn https_sibling_takes_over() {
    let provider = Arc::new(StubProvider::new(vec![
        radarr(),
        compose_container("r2", "ix-radarr_tls_1", "ix-radarr", "tls", &[443]),
    ]));
    let api = Arc::new(StubProxyApi::new());

    reconciler(provider, api.clone(), config())
        .sweep()
        .await
        .unwrap();

    let requests = api.proxy_host_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].forward_host, "tls.ix-radarr.svc.cluster.local");
    assert_eq!(requests[0].forward_scheme, ForwardScheme::Https);
    assert_eq!(requests[0].forward_port, 443);
}

#[tokio::test]
async fn override_pins_container_and_port() {
    let provider = Arc::new(StubProvider::new(vec![
        radarr(),
        compose_container("r2", "ix-radarr_webui_1", "ix-radarr", "webui", &[3000]),
        compose_container("r3", "ix-radarr_tls_1", "ix-radarr", "tls", &[443]),
    ]));
    let api = Arc::new(StubProxyApi::new());

    reconciler(provider, api.clone(), with_override("radarr", "webui:8080"))
        .sweep()
        .await
        .unwrap();

    let requests = api.proxy_host_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].forward_host, "webui.ix-radarr.svc.cluster.local");
    assert_eq!(requests[0].forward_scheme, ForwardScheme::Http);
    assert_eq!(requests[0].forward_port, 8080);
}

#[tokio::test]
async fn override_mismatch_makes_no_call() {
    let provider = Arc::new(StubProvider::new(vec![
        radarr(),
        compose_container("r2", "ix-radarr_webui_1", "ix-radarr", "webui", &[3000]),
        compose_container("r3", "ix-radarr_webui_2", "ix-radarr", "webui", &[3000]),
        compose_container("s1", "ix-sonarr_sonarr_1", "ix-sonarr", "sonarr", &[8989]),
    ]));
    let api = Arc::new(StubProxyApi::new());
    let reconciler = reconciler(provider, api.clone(), with_override("radarr", "webui:8080"));

    let err = reconciler.reconcile_application("radarr").await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::OverrideMismatch { matches: 2, .. }
    ));
    assert_eq!(api.proxy_host_calls(), 0);

    // Other applications are unaffected.
    let report = reconciler.sweep().await.unwrap();
    assert_eq!(report.configured, vec!["sonarr"]);
    assert_eq!(report.failed.len(), 1);
}

#[tokio::test]
async fn shared_network_namespace_is_skipped() {
    let provider = Arc::new(StubProvider::new(vec![
        compose_container("q1", "ix-qbit_gluetun_1", "ix-qbit", "gluetun", &[8000]),
        compose_container("q2", "ix-qbit_qbit_1", "ix-qbit", "qbit", &[443])
            .with_network_mode("container:q1"),
    ]));
    let api = Arc::new(StubProxyApi::new());

    reconciler(provider, api.clone(), config())
        .sweep()
        .await
        .unwrap();

    let requests = api.proxy_host_requests();
    assert_eq!(requests[0].forward_host, "gluetun.ix-qbit.svc.cluster.local");
    assert_eq!(requests[0].forward_port, 8000);
}

#[tokio::test]
async fn started_container_after_sweep() {
    let provider = Arc::new(StubProvider::new(vec![radarr()]));
    let api = Arc::new(StubProxyApi::new());
    let reconciler = reconciler(provider, api.clone(), config());

    let outcome = reconciler
        .handle_event(start_event("r1", "ix-radarr"))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, ApplicationOutcome::Configured(_)));
    assert_eq!(api.proxy_host_requests()[0].domain_name, "radarr.home.example.com");
}

#[test]
fn dry_run_builds_the_same_request() {
    let planned = plan_application(&config(), "radarr", &[radarr()])
        .unwrap()
        .unwrap();
    assert_eq!(planned.request.domain_name, "radarr.home.example.com");
    assert_eq!(planned.request.forward_port, 7878);
}
