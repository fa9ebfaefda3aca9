use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;

use crate::config::{Config, ReconcileConfig};
use crate::docker::{ContainerFilter, ContainerProvider, DockerProvider};
use crate::npm::NpmClient;
use crate::reconcile::{PlanEntry, PlanStatus, SweepReport, plan, run_service, run_sweep};

use super::shutdown_signal;

fn npm_client(config: &Config) -> anyhow::Result<NpmClient> {
    NpmClient::new(config.npm.base_url.clone(), config.npm.request_timeout)
        .context("Failed to build the proxy-manager client")
}

/// `run`: sweep, then follow container starts until a shutdown signal.
pub async fn run_service_command(config: Config) -> anyhow::Result<()> {
    let provider = DockerProvider::connect().await?;
    let api = npm_client(&config)?;

    run_service(&config, Arc::new(provider), Arc::new(api), shutdown_signal()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// `sweep`: one pass; fails if any application failed.
pub async fn run_sweep_command(config: Config) -> anyhow::Result<SweepReport> {
    let provider = DockerProvider::connect().await?;
    let api = npm_client(&config)?;

    let report = run_sweep(&config, Arc::new(provider), Arc::new(api)).await?;
    if report.has_failures() {
        for (application, error) in &report.failed {
            eprintln!("  {application}: {error}");
        }
        anyhow::bail!("{} of {} applications failed", report.failed.len(), report.total());
    }
    println!("{report}");
    Ok(report)
}

/// `plan`: print what a sweep would do. Never contacts the proxy manager.
pub async fn run_plan_command(config: ReconcileConfig) -> anyhow::Result<()> {
    let provider = DockerProvider::connect().await?;
    let records = provider
        .list_containers(&ContainerFilter::AllProjects)
        .await?;

    let entries = plan(&config, records);
    if entries.is_empty() {
        println!("No ix- applications are running.");
    } else {
        print!("{}", format_plan(&entries));
    }
    Ok(())
}

/// One line per application.
pub fn format_plan(entries: &[PlanEntry]) -> String {
    let width = entries
        .iter()
        .map(|e| e.application.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for entry in entries {
        let detail = match &entry.status {
            PlanStatus::Ready(planned) => format!(
                "{} -> {}://{}:{} (container {})",
                planned.request.domain_name,
                planned.request.forward_scheme,
                planned.request.forward_host,
                planned.request.forward_port,
                planned.container
            ),
            PlanStatus::NoTarget => "no exposed port, skipped".to_string(),
            PlanStatus::Blacklisted => "blacklisted".to_string(),
            PlanStatus::Invalid(e) => format!("error: {e}"),
        };
        let _ = writeln!(out, "  {:width$}  {}", entry.application, detail);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::compose_container;

    #[test]
    fn plan_output_is_aligned() {
        let config = ReconcileConfig {
            domain: "example.com".to_string(),
            blacklist: vec!["plex".to_string()],
            ..Default::default()
        };
        let entries = plan(
            &config,
            vec![
                compose_container("a", "ix-radarr_radarr_1", "ix-radarr", "radarr", &[7878]),
                compose_container("b", "ix-plex_plex_1", "ix-plex", "plex", &[32400]),
            ],
        );

        assert_eq!(
            format_plan(&entries),
            "  radarr  radarr.example.com -> http://radarr.ix-radarr.svc.cluster.local:7878 (container ix-radarr_radarr_1)\n  \
             plex    blacklisted\n"
        );
    }
}
