//! npm-autoproxy - Main entry point.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use npm_autoproxy::{
    cli::{Cli, Command, run_plan_command, run_service_command, run_sweep_command},
    config::{Config, reconcile_from_env},
};

fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("npm_autoproxy=info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
        None => {
            // Load .env if present
            let _ = dotenvy::dotenv();
        }
    }

    init_tracing(cli.log_json);
    tracing::info!("npm-autoproxy v{}", env!("CARGO_PKG_VERSION"));

    match cli.selected_command() {
        Command::Plan => run_plan_command(reconcile_from_env()?).await,
        Command::Sweep => run_sweep_command(Config::from_env()?).await.map(|_| ()),
        Command::Run => run_service_command(Config::from_env()?).await,
    }
}
