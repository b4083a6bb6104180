//! Claim Document Audit Service - Scheduler Binary
//!
//! # Usage
//!
//! ```bash
//! # Configuration from ./config.{yaml,toml,json} and CLAIMS__* variables
//! cargo run --bin claims-service
//!
//! # Explicit file and environment
//! cargo run --bin claims-service -- --config /etc/claims/config.yaml --environment prod
//! ```
//!
//! Invalid configuration exits with a non-zero status before the first cycle.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use interface_service::logging::init_logging;
use interface_service::{build_orchestrator, shutdown_signal, ConfigProvider, EnvironmentMode, Scheduler};

#[derive(Debug, Parser)]
#[command(name = "claims-service", about = "Downloads claim documents and audits their amounts")]
struct Args {
    /// Configuration file, without or with extension
    #[arg(long, env = "CLAIMS_CONFIG")]
    config: Option<String>,

    /// Environment overriding the configured one (local, uat, prod)
    #[arg(long)]
    environment: Option<EnvironmentMode>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let provider = ConfigProvider::load(args.config.as_deref(), args.environment)
        .context("Configuration validation failed")?;
    let _guard = init_logging(&provider.settings().logging)?;

    tracing::info!(environment = %provider.mode(), "Starting claim document audit service");

    provider.prepare_storage().await?;
    let orchestrator = Arc::new(build_orchestrator(&provider).await?);

    let scheduler = Scheduler::new(provider.cycle_period());
    tracing::info!(
        hours = provider.settings().scheduler.periodicity_hours,
        "Running the first cycle immediately"
    );

    let runs = scheduler
        .run(
            || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.run_cycle().await;
                }
            },
            shutdown_signal(),
        )
        .await;

    tracing::info!(cycles = runs, "Service stopped");
    Ok(())
}
