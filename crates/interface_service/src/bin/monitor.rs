//! Claim Document Audit Service - Monitor Binary
//!
//! # Usage
//!
//! ```bash
//! claims-monitor --health
//! claims-monitor --recent 6
//! claims-monitor --failed
//! claims-monitor --cleanup 30 --yes
//! claims-monitor --reset-failed 8f3c2a9e41d04b6b 77aa01
//! claims-monitor --export stats.txt
//! claims-monitor --all
//! ```
//!
//! Without flags the health report is printed.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use core_kernel::FileId;
use interface_service::logging::env_filter;
use interface_service::{connect_tracking_store, ConfigProvider, DownloadMonitor, EnvironmentMode};

#[derive(Debug, Parser)]
#[command(name = "claims-monitor", about = "Health checks and maintenance for claim document downloads")]
struct Args {
    /// Configuration file, without or with extension
    #[arg(long, env = "CLAIMS_CONFIG")]
    config: Option<String>,

    /// Environment overriding the configured one (local, uat, prod)
    #[arg(long)]
    environment: Option<EnvironmentMode>,

    /// Show download statistics
    #[arg(long)]
    health: bool,

    /// Show activity of the last N hours
    #[arg(long, value_name = "HOURS")]
    recent: Option<u32>,

    /// Show failed downloads
    #[arg(long)]
    failed: bool,

    /// Delete superseded failed records older than N days
    #[arg(long, value_name = "DAYS")]
    cleanup: Option<u32>,

    /// Confirm the cleanup deletion
    #[arg(long)]
    yes: bool,

    /// Reset failed downloads to pending; all of them when no id is given
    #[arg(long, value_name = "FILE_ID", num_args = 0..)]
    reset_failed: Option<Vec<String>>,

    /// Write a statistics report to a file
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Health, 24 hour activity and failed downloads
    #[arg(long)]
    all: bool,
}

impl Args {
    fn nothing_selected(&self) -> bool {
        !self.health
            && self.recent.is_none()
            && !self.failed
            && self.cleanup.is_none()
            && self.reset_failed.is_none()
            && self.export.is_none()
            && !self.all
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let provider = ConfigProvider::load(args.config.as_deref(), args.environment)
        .context("Configuration validation failed")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&provider.settings().logging.level))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let store = connect_tracking_store(&provider)
        .await
        .context("Could not connect to the tracking store")?;
    let monitor = DownloadMonitor::new(store);
    let now = Utc::now();

    if args.health || args.all || args.nothing_selected() {
        println!("{}", monitor.health(now).await?);
    }

    if let Some(hours) = args.recent.or(args.all.then_some(24)) {
        println!("{}", monitor.recent_activity(hours, now).await?);
    }

    if args.failed || args.all {
        println!("{}", monitor.failed().await?);
    }

    if let Some(days) = args.cleanup {
        println!("{}", monitor.cleanup(days, args.yes, now).await?);
    }

    if let Some(ids) = &args.reset_failed {
        let ids: Vec<FileId> = ids.iter().map(FileId::new).collect();
        let reset = monitor.reset_failed(&ids).await?;
        println!("Reset {} failed downloads for retry", reset);
    }

    if let Some(path) = &args.export {
        let report = monitor.export(now).await?;
        tokio::fs::write(path, report.to_string())
            .await
            .with_context(|| format!("Could not write {}", path.display()))?;
        println!("Statistics exported to {}", path.display());
    }

    Ok(())
}
