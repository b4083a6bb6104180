//! Claim Document Audit Service
//!
//! The outer layer of the service: configuration, logging, the periodic
//! scheduler, the cycle orchestrator and the monitoring reports.
//!
//! # Binaries
//!
//! - `claims-service` runs a cycle immediately and then every configured
//!   period until Ctrl+C or SIGTERM.
//! - `claims-monitor` prints health, activity and failure reports and runs
//!   maintenance on the tracking store.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_service::{build_orchestrator, ConfigProvider};
//!
//! let provider = ConfigProvider::load(None, None)?;
//! let orchestrator = build_orchestrator(&provider).await?;
//! let summary = orchestrator.run_cycle().await;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod scheduler;
pub mod monitor;
pub mod bootstrap;

pub use config::{ConfigProvider, EnvironmentMode, Settings};
pub use error::ServiceError;
pub use orchestrator::{CycleOrchestrator, CycleSettings, CycleSummary, DownloadSummary, ServicePorts};
pub use scheduler::{shutdown_signal, Scheduler};
pub use monitor::DownloadMonitor;
pub use bootstrap::{build_orchestrator, connect_ports, connect_tracking_store};
