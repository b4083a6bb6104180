//! Service configuration
//!
//! Settings are layered with the `config` crate: an optional file named by
//! `CLAIMS_CONFIG` (default `config`, any supported extension) and then
//! environment variables such as `CLAIMS__DOWNLOAD__BASE_URL`.
//!
//! ```yaml
//! environment: local
//! environments:
//!   local:
//!     source_database_url: postgres://reader@localhost/dealer
//!     tracking_database_url: postgres://tracker@localhost/claims_tracking
//! download:
//!   base_url: https://documents.example.com/files
//!   storage_path: /srv/claims
//! query_params:
//!   region_name: BRAZIL
//!   status_type_code: "5618"
//!   report_date_from: 2024-01-01
//! ```
//!
//! The [`ConfigProvider`] binds validated settings to one [`EnvironmentMode`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use domain_claims::{ClaimQuery, MatchingConfig, DEFAULT_DOCUMENT_TYPE, MAX_CLAIM_BATCH};
use infra_db::DatabaseConfig;
use infra_http::{HttpTransferConfig, DEFAULT_USER_AGENT};

use crate::error::ServiceError;

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "CLAIMS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config";
const ENV_PREFIX: &str = "CLAIMS";
const ENV_SEPARATOR: &str = "__";

/// Deployment environment selecting the database settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    #[default]
    Local,
    Uat,
    Prod,
}

impl EnvironmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentMode::Local => "local",
            EnvironmentMode::Uat => "uat",
            EnvironmentMode::Prod => "prod",
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(EnvironmentMode::Local),
            "uat" => Ok(EnvironmentMode::Uat),
            "prod" | "production" => Ok(EnvironmentMode::Prod),
            other => Err(ServiceError::configuration(format!("unknown environment '{}'", other))),
        }
    }
}

/// Connection settings of one environment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    #[validate(length(min = 1))]
    pub source_database_url: String,
    #[validate(length(min = 1))]
    pub tracking_database_url: String,
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn source_pool(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.source_database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(1)
    }

    pub fn tracking_pool(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.tracking_database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentsSettings {
    pub local: Option<DatabaseSettings>,
    pub uat: Option<DatabaseSettings>,
    pub prod: Option<DatabaseSettings>,
}

impl EnvironmentsSettings {
    pub fn for_mode(&self, mode: EnvironmentMode) -> Option<&DatabaseSettings> {
        match mode {
            EnvironmentMode::Local => self.local.as_ref(),
            EnvironmentMode::Uat => self.uat.as_ref(),
            EnvironmentMode::Prod => self.prod.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DownloadSettings {
    #[validate(url)]
    pub base_url: String,
    /// Absolute directory documents are stored under
    pub storage_path: PathBuf,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
    #[serde(default = "default_min_file_bytes")]
    pub min_file_bytes: u64,
    #[serde(default = "default_max_file_bytes")]
    #[validate(range(min = 1))]
    pub max_file_bytes: u64,
    /// Concurrent downloads; 1 downloads sequentially
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchedulerSettings {
    #[serde(default = "default_periodicity_hours")]
    #[validate(range(min = 1, max = 168))]
    pub periodicity_hours: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { periodicity_hours: default_periodicity_hours() }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QueryParams {
    #[validate(length(min = 1))]
    pub region_name: String,
    #[validate(length(min = 1))]
    pub status_type_code: String,
    /// First report day considered, inclusive
    pub report_date_from: NaiveDate,
    #[serde(default = "default_document_type")]
    #[validate(length(min = 1))]
    pub document_type: String,
    #[serde(default = "default_file_batch_size")]
    #[validate(range(min = 1, max = 999))]
    pub file_batch_size: usize,
}

impl QueryParams {
    pub fn report_window_start(&self) -> DateTime<Utc> {
        self.report_date_from.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MaintenanceSettings {
    /// Superseded FAILED records older than this are swept
    #[serde(default = "default_failed_retention_days")]
    #[validate(range(min = 1))]
    pub failed_retention_days: u32,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self { failed_retention_days: default_failed_retention_days() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily file in this directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), directory: None }
    }
}

/// All configuration sections
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environment: EnvironmentMode,
    #[serde(default)]
    pub environments: EnvironmentsSettings,
    pub download: DownloadSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    pub query_params: QueryParams,
    #[serde(default)]
    pub audit_matching: MatchingConfig,
    #[serde(default)]
    pub maintenance: MaintenanceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Loads settings from the configuration file and the environment
    ///
    /// `file` overrides `CLAIMS_CONFIG`; a missing file is not an error.
    pub fn load(file: Option<&str>) -> Result<Self, ServiceError> {
        let file = match file {
            Some(file) => file.to_string(),
            None => std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string()),
        };

        let config = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self, ServiceError> {
        Ok(config.try_deserialize()?)
    }
}

/// Validated settings bound to one environment
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    mode: EnvironmentMode,
    settings: Settings,
}

impl ConfigProvider {
    /// Validates `settings` for `mode`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a section violates its constraints,
    /// the storage path is relative, the size limits are inverted, the
    /// matching configuration is out of range, or `mode` has no database
    /// settings.
    pub fn new(mode: EnvironmentMode, settings: Settings) -> Result<Self, ServiceError> {
        settings.download.validate()?;
        settings.scheduler.validate()?;
        settings.query_params.validate()?;
        settings.maintenance.validate()?;
        settings.audit_matching.validate()?;

        let database = settings.environments.for_mode(mode).ok_or_else(|| {
            ServiceError::configuration(format!("no database settings for environment '{}'", mode))
        })?;
        database.validate()?;

        if !settings.download.storage_path.is_absolute() {
            return Err(ServiceError::configuration(format!(
                "storage path must be absolute: {}",
                settings.download.storage_path.display()
            )));
        }

        if settings.download.min_file_bytes > settings.download.max_file_bytes {
            return Err(ServiceError::configuration(format!(
                "min_file_bytes {} exceeds max_file_bytes {}",
                settings.download.min_file_bytes, settings.download.max_file_bytes
            )));
        }

        if settings.query_params.file_batch_size > MAX_CLAIM_BATCH {
            return Err(ServiceError::configuration(format!(
                "file_batch_size must not exceed {}",
                MAX_CLAIM_BATCH
            )));
        }

        Ok(Self { mode, settings })
    }

    /// Loads and validates settings; `mode` overrides the configured environment
    pub fn load(file: Option<&str>, mode: Option<EnvironmentMode>) -> Result<Self, ServiceError> {
        let settings = Settings::load(file)?;
        let mode = mode.unwrap_or(settings.environment);
        Self::new(mode, settings)
    }

    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> Result<&DatabaseSettings, ServiceError> {
        self.settings.environments.for_mode(self.mode).ok_or_else(|| {
            ServiceError::configuration(format!("no database settings for environment '{}'", self.mode))
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.settings.download.storage_path
    }

    /// Creates the storage directory if it does not exist yet
    pub async fn prepare_storage(&self) -> Result<(), ServiceError> {
        tokio::fs::create_dir_all(self.storage_path()).await?;
        info!(path = %self.storage_path().display(), "Storage directory confirmed");
        Ok(())
    }

    pub fn claim_query(&self) -> ClaimQuery {
        let params = &self.settings.query_params;
        ClaimQuery {
            region_name: params.region_name.clone(),
            status_type_code: params.status_type_code.clone(),
            report_date_from: params.report_window_start(),
        }
    }

    pub fn matching_config(&self) -> MatchingConfig {
        self.settings.audit_matching.clone()
    }

    pub fn transfer_config(&self) -> HttpTransferConfig {
        let download = &self.settings.download;
        HttpTransferConfig::new(download.base_url.clone(), download.storage_path.clone())
            .timeout(Duration::from_secs(download.timeout_secs))
            .size_limits(download.min_file_bytes, download.max_file_bytes)
            .user_agent(download.user_agent.clone())
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.settings.scheduler.periodicity_hours * 3600)
    }

    pub fn failed_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.settings.maintenance.failed_retention_days))
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_min_file_bytes() -> u64 {
    1
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_workers() -> usize {
    4
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_periodicity_hours() -> u64 {
    1
}

fn default_document_type() -> String {
    DEFAULT_DOCUMENT_TYPE.to_string()
}

fn default_file_batch_size() -> usize {
    MAX_CLAIM_BATCH
}

fn default_failed_retention_days() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}
