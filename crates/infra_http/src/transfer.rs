//! HTTP Document Transfer Adapter
//!
//! Downloads claim documents from the document server and stores them under
//! the configured storage root.
//!
//! # Layout
//!
//! ```text
//! GET {base_url}/{YYYYMMDD}/{file_id}
//!  -> {storage_root}/{YYYYMMDD}/CLAIM_{claim_id}_{file_id}.pdf
//! ```
//!
//! The body is streamed chunk by chunk into a `.part` file that replaces the
//! target only once it is complete. A body outside
//! `[min_file_bytes, max_file_bytes]` is rejected and the partial file removed,
//! so an earlier good copy of the document stays in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable};
use domain_claims::{DocumentTransferPort, TransferOutcome, TransferRequest};

use crate::error::TransferError;

pub const DEFAULT_USER_AGENT: &str = "Claims-Document-Service/1.0";

/// Configuration for the HTTP transfer adapter
#[derive(Debug, Clone)]
pub struct HttpTransferConfig {
    /// Base URL of the document server; the remote path is appended as is
    pub base_url: String,
    /// Root directory that date folders are created under
    pub storage_root: PathBuf,
    /// Timeout of a whole request, body included
    pub timeout: Duration,
    pub min_file_bytes: u64,
    pub max_file_bytes: u64,
    pub user_agent: String,
}

impl HttpTransferConfig {
    pub fn new(base_url: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            storage_root: storage_root.into(),
            timeout: Duration::from_secs(60),
            min_file_bytes: 1,
            max_file_bytes: 50 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn size_limits(mut self, min_file_bytes: u64, max_file_bytes: u64) -> Self {
        self.min_file_bytes = min_file_bytes;
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// reqwest-backed implementation of [`DocumentTransferPort`]
#[derive(Debug, Clone)]
pub struct HttpDocumentTransfer {
    client: Client,
    config: HttpTransferConfig,
}

impl HttpDocumentTransfer {
    /// Builds the HTTP client
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: HttpTransferConfig) -> Result<Self, TransferError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/pdf"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransferConfig {
        &self.config
    }

    /// Full URL of a request
    pub fn url_for(&self, request: &TransferRequest) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), request.remote_path())
    }

    async fn fetch_to(&self, url: &str, path: &Path, partial: &Path) -> Result<u64, TransferError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Http { status: status.as_u16() });
        }

        let max = self.config.max_file_bytes;
        if response.content_length().is_some_and(|len| len > max) {
            return Err(TransferError::TooLarge { max });
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > max {
                return Err(TransferError::TooLarge { max });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let min = self.config.min_file_bytes;
        if written < min {
            return Err(TransferError::TooSmall { bytes: written, min });
        }

        tokio::fs::rename(partial, path).await?;
        Ok(written)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed rejected download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove rejected download"),
    }
}

impl DomainPort for HttpDocumentTransfer {}

#[async_trait]
impl DocumentTransferPort for HttpDocumentTransfer {
    #[instrument(skip(self, request), fields(file_id = %request.file_id, claim_id = %request.claim_id))]
    async fn transfer(&self, request: &TransferRequest) -> TransferOutcome {
        let url = self.url_for(request);
        let path = request.local_path(&self.config.storage_root);
        let partial = partial_path(&path);
        debug!(url = %url, path = %path.display(), "Downloading document");

        match self.fetch_to(&url, &path, &partial).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "Document saved");
                TransferOutcome::Downloaded { path, bytes }
            }
            Err(e) => {
                discard_partial(&partial).await;
                warn!(error = %e, transient = e.is_transient(), "Download failed");
                TransferOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}

#[async_trait]
impl HealthCheckable for HttpDocumentTransfer {
    /// Checks the storage root is present and writable
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let probe = self.config.storage_root.join(".health_probe");

        let result = async {
            tokio::fs::create_dir_all(&self.config.storage_root).await?;
            tokio::fs::write(&probe, b"ok").await?;
            tokio::fs::remove_file(&probe).await
        }
        .await;

        let (status, message) = match result {
            Ok(()) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Storage error: {}", e))),
        };

        HealthCheckResult {
            adapter_id: "http-document-transfer".to_string(),
            status,
            latency_ms: start.elapsed().as_millis() as u64,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{ClaimId, FileId};

    #[test]
    fn test_url_joins_without_double_slash() {
        let transfer = HttpDocumentTransfer::new(HttpTransferConfig::new("http://docs.local/files/", "/tmp")).unwrap();
        let request = TransferRequest {
            file_id: FileId::new("abc"),
            claim_id: ClaimId::new(9),
            create_timestamp: Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap(),
        };

        assert_eq!(transfer.url_for(&request), "http://docs.local/files/20240229/abc");
    }

    #[test]
    fn test_config_defaults() {
        let config = HttpTransferConfig::new("http://docs.local", "/srv");
        assert_eq!(config.min_file_bytes, 1);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }
}
