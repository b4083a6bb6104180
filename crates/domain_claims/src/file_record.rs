//! Per-document download tracking records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use core_kernel::{truncate_chars, ClaimId, CoreError, FileId};

/// Maximum number of characters of an error message kept on a record
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2000;

/// Download state of a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Pending,
    Success,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::Success => "SUCCESS",
            FileStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FileStatus::Pending),
            "SUCCESS" => Ok(FileStatus::Success),
            "FAILED" => Ok(FileStatus::Failed),
            other => Err(CoreError::validation(format!("unknown file status '{}'", other))),
        }
    }
}

/// The result of one download attempt, as handed to the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub file_id: FileId,
    pub claim_id: ClaimId,
    pub claim_no: String,
    pub remote_file_name: String,
    pub local_path: Option<PathBuf>,
    pub status: FileStatus,
    pub error_message: Option<String>,
    /// Upstream update timestamp of the claim when the attempt was made
    pub claim_last_modified: Option<DateTime<Utc>>,
}

impl DownloadOutcome {
    /// Outcome of a transfer that stored the document at `local_path`
    pub fn success(candidate: &FileCandidate, local_path: PathBuf) -> Self {
        Self {
            file_id: candidate.file.file_id.clone(),
            claim_id: candidate.file.claim_id,
            claim_no: candidate.claim_no.clone(),
            remote_file_name: candidate.file.file_name.clone(),
            local_path: Some(local_path),
            status: FileStatus::Success,
            error_message: None,
            claim_last_modified: Some(candidate.claim_updated_at),
        }
    }

    /// Outcome of a transfer that failed with `reason`
    pub fn failure(candidate: &FileCandidate, reason: impl Into<String>) -> Self {
        Self {
            file_id: candidate.file.file_id.clone(),
            claim_id: candidate.file.claim_id,
            claim_no: candidate.claim_no.clone(),
            remote_file_name: candidate.file.file_name.clone(),
            local_path: None,
            status: FileStatus::Failed,
            error_message: Some(reason.into()),
            claim_last_modified: Some(candidate.claim_updated_at),
        }
    }
}

/// Tracking row for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: FileId,
    pub claim_id: ClaimId,
    pub claim_no: String,
    pub remote_file_name: String,
    /// Where the document was stored; only set once a download succeeded
    pub local_path: Option<PathBuf>,
    pub status: FileStatus,
    pub is_latest_version: bool,
    pub error_message: Option<String>,
    pub download_timestamp: DateTime<Utc>,
    pub claim_last_modified: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Merges a download outcome into the existing record for the same file
    ///
    /// # Arguments
    ///
    /// * `existing` - The stored record for `outcome.file_id`, if any
    /// * `outcome` - The download attempt to record
    /// * `now` - Timestamp written as `download_timestamp`
    ///
    /// # Returns
    ///
    /// The record to persist. Status, error and timestamp always follow the
    /// outcome; the stored path is only replaced by a successful outcome, so
    /// a later failure never erases it. The result is always the latest
    /// version.
    pub fn merge(existing: Option<&FileRecord>, outcome: &DownloadOutcome, now: DateTime<Utc>) -> FileRecord {
        let error_message = outcome
            .error_message
            .as_deref()
            .map(|message| truncate_chars(message, MAX_ERROR_MESSAGE_CHARS));

        match existing {
            None => FileRecord {
                file_id: outcome.file_id.clone(),
                claim_id: outcome.claim_id,
                claim_no: outcome.claim_no.clone(),
                remote_file_name: outcome.remote_file_name.clone(),
                local_path: match outcome.status {
                    FileStatus::Success => outcome.local_path.clone(),
                    _ => None,
                },
                status: outcome.status,
                is_latest_version: true,
                error_message,
                download_timestamp: now,
                claim_last_modified: outcome.claim_last_modified,
            },
            Some(current) => FileRecord {
                file_id: current.file_id.clone(),
                claim_id: current.claim_id,
                claim_no: current.claim_no.clone(),
                remote_file_name: current.remote_file_name.clone(),
                local_path: match outcome.status {
                    FileStatus::Success => outcome.local_path.clone().or_else(|| current.local_path.clone()),
                    _ => current.local_path.clone(),
                },
                status: outcome.status,
                is_latest_version: true,
                error_message,
                download_timestamp: now,
                claim_last_modified: outcome.claim_last_modified.or(current.claim_last_modified),
            },
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// A document reported by the upstream source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamFile {
    pub claim_id: ClaimId,
    pub file_id: FileId,
    pub file_name: String,
    pub create_timestamp: DateTime<Utc>,
}

/// A document queued for download during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCandidate {
    pub file: UpstreamFile,
    pub claim_no: String,
    /// Upstream update timestamp of the owning claim
    pub claim_updated_at: DateTime<Utc>,
    /// The record stored before this cycle, if any
    pub existing: Option<FileRecord>,
}

impl FileCandidate {
    /// Path of a previous download that still belongs to the current claim
    /// version, if the stored record allows skipping the transfer.
    ///
    /// The caller must still check that the path exists on disk.
    pub fn reusable_download(&self) -> Option<&Path> {
        let record = self.existing.as_ref()?;
        if record.status != FileStatus::Success {
            return None;
        }
        if record.claim_last_modified != Some(self.claim_updated_at) {
            return None;
        }
        record.local_path.as_deref()
    }
}
