//! Download monitoring and maintenance reports
//!
//! Every report is a plain value with a `Display` rendering, so the monitor
//! binary only prints and the tests only compare values.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use core_kernel::{truncate_chars, FileId};
use domain_claims::ports::{DailyCount, DownloadStatistics};
use domain_claims::{DownloadReportPort, FileRecord, FileStatus};

use crate::error::ServiceError;

/// Rows shown by the recent activity report
pub const RECENT_ACTIVITY_LIMIT: u32 = 20;
/// Days covered by the daily breakdown of the export
pub const EXPORT_WINDOW_DAYS: i64 = 30;

const RULE: &str = "==================================================";

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn error_summary(record: &FileRecord, max_chars: usize) -> String {
    match record.error_message.as_deref() {
        Some(message) if message.chars().count() > max_chars => {
            format!("{}...", truncate_chars(message, max_chars))
        }
        Some(message) => message.to_string(),
        None => String::new(),
    }
}

/// Overall state of the download tracking
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub statistics: DownloadStatistics,
    pub last_24_hours: usize,
    pub failed: u64,
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Claim Document Download Health Check")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Total files tracked: {}", self.statistics.total())?;
        for entry in &self.statistics.by_status {
            writeln!(
                f,
                "   {}: {} ({:.1}%)",
                entry.status,
                entry.count,
                self.statistics.percentage(entry.status)
            )?;
        }
        writeln!(f, "Downloads in last 24 hours: {}", self.last_24_hours)?;
        if self.failed > 0 {
            writeln!(f, "Failed downloads: {}", self.failed)
        } else {
            writeln!(f, "No failed downloads")
        }
    }
}

/// Records written within the last `hours`, newest first
#[derive(Debug, Clone)]
pub struct RecentActivity {
    pub hours: u32,
    pub records: Vec<FileRecord>,
}

impl fmt::Display for RecentActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recent Activity (Last {} hours)", self.hours)?;
        writeln!(f, "{}", RULE)?;
        if self.records.is_empty() {
            return writeln!(f, "No recent activity found");
        }
        writeln!(f, "{:<14} {:<12} {:<8} {:<20} {}", "Claim", "File ID", "Status", "Download Time", "Error")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for record in &self.records {
            writeln!(
                f,
                "{:<14} {:<12} {:<8} {:<20} {}",
                record.claim_no,
                record.file_id.abbreviated(8),
                record.status,
                timestamp(record.download_timestamp),
                error_summary(record, 50)
            )?;
        }
        Ok(())
    }
}

/// FAILED records, oldest first
#[derive(Debug, Clone)]
pub struct FailedReport {
    pub records: Vec<FileRecord>,
}

impl fmt::Display for FailedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Failed Downloads Needing Attention")?;
        writeln!(f, "{}", RULE)?;
        if self.records.is_empty() {
            return writeln!(f, "No failed downloads needing attention");
        }
        writeln!(f, "{:<14} {:<12} {:<8} {:<20} {}", "Claim", "File ID", "Latest", "Attempted", "Error")?;
        writeln!(f, "{}", "-".repeat(100))?;
        for record in &self.records {
            writeln!(
                f,
                "{:<14} {:<12} {:<8} {:<20} {}",
                record.claim_no,
                record.file_id.abbreviated(10),
                if record.is_latest_version { "yes" } else { "no" },
                timestamp(record.download_timestamp),
                error_summary(record, 60)
            )?;
        }
        Ok(())
    }
}

/// Outcome of a cleanup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub days: u32,
    pub candidates: u64,
    /// `None` when the deletion was not confirmed
    pub deleted: Option<u64>,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleaning up failed records older than {} days", self.days)?;
        writeln!(f, "{}", RULE)?;
        if self.candidates == 0 {
            return writeln!(f, "No old failed records to clean up");
        }
        writeln!(f, "Found {} old failed records to delete", self.candidates)?;
        match self.deleted {
            Some(deleted) => writeln!(f, "Deleted {} old failed records", deleted),
            None => writeln!(f, "Cleanup not confirmed; rerun with --yes to delete"),
        }
    }
}

/// Statistics export with a daily breakdown
#[derive(Debug, Clone)]
pub struct StatisticsExport {
    pub generated_at: DateTime<Utc>,
    pub statistics: DownloadStatistics,
    pub daily: Vec<DailyCount>,
}

impl fmt::Display for StatisticsExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Claim Document Download Statistics Report")?;
        writeln!(f, "Generated: {}", timestamp(self.generated_at))?;
        writeln!(f, "{}\n", "=".repeat(60))?;

        writeln!(f, "Overall Statistics:")?;
        writeln!(f, "{}", "-".repeat(20))?;
        for entry in &self.statistics.by_status {
            writeln!(f, "Status: {}", entry.status)?;
            writeln!(
                f,
                "  Count: {} ({:.2}%)",
                entry.count,
                self.statistics.percentage(entry.status)
            )?;
            let first = entry.first_download.map(timestamp).unwrap_or_default();
            let last = entry.last_download.map(timestamp).unwrap_or_default();
            writeln!(f, "  Period: {} to {}\n", first, last)?;
        }

        writeln!(f, "\nDaily Breakdown (Last {} Days):", EXPORT_WINDOW_DAYS)?;
        writeln!(f, "{}", "-".repeat(35))?;
        for row in &self.daily {
            writeln!(f, "{} - {}: {}", row.day.format("%Y-%m-%d"), row.status, row.count)?;
        }
        Ok(())
    }
}

/// Read and maintenance operations over the tracking store
pub struct DownloadMonitor {
    reports: Arc<dyn DownloadReportPort>,
}

impl DownloadMonitor {
    pub fn new(reports: Arc<dyn DownloadReportPort>) -> Self {
        Self { reports }
    }

    pub async fn health(&self, now: DateTime<Utc>) -> Result<HealthReport, ServiceError> {
        let statistics = self.reports.download_statistics().await?;
        let last_24_hours = self
            .reports
            .recent_downloads(now - Duration::hours(24), u32::MAX)
            .await?
            .len();
        let failed = statistics.count_of(FileStatus::Failed);

        Ok(HealthReport { statistics, last_24_hours, failed })
    }

    pub async fn recent_activity(&self, hours: u32, now: DateTime<Utc>) -> Result<RecentActivity, ServiceError> {
        let since = now - Duration::hours(i64::from(hours));
        let records = self.reports.recent_downloads(since, RECENT_ACTIVITY_LIMIT).await?;
        Ok(RecentActivity { hours, records })
    }

    pub async fn failed(&self) -> Result<FailedReport, ServiceError> {
        Ok(FailedReport { records: self.reports.failed_downloads().await? })
    }

    /// Counts superseded FAILED records older than `days`, deleting them only
    /// when `confirmed`
    #[instrument(skip(self))]
    pub async fn cleanup(&self, days: u32, confirmed: bool, now: DateTime<Utc>) -> Result<CleanupReport, ServiceError> {
        let older_than = now - Duration::days(i64::from(days));
        let candidates = self.reports.count_cleanup_candidates(older_than).await?;

        let deleted = if confirmed && candidates > 0 {
            let deleted = self.reports.cleanup_failed(older_than).await?;
            info!(deleted, "Deleted old failed records");
            Some(deleted)
        } else {
            None
        };

        Ok(CleanupReport { days, candidates, deleted })
    }

    /// Resets FAILED records to PENDING; an empty selection resets all of them
    #[instrument(skip(self, file_ids), fields(selected = file_ids.len()))]
    pub async fn reset_failed(&self, file_ids: &[FileId]) -> Result<u64, ServiceError> {
        let selection = if file_ids.is_empty() { None } else { Some(file_ids) };
        let reset = self.reports.reset_failed(selection).await?;
        info!(reset, "Reset failed downloads for retry");
        Ok(reset)
    }

    pub async fn export(&self, now: DateTime<Utc>) -> Result<StatisticsExport, ServiceError> {
        let statistics = self.reports.download_statistics().await?;
        let daily = self
            .reports
            .daily_breakdown(now - Duration::days(EXPORT_WINDOW_DAYS))
            .await?;
        Ok(StatisticsExport { generated_at: now, statistics, daily })
    }
}
