//! Tracking store repository
//!
//! Row-level access to the `audit_claims` and `claim_file_downloads` tables.
//! Statuses are stored as text and mapped to their domain enums by the
//! adapter layer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DatabaseError;

const CLAIM_COLUMNS: &str = r#"
    claim_id, claim_no, vin, dealer_code, dealer_name, report_date,
    gross_credit, labour_amount, part_amount, upstream_updated_at, auditing_date,
    total_files_count, downloaded_files_count, attachment_status,
    audit_status, audit_reason, last_modified_at
"#;

const FILE_COLUMNS: &str = r#"
    file_id, claim_id, claim_no, remote_file_name, local_file_path, status,
    is_latest_version, error_message, download_timestamp, claim_last_modified
"#;

/// A row of `audit_claims`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    pub claim_id: i64,
    pub claim_no: String,
    pub vin: Option<String>,
    pub dealer_code: Option<String>,
    pub dealer_name: Option<String>,
    pub report_date: Option<DateTime<Utc>>,
    pub gross_credit: Option<Decimal>,
    pub labour_amount: Option<Decimal>,
    pub part_amount: Option<Decimal>,
    pub upstream_updated_at: DateTime<Utc>,
    pub auditing_date: Option<DateTime<Utc>>,
    pub total_files_count: i32,
    pub downloaded_files_count: i32,
    pub attachment_status: String,
    pub audit_status: Option<String>,
    pub audit_reason: Option<String>,
    pub last_modified_at: DateTime<Utc>,
}

/// Upstream-mirrored claim fields written by an upsert
#[derive(Debug, Clone)]
pub struct ClaimUpsert {
    pub claim_id: i64,
    pub claim_no: String,
    pub vin: Option<String>,
    pub dealer_code: Option<String>,
    pub dealer_name: Option<String>,
    pub report_date: Option<DateTime<Utc>>,
    pub gross_credit: Option<Decimal>,
    pub labour_amount: Option<Decimal>,
    pub part_amount: Option<Decimal>,
    pub upstream_updated_at: DateTime<Utc>,
    pub auditing_date: Option<DateTime<Utc>>,
}

/// A row of `claim_file_downloads`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FileRecordRow {
    pub file_id: String,
    pub claim_id: i64,
    pub claim_no: String,
    pub remote_file_name: String,
    pub local_file_path: Option<String>,
    pub status: String,
    pub is_latest_version: bool,
    pub error_message: Option<String>,
    pub download_timestamp: DateTime<Utc>,
    pub claim_last_modified: Option<DateTime<Utc>>,
}

/// Per-status aggregate over `claim_file_downloads`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
    pub first_download: Option<DateTime<Utc>>,
    pub last_download: Option<DateTime<Utc>>,
}

/// Per-day, per-status aggregate over `claim_file_downloads`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyCountRow {
    pub day: NaiveDate,
    pub status: String,
    pub count: i64,
}

/// Repository for the tracking tables
#[derive(Debug, Clone)]
pub struct TrackingRepository {
    pool: PgPool,
}

impl TrackingRepository {
    /// Creates a new TrackingRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    pub async fn find_claim(&self, claim_id: i64) -> Result<Option<ClaimRow>, DatabaseError> {
        let sql = format!("SELECT {} FROM audit_claims WHERE claim_id = $1", CLAIM_COLUMNS);
        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_claims(&self, claim_ids: &[i64]) -> Result<Vec<ClaimRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM audit_claims WHERE claim_id = ANY($1) ORDER BY claim_id",
            CLAIM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(claim_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts the claim, or overwrites its upstream-mirrored columns
    ///
    /// Tracking columns (counts, statuses, reason) are left untouched on update.
    pub async fn upsert_claim(&self, claim: &ClaimUpsert) -> Result<ClaimRow, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO audit_claims (
                claim_id, claim_no, vin, dealer_code, dealer_name, report_date,
                gross_credit, labour_amount, part_amount, upstream_updated_at,
                auditing_date, last_modified_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (claim_id) DO UPDATE SET
                claim_no = EXCLUDED.claim_no,
                vin = EXCLUDED.vin,
                dealer_code = EXCLUDED.dealer_code,
                dealer_name = EXCLUDED.dealer_name,
                report_date = EXCLUDED.report_date,
                gross_credit = EXCLUDED.gross_credit,
                labour_amount = EXCLUDED.labour_amount,
                part_amount = EXCLUDED.part_amount,
                upstream_updated_at = EXCLUDED.upstream_updated_at,
                auditing_date = EXCLUDED.auditing_date,
                last_modified_at = NOW()
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        );

        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(claim.claim_id)
            .bind(&claim.claim_no)
            .bind(&claim.vin)
            .bind(&claim.dealer_code)
            .bind(&claim.dealer_name)
            .bind(claim.report_date)
            .bind(claim.gross_credit)
            .bind(claim.labour_amount)
            .bind(claim.part_amount)
            .bind(claim.upstream_updated_at)
            .bind(claim.auditing_date)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn set_total_files(&self, claim_id: i64, total: i32) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE audit_claims
            SET total_files_count = $2, last_modified_at = NOW()
            WHERE claim_id = $1
            "#,
        )
        .bind(claim_id)
        .bind(total)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_attachment_rollup(
        &self,
        claim_id: i64,
        downloaded: i32,
        status: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE audit_claims
            SET downloaded_files_count = $2, attachment_status = $3, last_modified_at = NOW()
            WHERE claim_id = $1
            "#,
        )
        .bind(claim_id)
        .bind(downloaded)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_audit_status(
        &self,
        claim_id: i64,
        status: &str,
        reason: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE audit_claims
            SET audit_status = $2, audit_reason = $3, last_modified_at = NOW()
            WHERE claim_id = $1
            "#,
        )
        .bind(claim_id)
        .bind(status)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn claims_ready_for_processing(&self) -> Result<Vec<ClaimRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM audit_claims
            WHERE attachment_status = 'COMPLETE'
              AND (audit_status IS NULL OR audit_status = 'PENDING')
            ORDER BY report_date ASC NULLS LAST, claim_id ASC
            "#,
            CLAIM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClaimRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn claims_ready_for_audit(&self, limit: i64) -> Result<Vec<ClaimRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM audit_claims
            WHERE attachment_status = 'COMPLETE' AND audit_status = 'PENDING'
            ORDER BY report_date ASC NULLS LAST, claim_id ASC
            LIMIT $1
            "#,
            CLAIM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // File records
    // ------------------------------------------------------------------

    pub async fn mark_files_not_latest(&self, claim_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE claim_file_downloads SET is_latest_version = FALSE WHERE claim_id = $1",
        )
        .bind(claim_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn files_for_claims(&self, claim_ids: &[i64]) -> Result<Vec<FileRecordRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM claim_file_downloads WHERE claim_id = ANY($1) ORDER BY file_id",
            FILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, FileRecordRow>(&sql)
            .bind(claim_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Opens a transaction for a file record merge
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Reads and locks the record of `file_id` inside `tx`
    pub async fn lock_file(
        tx: &mut Transaction<'static, Postgres>,
        file_id: &str,
    ) -> Result<Option<FileRecordRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM claim_file_downloads WHERE file_id = $1 FOR UPDATE",
            FILE_COLUMNS
        );
        let row = sqlx::query_as::<_, FileRecordRow>(&sql)
            .bind(file_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row)
    }

    /// Writes a fully merged record inside `tx`
    pub async fn write_file(
        tx: &mut Transaction<'static, Postgres>,
        row: &FileRecordRow,
    ) -> Result<FileRecordRow, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO claim_file_downloads (
                file_id, claim_id, claim_no, remote_file_name, local_file_path, status,
                is_latest_version, error_message, download_timestamp, claim_last_modified
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (file_id) DO UPDATE SET
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                download_timestamp = EXCLUDED.download_timestamp,
                local_file_path = CASE
                    WHEN EXCLUDED.status = 'SUCCESS' THEN COALESCE(EXCLUDED.local_file_path, claim_file_downloads.local_file_path)
                    ELSE claim_file_downloads.local_file_path
                END,
                is_latest_version = TRUE,
                claim_last_modified = COALESCE(EXCLUDED.claim_last_modified, claim_file_downloads.claim_last_modified)
            RETURNING {}
            "#,
            FILE_COLUMNS
        );

        let stored = sqlx::query_as::<_, FileRecordRow>(&sql)
            .bind(&row.file_id)
            .bind(row.claim_id)
            .bind(&row.claim_no)
            .bind(&row.remote_file_name)
            .bind(&row.local_file_path)
            .bind(&row.status)
            .bind(row.is_latest_version)
            .bind(&row.error_message)
            .bind(row.download_timestamp)
            .bind(row.claim_last_modified)
            .fetch_one(&mut **tx)
            .await?;
        Ok(stored)
    }

    pub async fn count_latest_successes(&self, claim_id: i64) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM claim_file_downloads
            WHERE claim_id = $1 AND is_latest_version = TRUE AND status = 'SUCCESS'
            "#,
        )
        .bind(claim_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn latest_successful_files(&self, claim_id: i64) -> Result<Vec<FileRecordRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM claim_file_downloads
            WHERE claim_id = $1 AND is_latest_version = TRUE AND status = 'SUCCESS'
            ORDER BY file_id
            "#,
            FILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, FileRecordRow>(&sql)
            .bind(claim_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Reporting and maintenance
    // ------------------------------------------------------------------

    pub async fn status_counts(&self) -> Result<Vec<StatusCountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT status, COUNT(*) AS count,
                   MIN(download_timestamp) AS first_download,
                   MAX(download_timestamp) AS last_download
            FROM claim_file_downloads
            GROUP BY status
            ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_files(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<FileRecordRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM claim_file_downloads
            WHERE download_timestamp >= $1
            ORDER BY download_timestamp DESC
            LIMIT $2
            "#,
            FILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, FileRecordRow>(&sql)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn failed_files(&self) -> Result<Vec<FileRecordRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM claim_file_downloads WHERE status = 'FAILED' ORDER BY download_timestamp ASC",
            FILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, FileRecordRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn count_stale_failures(&self, older_than: DateTime<Utc>) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM claim_file_downloads
            WHERE status = 'FAILED' AND is_latest_version = FALSE AND download_timestamp < $1
            "#,
        )
        .bind(older_than)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn delete_stale_failures(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM claim_file_downloads
            WHERE status = 'FAILED' AND is_latest_version = FALSE AND download_timestamp < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Resets FAILED records to PENDING; `None` resets all of them
    pub async fn reset_failed(&self, file_ids: Option<Vec<String>>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE claim_file_downloads
            SET status = 'PENDING', error_message = NULL
            WHERE status = 'FAILED'
              AND ($1::text[] IS NULL OR file_id = ANY($1))
            "#,
        )
        .bind(file_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn daily_counts(&self, since: DateTime<Utc>) -> Result<Vec<DailyCountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DailyCountRow>(
            r#"
            SELECT (download_timestamp AT TIME ZONE 'UTC')::date AS day, status, COUNT(*) AS count
            FROM claim_file_downloads
            WHERE download_timestamp >= $1
            GROUP BY day, status
            ORDER BY day DESC, status ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
