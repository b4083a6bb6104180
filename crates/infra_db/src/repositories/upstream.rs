//! Upstream dealer system repository
//!
//! Read-only queries against the warranty application tables of the
//! upstream system. Nothing here writes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::DatabaseError;

/// A claim joined with its dealer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpstreamClaimRow {
    pub claim_id: i64,
    pub claim_no: String,
    pub vin: Option<String>,
    pub gross_credit: Option<Decimal>,
    pub report_date: Option<DateTime<Utc>>,
    pub labour_amount: Option<Decimal>,
    pub part_amount: Option<Decimal>,
    pub update_date: DateTime<Utc>,
    pub auditing_date: Option<DateTime<Utc>>,
    pub dealer_code: Option<String>,
    pub dealer_name: Option<String>,
}

/// Document metadata attached to a claim
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpstreamFileRow {
    pub bill_id: i64,
    pub file_id: String,
    pub file_name: String,
    pub create_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpstreamRepository {
    pool: PgPool,
}

impl UpstreamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_region_id(&self, region_name: &str) -> Result<Option<i64>, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT region_id FROM tm_region WHERE region_name = $1")
            .bind(region_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn find_status_code_id(&self, type_code: &str) -> Result<Option<i64>, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT code_id FROM tc_code WHERE type = $1")
            .bind(type_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Claims of a region in a status, reported within `[from, as_of]` and
    /// last updated strictly before `as_of`
    pub async fn find_claims(
        &self,
        region_id: i64,
        status_id: i64,
        from: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<UpstreamClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, UpstreamClaimRow>(
            r#"
            SELECT a.claim_id, a.claim_no, a.vin, a.gross_credit, a.report_date,
                   a.labour_amount, a.part_amount, a.update_date, a.auditing_date,
                   d.dealer_code, d.dealer_name
            FROM wr_application a
            JOIN tm_dealer d ON d.dealer_id = a.dealer_id
            WHERE d.country_id = $1
              AND a.status = $2
              AND a.report_date BETWEEN $3 AND $4
              AND a.update_date < $4
            ORDER BY a.report_date ASC, a.claim_id ASC
            "#,
        )
        .bind(region_id)
        .bind(status_id)
        .bind(from)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_files(
        &self,
        claim_ids: &[i64],
        document_type: &str,
    ) -> Result<Vec<UpstreamFileRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, UpstreamFileRow>(
            r#"
            SELECT bill_id, file_id, file_name, create_date
            FROM tc_file_upload_info
            WHERE bill_id = ANY($1) AND file_type_detail = $2
            ORDER BY bill_id ASC, create_date ASC, file_id ASC
            "#,
        )
        .bind(claim_ids)
        .bind(document_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
