//! PostgreSQL Claim Source Adapter
//!
//! Implements [`ClaimSourcePort`] over the upstream dealer system tables.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, ClaimId, DomainPort, FileId, HealthCheckResult, HealthCheckable, PortError,
};
use domain_claims::{ClaimFilter, ClaimSourcePort, UpstreamClaim, UpstreamFile};

use crate::repositories::upstream::{UpstreamClaimRow, UpstreamFileRow, UpstreamRepository};

const ADAPTER_ID: &str = "postgres-claim-source";

/// PostgreSQL-backed claim source
#[derive(Debug, Clone)]
pub struct PostgresClaimSource {
    repository: UpstreamRepository,
    pool: PgPool,
}

impl PostgresClaimSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: UpstreamRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresClaimSource {}

#[async_trait]
impl HealthCheckable for PostgresClaimSource {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };

        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

impl From<UpstreamClaimRow> for UpstreamClaim {
    fn from(row: UpstreamClaimRow) -> Self {
        Self {
            claim_id: ClaimId::new(row.claim_id),
            claim_no: row.claim_no,
            vin: row.vin,
            gross_credit: row.gross_credit,
            report_date: row.report_date,
            labour_amount: row.labour_amount,
            part_amount: row.part_amount,
            upstream_updated_at: row.update_date,
            auditing_date: row.auditing_date,
            dealer_code: row.dealer_code,
            dealer_name: row.dealer_name,
        }
    }
}

impl From<UpstreamFileRow> for UpstreamFile {
    fn from(row: UpstreamFileRow) -> Self {
        Self {
            claim_id: ClaimId::new(row.bill_id),
            file_id: FileId::new(row.file_id),
            file_name: row.file_name,
            create_timestamp: row.create_date,
        }
    }
}

#[async_trait]
impl ClaimSourcePort for PostgresClaimSource {
    #[instrument(skip(self))]
    async fn region_id(&self, region_name: &str) -> Result<i64, PortError> {
        self.repository
            .find_region_id(region_name)
            .await?
            .ok_or_else(|| PortError::not_found("Region", region_name))
    }

    #[instrument(skip(self))]
    async fn status_code_id(&self, type_code: &str) -> Result<i64, PortError> {
        self.repository
            .find_status_code_id(type_code)
            .await?
            .ok_or_else(|| PortError::not_found("Status code", type_code))
    }

    #[instrument(skip(self, filter), fields(region_id = filter.region_id, status_id = filter.status_id))]
    async fn fetch_claims(&self, filter: &ClaimFilter) -> Result<Vec<UpstreamClaim>, PortError> {
        let rows = self
            .repository
            .find_claims(filter.region_id, filter.status_id, filter.report_date_from, filter.as_of)
            .await?;
        debug!(count = rows.len(), "Fetched upstream claims");
        Ok(rows.into_iter().map(UpstreamClaim::from).collect())
    }

    #[instrument(skip(self, claim_ids), fields(claims = claim_ids.len()))]
    async fn fetch_files(
        &self,
        claim_ids: &[ClaimId],
        document_type: &str,
    ) -> Result<Vec<UpstreamFile>, PortError> {
        if claim_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = claim_ids.iter().map(ClaimId::value).collect();
        let rows = self.repository.find_files(&ids, document_type).await?;
        debug!(count = rows.len(), "Fetched upstream files");
        Ok(rows.into_iter().map(UpstreamFile::from).collect())
    }
}
