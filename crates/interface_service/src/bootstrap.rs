//! Service wiring
//!
//! Connects both databases, applies the tracking migrations and builds the
//! adapters a cycle runs against.

use std::sync::Arc;

use tracing::info;

use domain_claims::SimulatedAnalyzer;
use infra_db::{create_pool, run_migrations, PostgresClaimSource, PostgresTrackingStore};
use infra_http::HttpDocumentTransfer;

use crate::config::ConfigProvider;
use crate::error::ServiceError;
use crate::orchestrator::{CycleOrchestrator, CycleSettings, ServicePorts};

impl ConfigProvider {
    pub fn cycle_settings(&self) -> CycleSettings {
        let settings = self.settings();
        CycleSettings {
            claim_query: self.claim_query(),
            document_type: settings.query_params.document_type.clone(),
            file_batch_size: settings.query_params.file_batch_size,
            max_workers: settings.download.max_workers,
            matching: self.matching_config(),
            failed_retention: self.failed_retention(),
        }
    }
}

/// Opens the tracking store alone, migrated
pub async fn connect_tracking_store(provider: &ConfigProvider) -> Result<Arc<PostgresTrackingStore>, ServiceError> {
    let database = provider.database()?;
    let pool = create_pool(database.tracking_pool()).await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(PostgresTrackingStore::new(pool)))
}

/// Builds every adapter of the service
pub async fn connect_ports(provider: &ConfigProvider) -> Result<ServicePorts, ServiceError> {
    let database = provider.database()?;

    let source_pool = create_pool(database.source_pool()).await?;
    let store = connect_tracking_store(provider).await?;
    let transfer = HttpDocumentTransfer::new(provider.transfer_config())?;

    info!(environment = %provider.mode(), "Adapters connected");

    Ok(ServicePorts {
        source: Arc::new(PostgresClaimSource::new(source_pool)),
        store: store.clone(),
        reports: store,
        transfer: Arc::new(transfer),
        analyzer: Arc::new(SimulatedAnalyzer::new()),
    })
}

/// Builds the orchestrator for a validated configuration
pub async fn build_orchestrator(provider: &ConfigProvider) -> Result<CycleOrchestrator, ServiceError> {
    let ports = connect_ports(provider).await?;
    Ok(CycleOrchestrator::new(ports, provider.cycle_settings()))
}
