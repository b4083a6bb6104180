//! Integration tests for the PostgreSQL adapters
//!
//! These run against a disposable PostgreSQL container and are ignored by
//! default. Run them with `cargo test -p infra_db -- --ignored`.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sqlx::PgPool;

use core_kernel::{ClaimId, FileId};
use domain_claims::{
    AttachmentStatus, AuditStatus, ClaimFilter, ClaimSourcePort, DownloadReportPort, FileStatus,
    TrackingStorePort,
};
use infra_db::{PostgresClaimSource, PostgresTrackingStore};
use test_utils::{
    db_test, DownloadOutcomeBuilder, IdFixtures, LookupFixtures, TemporalFixtures,
    UpstreamClaimBuilder,
};

async fn seed_upstream(pool: &PgPool) {
    sqlx::query("INSERT INTO tm_region (region_id, region_name) VALUES ($1, $2)")
        .bind(LookupFixtures::region_id())
        .bind(LookupFixtures::region_name())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO tc_code (code_id, type) VALUES ($1, $2)")
        .bind(LookupFixtures::status_id())
        .bind(LookupFixtures::status_type_code())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO tm_dealer (dealer_id, dealer_code, dealer_name, country_id) VALUES (1, 'BR-0042', 'Concessionaria Paulista', $1)")
        .bind(LookupFixtures::region_id())
        .execute(pool)
        .await
        .unwrap();

    for (claim_id, updated_offset_days) in [(IdFixtures::claim_id(), 0i64), (IdFixtures::other_claim_id(), 60)] {
        sqlx::query(
            r#"
            INSERT INTO wr_application (claim_id, claim_no, vin, gross_credit, report_date,
                labour_amount, part_amount, update_date, dealer_id, status)
            VALUES ($1, $2, 'VIN', 1500.00, $3, 1000.00, 500.00, $4, 1, $5)
            "#,
        )
        .bind(claim_id.value())
        .bind(format!("WC{}", claim_id))
        .bind(TemporalFixtures::report_date())
        .bind(TemporalFixtures::upstream_updated_at() + Duration::days(updated_offset_days))
        .bind(LookupFixtures::status_id())
        .execute(pool)
        .await
        .unwrap();
    }

    for (file_id, kind) in [("F-1", ".pdf"), ("F-2", ".pdf"), ("F-3", ".jpg")] {
        sqlx::query(
            "INSERT INTO tc_file_upload_info (file_id, bill_id, file_name, file_type_detail, create_date) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(file_id)
        .bind(IdFixtures::claim_id().value())
        .bind(format!("{}{}", file_id, kind))
        .bind(kind)
        .bind(TemporalFixtures::document_created_at())
        .execute(pool)
        .await
        .unwrap();
    }
}

db_test!(test_claim_source_reads_window_and_documents, |pool| {
    seed_upstream(&pool).await;
    let source = PostgresClaimSource::new(pool.clone());

    let region_id = source.region_id(LookupFixtures::region_name()).await.unwrap();
    let status_id = source.status_code_id(LookupFixtures::status_type_code()).await.unwrap();
    assert_eq!(region_id, LookupFixtures::region_id());

    let filter = ClaimFilter {
        region_id,
        status_id,
        report_date_from: TemporalFixtures::report_window_start(),
        as_of: TemporalFixtures::cycle_time(),
    };
    let claims = source.fetch_claims(&filter).await.unwrap();

    // The second claim was updated after the cycle instant.
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].claim_id, IdFixtures::claim_id());
    assert_eq!(claims[0].dealer_code.as_deref(), Some("BR-0042"));

    let files = source.fetch_files(&[IdFixtures::claim_id()], ".pdf").await.unwrap();
    let ids: Vec<_> = files.iter().map(|f| f.file_id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["F-1", "F-2"]);
});

db_test!(test_unknown_region_is_not_found, |pool| {
    let source = PostgresClaimSource::new(pool.clone());
    let error = source.region_id("ATLANTIS").await.unwrap_err();
    assert!(error.is_not_found());
});

db_test!(test_upsert_mirrors_upstream_and_keeps_tracking_columns, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    let upstream = UpstreamClaimBuilder::new().build();

    let inserted = store.upsert_claim(&upstream).await.unwrap();
    assert_eq!(inserted.attachment_status, AttachmentStatus::Pending);
    assert!(inserted.audit_status.is_none());

    store.set_total_files(upstream.claim_id, 2).await.unwrap();
    store
        .update_attachment_rollup(upstream.claim_id, 1, AttachmentStatus::Partial)
        .await
        .unwrap();

    let amended = UpstreamClaimBuilder::new()
        .with_amounts(dec!(1200.00), dec!(500.00))
        .with_updated_at(TemporalFixtures::upstream_amended_at())
        .build();
    let updated = store.upsert_claim(&amended).await.unwrap();

    assert_eq!(updated.labour_amount, Some(dec!(1200.00)));
    assert_eq!(updated.upstream_updated_at, TemporalFixtures::upstream_amended_at());
    assert_eq!(updated.total_files_count, 2);
    assert_eq!(updated.downloaded_files_count, 1);
    assert_eq!(updated.attachment_status, AttachmentStatus::Partial);
});

db_test!(test_merge_keeps_earlier_path_on_failure, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    store.upsert_claim(&UpstreamClaimBuilder::new().build()).await.unwrap();

    let first = store
        .merge_file_record(&DownloadOutcomeBuilder::success().with_local_path("/srv/a.pdf").build())
        .await
        .unwrap();
    assert_eq!(first.status, FileStatus::Success);

    let second = store
        .merge_file_record(&DownloadOutcomeBuilder::failure("HTTP 503").build())
        .await
        .unwrap();

    assert_eq!(second.status, FileStatus::Failed);
    assert_eq!(second.local_path, first.local_path);
    assert_eq!(second.error_message.as_deref(), Some("HTTP 503"));
    assert!(second.is_latest_version);
    assert_eq!(store.count_latest_successes(IdFixtures::claim_id()).await.unwrap(), 0);
});

db_test!(test_readiness_queries_follow_statuses, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    let claim_id = IdFixtures::claim_id();
    store.upsert_claim(&UpstreamClaimBuilder::new().build()).await.unwrap();
    store.set_total_files(claim_id, 1).await.unwrap();
    store
        .update_attachment_rollup(claim_id, 1, AttachmentStatus::Complete)
        .await
        .unwrap();

    assert_eq!(store.claims_ready_for_processing().await.unwrap().len(), 1);
    assert!(store.claims_ready_for_audit(10).await.unwrap().is_empty());

    store.set_audit_status(claim_id, AuditStatus::Pending, None).await.unwrap();
    assert_eq!(store.claims_ready_for_audit(10).await.unwrap().len(), 1);

    store
        .set_audit_status(claim_id, AuditStatus::Complete, Some("Amounts match within tolerance (5%)"))
        .await
        .unwrap();
    assert!(store.claims_ready_for_processing().await.unwrap().is_empty());

    let claim = store.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.audit_reason.as_deref(), Some("Amounts match within tolerance (5%)"));
});

db_test!(test_writes_to_missing_claim_report_not_found, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    let error = store.set_total_files(ClaimId::new(42), 3).await.unwrap_err();
    assert!(error.is_not_found());
});

db_test!(test_cleanup_and_reset_of_failed_downloads, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    let claim_id = IdFixtures::claim_id();
    store.upsert_claim(&UpstreamClaimBuilder::new().build()).await.unwrap();

    let stale = IdFixtures::file_id_for(claim_id, 1);
    let current = IdFixtures::file_id_for(claim_id, 2);
    for file_id in [&stale, &current] {
        store
            .merge_file_record(&DownloadOutcomeBuilder::failure("timeout").with_file_id(file_id.clone()).build())
            .await
            .unwrap();
    }

    // Only superseded records are cleanup candidates.
    store.mark_files_not_latest(claim_id).await.unwrap();
    store
        .merge_file_record(&DownloadOutcomeBuilder::failure("timeout").with_file_id(current.clone()).build())
        .await
        .unwrap();

    let future = Utc::now() + Duration::days(1);
    assert_eq!(store.count_cleanup_candidates(future).await.unwrap(), 1);
    assert_eq!(store.cleanup_failed(future).await.unwrap(), 1);

    let stats = store.download_statistics().await.unwrap();
    assert_eq!(stats.count_of(FileStatus::Failed), 1);

    assert_eq!(store.reset_failed(Some(&[current.clone()])).await.unwrap(), 1);
    assert!(store.failed_downloads().await.unwrap().is_empty());

    let daily = store.daily_breakdown(Utc::now() - Duration::days(30)).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].status, FileStatus::Pending);
});

db_test!(test_long_upstream_values_are_stored_whole, |pool| {
    let store = PostgresTrackingStore::new(pool.clone());
    let claim_no = format!("WC-{}", "9".repeat(80));
    let upstream = UpstreamClaimBuilder::new().with_claim_no(claim_no.clone()).build();
    let claim = store.upsert_claim(&upstream).await.unwrap();
    assert_eq!(claim.claim_no, claim_no);

    let mut outcome = DownloadOutcomeBuilder::failure("HTTP error 404")
        .with_file_id(FileId::new("f".repeat(120)))
        .build();
    outcome.claim_no = claim_no.clone();
    outcome.remote_file_name = format!("{}.pdf", "scan".repeat(100));
    let record = store.merge_file_record(&outcome).await.unwrap();

    assert_eq!(record.status, FileStatus::Failed);
    assert_eq!(record.remote_file_name, outcome.remote_file_name);
    let records = store.file_records_for_claims(&[upstream.claim_id]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_id.as_str().len(), 120);
});
