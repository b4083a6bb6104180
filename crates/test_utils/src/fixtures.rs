//! Pre-built Test Fixtures
//!
//! Ready-to-use values shared by the unit and integration tests. They are
//! fixed so that test output stays predictable.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{ClaimId, FileId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start of the report window used by the query fixtures
    pub fn report_window_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// A report date inside the window
    pub fn report_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap()
    }

    /// Upstream update timestamp of a freshly reported claim
    pub fn upstream_updated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap()
    }

    /// Upstream update timestamp after the claim was amended
    pub fn upstream_amended_at() -> DateTime<Utc> {
        Self::upstream_updated_at() + Duration::days(2)
    }

    /// Creation timestamp of an uploaded document
    pub fn document_created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 15, 0).unwrap()
    }

    /// Instant the reconciliation cycle runs at
    pub fn cycle_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 6, 0, 0).unwrap()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn claim_id() -> ClaimId {
        ClaimId::new(1_000_001)
    }

    pub fn other_claim_id() -> ClaimId {
        ClaimId::new(1_000_002)
    }

    pub fn file_id() -> FileId {
        FileId::new("8f3c2a9e41d04b6b")
    }

    /// A file id derived from a claim and an index, unique per pair
    pub fn file_id_for(claim_id: ClaimId, index: usize) -> FileId {
        FileId::new(format!("F{}-{:03}", claim_id, index))
    }
}

/// Fixture for declared amounts
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn labour() -> Decimal {
        dec!(1000.00)
    }

    pub fn parts() -> Decimal {
        dec!(500.00)
    }

    pub fn gross_credit() -> Decimal {
        dec!(1500.00)
    }
}

/// Fixture for upstream lookup values
pub struct LookupFixtures;

impl LookupFixtures {
    pub fn region_name() -> &'static str {
        "BRAZIL"
    }

    pub fn region_id() -> i64 {
        7
    }

    pub fn status_type_code() -> &'static str {
        "5618"
    }

    pub fn status_id() -> i64 {
        56_180_001
    }
}
