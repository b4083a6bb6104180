//! Claim Document Audit Domain
//!
//! This crate implements the lifecycle of a dealer claim's supporting
//! documents, from discovery in the upstream source through download
//! tracking to the amount-matching audit.
//!
//! # Claim Lifecycle
//!
//! ```text
//! reconcile -> resolve files -> download (PENDING/PARTIAL/COMPLETE)
//!           -> process (audit PENDING) -> match (COMPLETE/REJECTED)
//! ```

pub mod claim;
pub mod file_record;
pub mod ports;
pub mod reconciler;
pub mod resolver;
pub mod tracker;
pub mod audit;
pub mod matching;
pub mod analyzer;
pub mod memory;
pub mod error;

pub use claim::{AttachmentStatus, AuditStatus, Claim, SelectionReason, UpstreamClaim};
pub use file_record::{DownloadOutcome, FileCandidate, FileRecord, FileStatus, UpstreamFile, MAX_ERROR_MESSAGE_CHARS};
pub use ports::{
    ClaimFilter, ClaimSourcePort, DocumentTransferPort, DownloadReportPort, TrackingStorePort,
    TransferOutcome, TransferRequest,
};
pub use reconciler::{ClaimQuery, ClaimReconciler};
pub use resolver::{FileSetResolver, DEFAULT_DOCUMENT_TYPE, MAX_CLAIM_BATCH};
pub use tracker::DownloadTracker;
pub use audit::{AuditStatusMachine, AuditSummary, ProcessingSummary};
pub use matching::{MatchResult, MatchingConfig, MatchingReport};
pub use analyzer::{DocumentAnalyzer, FixedAmountsAnalyzer, SimulatedAnalyzer};
pub use memory::{InMemoryClaimSource, InMemoryTrackingStore, ScriptedTransfer};
pub use error::ClaimError;
