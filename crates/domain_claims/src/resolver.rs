//! File set resolution for claims selected by the reconciler

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use core_kernel::{ClaimId, FileId};

use crate::claim::Claim;
use crate::file_record::{FileCandidate, FileRecord};
use crate::ports::{ClaimSourcePort, TrackingStorePort};
use crate::tracker::DownloadTracker;

/// Largest number of claim ids sent to the upstream source in one query
pub const MAX_CLAIM_BATCH: usize = 999;

/// Document type fetched when none is configured
pub const DEFAULT_DOCUMENT_TYPE: &str = ".pdf";

/// Enumerates the current documents of claims in bounded batches
pub struct FileSetResolver {
    source: Arc<dyn ClaimSourcePort>,
    store: Arc<dyn TrackingStorePort>,
    tracker: DownloadTracker,
    document_type: String,
    batch_size: usize,
}

impl FileSetResolver {
    /// Creates a resolver; `batch_size` is clamped to `1..=MAX_CLAIM_BATCH`
    pub fn new(
        source: Arc<dyn ClaimSourcePort>,
        store: Arc<dyn TrackingStorePort>,
        document_type: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        let tracker = DownloadTracker::new(Arc::clone(&store));
        Self {
            source,
            store,
            tracker,
            document_type: document_type.into(),
            batch_size: batch_size.clamp(1, MAX_CLAIM_BATCH),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolves the documents to download for `claims`
    ///
    /// Per batch, existing records of each claim are retired first, then the
    /// batch's documents are fetched and every claim's document count and
    /// rollup are refreshed. A claim whose records cannot be retired is left
    /// out. A batch whose fetch fails yields no candidates, but the rollup of
    /// its retired claims is still recomputed so none stays COMPLETE without
    /// latest documents.
    pub async fn resolve_files_for(&self, claims: &[Claim]) -> Vec<FileCandidate> {
        let mut candidates = Vec::new();

        for (index, chunk) in claims.chunks(self.batch_size).enumerate() {
            let resolved = self.resolve_chunk(chunk).await;
            debug!(batch = index, claims = chunk.len(), files = resolved.len(), "Resolved claim batch");
            candidates.extend(resolved);
        }

        info!(claims = claims.len(), files = candidates.len(), "File resolution finished");
        candidates
    }

    async fn resolve_chunk(&self, chunk: &[Claim]) -> Vec<FileCandidate> {
        let mut included: BTreeMap<ClaimId, &Claim> = BTreeMap::new();
        for claim in chunk {
            match self.store.mark_files_not_latest(claim.claim_id).await {
                Ok(retired) => {
                    debug!(claim_id = %claim.claim_id, retired, "Retired previous file versions");
                    included.insert(claim.claim_id, claim);
                }
                Err(e) => {
                    warn!(claim_id = %claim.claim_id, error = %e, "Failed to retire file versions, skipping claim");
                }
            }
        }

        if included.is_empty() {
            return Vec::new();
        }

        let claim_ids: Vec<ClaimId> = included.keys().copied().collect();
        let mut files = match self.source.fetch_files(&claim_ids, &self.document_type).await {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, claims = claim_ids.len(), "Failed to fetch documents for batch, skipping");
                self.refresh_retired(&claim_ids).await;
                return Vec::new();
            }
        };
        files.retain(|file| included.contains_key(&file.claim_id));
        files.sort_by(|a, b| {
            a.claim_id
                .cmp(&b.claim_id)
                .then(a.create_timestamp.cmp(&b.create_timestamp))
                .then(a.file_id.cmp(&b.file_id))
        });

        let mut totals: HashMap<ClaimId, u32> = HashMap::new();
        for file in &files {
            *totals.entry(file.claim_id).or_default() += 1;
        }

        for claim_id in &claim_ids {
            let total = totals.get(claim_id).copied().unwrap_or(0);
            if let Err(e) = self.store.set_total_files(*claim_id, total).await {
                warn!(claim_id = %claim_id, error = %e, "Failed to store document count");
                continue;
            }
            if let Err(e) = self.tracker.recompute_attachment(*claim_id).await {
                warn!(claim_id = %claim_id, error = %e, "Failed to recompute attachment status");
            }
        }

        let existing: HashMap<FileId, FileRecord> = match self.store.file_records_for_claims(&claim_ids).await {
            Ok(records) => records.into_iter().map(|record| (record.file_id.clone(), record)).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to read existing file records");
                HashMap::new()
            }
        };

        files
            .into_iter()
            .filter_map(|file| {
                let claim = included.get(&file.claim_id)?;
                Some(FileCandidate {
                    existing: existing.get(&file.file_id).cloned(),
                    claim_no: claim.claim_no.clone(),
                    claim_updated_at: claim.upstream_updated_at,
                    file,
                })
            })
            .collect()
    }

    /// Recomputes the rollup of claims whose records were retired
    async fn refresh_retired(&self, claim_ids: &[ClaimId]) {
        for claim_id in claim_ids {
            if let Err(e) = self.tracker.recompute_attachment(*claim_id).await {
                warn!(claim_id = %claim_id, error = %e, "Failed to recompute attachment status");
            }
        }
    }
}
