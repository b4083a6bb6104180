//! Claims domain errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur in the claims domain
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Invalid audit status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid matching configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Document analysis failed: {0}")]
    Analysis(String),

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl ClaimError {
    /// Returns true when the failure came from a backing store
    pub fn is_store_error(&self) -> bool {
        matches!(self, ClaimError::Store(_))
    }
}
