//! Transfer error types
//!
//! These never cross the port boundary. The adapter renders them into the
//! failure reason of a [`TransferOutcome`](domain_claims::TransferOutcome).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// The document server answered with a non-success status
    #[error("HTTP error {status}")]
    Http { status: u16 },

    /// Connection, timeout or body read failure
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Local storage failure
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too small: {bytes} bytes (minimum {min})")]
    TooSmall { bytes: u64, min: u64 },

    #[error("File too large: more than {max} bytes")]
    TooLarge { max: u64 },
}

impl TransferError {
    /// Whether retrying the same transfer later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Http { status } => *status >= 500 || *status == 429,
            TransferError::Request(e) => e.is_timeout() || e.is_connect(),
            TransferError::Io(_) | TransferError::TooSmall { .. } | TransferError::TooLarge { .. } => false,
        }
    }
}
