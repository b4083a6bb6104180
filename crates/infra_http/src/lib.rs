//! HTTP Infrastructure
//!
//! The document transfer adapter: fetches claim documents from the document
//! server and stores them in the dated local folder layout.

pub mod error;
pub mod transfer;

pub use error::TransferError;
pub use transfer::{HttpDocumentTransfer, HttpTransferConfig, DEFAULT_USER_AGENT};
