//! Domain Adapters
//!
//! Implementations of the claim domain ports on PostgreSQL. Each adapter
//! wraps a repository, translates rows into domain types and maps
//! database errors into port errors.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresClaimSource, PostgresTrackingStore};
//!
//! let source = PostgresClaimSource::new(upstream_pool);
//! let store = PostgresTrackingStore::new(tracking_pool);
//! ```

pub mod tracking;
pub mod upstream;

pub use tracking::PostgresTrackingStore;
pub use upstream::PostgresClaimSource;
