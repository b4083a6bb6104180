//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the claim document audit service, built on SQLx.
//!
//! # Architecture
//!
//! Two databases are involved:
//! - the **upstream** dealer system, read-only, queried by [`PostgresClaimSource`]
//! - the **tracking** store, owned by this service, written by [`PostgresTrackingStore`]
//!
//! Repositories hold the SQL; adapters implement the domain ports. The
//! tracking schema ships as embedded migrations applied by [`run_migrations`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresTrackingStore};
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresTrackingStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, create_pool_from_url, redact_url, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PostgresClaimSource, PostgresTrackingStore};
