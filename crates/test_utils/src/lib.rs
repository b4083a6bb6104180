//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! claim audit test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for upstream claims, documents and outcomes
//! - `database`: Tracking database container management
//! - `assertions`: Assertion helpers for rollup and audit state
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
