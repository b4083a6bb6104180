//! Core Kernel - Foundational types for the claim audit service
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed identifiers for claims, files and cycles
//! - The port error type and marker traits for adapters
//! - Small text helpers used when persisting diagnostic messages

pub mod identifiers;
pub mod ports;
pub mod text;
pub mod error;

pub use identifiers::{ClaimId, FileId, CycleId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
pub use text::truncate_chars;
pub use error::CoreError;
