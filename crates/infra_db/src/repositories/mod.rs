//! Repository implementations
//!
//! Repositories encapsulate SQL and return row types. Mapping to domain
//! types happens in the adapters.
//!
//! - [`TrackingRepository`] owns the tracking tables and is the only writer.
//! - [`UpstreamRepository`] reads the dealer system and never writes.

pub mod tracking;
pub mod upstream;

pub use tracking::TrackingRepository;
pub use upstream::UpstreamRepository;
