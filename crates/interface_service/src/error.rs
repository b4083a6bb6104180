//! Service error types

use thiserror::Error;

use core_kernel::PortError;
use domain_claims::ClaimError;
use infra_db::DatabaseError;
use infra_http::TransferError;

/// Errors raised while configuring or wiring the service
///
/// Once the scheduler runs, cycle failures are logged and never surface as
/// a `ServiceError`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A configuration value failed an explicit check
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configuration sources could not be read or deserialized
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// A configuration section failed its declared constraints
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Transfer setup error: {0}")]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Store error: {0}")]
    Port(#[from] PortError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup error: {0}")]
    Logging(String),
}

impl ServiceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Whether the error stems from invalid configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ServiceError::Configuration(_)
                | ServiceError::ConfigSource(_)
                | ServiceError::Validation(_)
                | ServiceError::Claim(ClaimError::InvalidConfiguration(_))
        )
    }
}
