//! Compensation error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while compensating a failed mutation.
#[derive(Debug, Error)]
pub enum CompensationError {
    /// The authoritative store rejected the delete.
    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    /// The delete did not finish in time.
    #[error("Delete timed out after {0:?}")]
    Timeout(Duration),

    /// A broker error occurred.
    #[error("Broker error: {0}")]
    Broker(#[from] broker::BrokerError),

    /// Startup configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] common::ConfigError),

    /// The metrics exporter could not be installed.
    #[error(transparent)]
    Metrics(#[from] common::telemetry::MetricsError),
}

/// Result type for compensation operations.
pub type Result<T> = std::result::Result<T, CompensationError>;
