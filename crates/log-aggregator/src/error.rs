use thiserror::Error;

/// Errors that can occur while archiving log records.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// A MongoDB driver error occurred.
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// The archive refused the insert.
    #[error("Archive unavailable: {0}")]
    Unavailable(String),

    /// A broker error occurred.
    #[error("Broker error: {0}")]
    Broker(#[from] broker::BrokerError),

    /// The MongoDB client could not be created.
    #[error("Catalog connection error: {0}")]
    Connect(#[from] catalog::CatalogError),

    #[error(transparent)]
    Config(#[from] common::ConfigError),

    #[error(transparent)]
    Metrics(#[from] common::telemetry::MetricsError),
}

/// Result type for aggregator operations.
pub type Result<T> = std::result::Result<T, AggregatorError>;
