//! Replication error types.

use std::time::Duration;

use common::ItemCode;
use thiserror::Error;

/// Errors that can occur while replicating a mutation.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A database error occurred in the replica store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store operation did not finish in time.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// An update matched no row in the replica.
    #[error("No replica row for item code {0}")]
    MissingRow(ItemCode),

    /// A replica row could not be read back as a product.
    #[error("Invalid replica row: {0}")]
    InvalidRow(String),

    /// The store refused the operation.
    #[error("Replica store unavailable: {0}")]
    Unavailable(String),

    /// A consumer task panicked or was cancelled.
    #[error("Consumer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

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

/// Result type for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;
