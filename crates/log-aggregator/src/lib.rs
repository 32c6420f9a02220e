//! Log aggregation for the replication pipeline.
//!
//! [`LogAggregator`] drains the logging queue into a [`LogArchive`]. Each
//! message becomes one [`LogEntry`] stamped at ingestion time. Failed inserts
//! are logged locally and dropped.

pub mod aggregator;
pub mod archive;
pub mod config;
pub mod entry;
pub mod error;

pub use aggregator::LogAggregator;
pub use archive::{InMemoryLogArchive, LogArchive, MongoLogArchive};
pub use config::Config;
pub use entry::LogEntry;
pub use error::{AggregatorError, Result};
