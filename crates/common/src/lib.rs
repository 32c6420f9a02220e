//! Shared types for the product replication pipeline.
//!
//! - [`Product`] and [`ProductPatch`], the payloads carried by mutation events
//! - [`MutationKind`], the operation implied by the queue that carried an event
//! - [`LogRecord`] and [`DeadLetterRecord`], the two operational signals
//! - [`config`] helpers shared by every service binary
//! - [`telemetry`] tracing, metrics listener and shutdown signal setup

pub mod config;
pub mod records;
pub mod telemetry;
pub mod types;

pub use config::ConfigError;
pub use records::{DeadLetterRecord, LogRecord};
pub use types::{InvalidItemCode, ItemCode, MutationKind, Product, ProductPatch};
