//! Replication of product mutations into the secondary relational store.
//!
//! - [`ReplicaStore`] is the write seam for the secondary store;
//!   [`PostgresReplicaStore`] is the production implementation and
//!   [`InMemoryReplicaStore`] is used by tests
//! - [`ReplicationConsumer`] subscribes to the insert and update queues,
//!   applies each event and dead-letters the ones it cannot apply

pub mod config;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::Config;
pub use consumer::{Mutation, ReplicationConsumer, ReplicationOutcome};
pub use error::{ReplicationError, Result};
pub use memory::InMemoryReplicaStore;
pub use postgres::PostgresReplicaStore;
pub use store::ReplicaStore;
