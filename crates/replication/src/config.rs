//! Replicator configuration loaded from environment variables.

use std::time::Duration;

use broker::AckMode;
use common::config::{self, ConfigError};

/// Replicator settings.
///
/// Reads from environment variables:
/// - `AMQP_URI` (required)
/// - `DATABASE_URL` (required), the PostgreSQL replica
/// - `REPLICA_TABLE` (default `products`)
/// - `ACK_MODE`, `auto` or `after-processing` (default `auto`)
/// - `STORE_TIMEOUT_SECS` (default `10`)
/// - `METRICS_PORT`, serves Prometheus metrics when set
#[derive(Debug, Clone)]
pub struct Config {
    pub amqp_uri: String,
    pub database_url: String,
    pub replica_table: String,
    pub ack_mode: AckMode,
    pub store_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::env_lookup)
    }

    /// Loads configuration through `lookup`.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs: u64 = config::parsed(lookup, "STORE_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "STORE_TIMEOUT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            amqp_uri: config::required(lookup, "AMQP_URI")?,
            database_url: config::required(lookup, "DATABASE_URL")?,
            replica_table: config::identifier(
                "REPLICA_TABLE",
                config::optional(lookup, "REPLICA_TABLE", "products"),
            )?,
            ack_mode: config::parsed(lookup, "ACK_MODE", AckMode::Auto)?,
            store_timeout: Duration::from_secs(timeout_secs),
            metrics_port: config::parsed_opt(lookup, "METRICS_PORT")?,
        })
    }
}
