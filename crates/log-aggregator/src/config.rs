//! Log aggregator configuration loaded from environment variables.

use broker::AckMode;
use common::config::{self, ConfigError};

/// Log aggregator settings.
///
/// Reads from environment variables:
/// - `AMQP_URI`, `MONGO_URI`, `DB_NAME`, `LOG_COLLECTION_NAME` (required)
/// - `ACK_MODE` (default `auto`)
/// - `METRICS_PORT`
#[derive(Debug, Clone)]
pub struct Config {
    pub amqp_uri: String,
    pub mongo_uri: String,
    pub db_name: String,
    pub log_collection: String,
    pub ack_mode: AckMode,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            amqp_uri: config::required(lookup, "AMQP_URI")?,
            mongo_uri: config::required(lookup, "MONGO_URI")?,
            db_name: config::required(lookup, "DB_NAME")?,
            log_collection: config::required(lookup, "LOG_COLLECTION_NAME")?,
            ack_mode: config::parsed(lookup, "ACK_MODE", AckMode::Auto)?,
            metrics_port: config::parsed_opt(lookup, "METRICS_PORT")?,
        })
    }
}
