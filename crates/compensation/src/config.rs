//! Compensator configuration loaded from environment variables.

use std::time::Duration;

use broker::AckMode;
use common::config::{self, ConfigError};

/// Compensator settings.
///
/// Reads `AMQP_URI`, `MONGO_URI`, `DB_NAME` and `PRODUCT_COLLECTION_NAME`
/// (all required), plus `ACK_MODE`, `STORE_TIMEOUT_SECS` and `METRICS_PORT`.
#[derive(Debug, Clone)]
pub struct Config {
    pub amqp_uri: String,
    pub mongo_uri: String,
    pub db_name: String,
    pub product_collection: String,
    pub ack_mode: AckMode,
    pub delete_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::env_lookup)
    }

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
            mongo_uri: config::required(lookup, "MONGO_URI")?,
            db_name: config::required(lookup, "DB_NAME")?,
            product_collection: config::required(lookup, "PRODUCT_COLLECTION_NAME")?,
            ack_mode: config::parsed(lookup, "ACK_MODE", AckMode::Auto)?,
            delete_timeout: Duration::from_secs(timeout_secs),
            metrics_port: config::parsed_opt(lookup, "METRICS_PORT")?,
        })
    }
}
