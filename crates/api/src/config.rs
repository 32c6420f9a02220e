//! Application configuration loaded from environment variables.

use common::config::{self, ConfigError};

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `AMQP_URI`, `MONGO_URI`, `DB_NAME`, `PRODUCT_COLLECTION_NAME`: required
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub amqp_uri: String,
    pub mongo_uri: String,
    pub db_name: String,
    pub product_collection: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: config::optional(lookup, "HOST", "0.0.0.0"),
            port: config::parsed(lookup, "PORT", 8080)?,
            amqp_uri: config::required(lookup, "AMQP_URI")?,
            mongo_uri: config::required(lookup, "MONGO_URI")?,
            db_name: config::required(lookup, "DB_NAME")?,
            product_collection: config::required(lookup, "PRODUCT_COLLECTION_NAME")?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(key: &str) -> Option<String> {
        match key {
            "AMQP_URI" => Some("amqp://localhost".to_string()),
            "MONGO_URI" => Some("mongodb://localhost:27017".to_string()),
            "DB_NAME" => Some("shop".to_string()),
            "PRODUCT_COLLECTION_NAME" => Some("products".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(&lookup).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.product_collection, "products");
    }

    #[test]
    fn test_addr_formatting() {
        let with_port = |key: &str| match key {
            "HOST" => Some("127.0.0.1".to_string()),
            "PORT" => Some("9000".to_string()),
            other => lookup(other),
        };
        let config = Config::from_lookup(&with_port).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_broker_uri() {
        let without_amqp = |key: &str| match key {
            "AMQP_URI" => None,
            other => lookup(other),
        };
        assert_eq!(
            Config::from_lookup(&without_amqp).unwrap_err(),
            ConfigError::Missing("AMQP_URI")
        );
    }
}
