//! Environment lookups shared by the service configurations.
//!
//! Every service reads its settings through a lookup function so the same
//! parsing runs against the process environment and against a map in tests.
//! Required settings never fall back to a default.

use std::str::FromStr;

use thiserror::Error;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Reads a variable from the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Returns the value of a required, non-blank setting.
pub fn required(lookup: &dyn Fn(&str) -> Option<String>, name: &'static str) -> Result<String> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Returns the value of an optional setting, or `default` when unset.
pub fn optional(lookup: &dyn Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parses an optional setting, or returns `default` when unset.
pub fn parsed<T>(lookup: &dyn Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parses an optional setting that has no default.
pub fn parsed_opt<T>(lookup: &dyn Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Checks that a table or collection name is a plain identifier.
///
/// Table names are interpolated into SQL, so only ASCII letters, digits and
/// underscores are accepted, and the first character must not be a digit.
pub fn identifier(name: &'static str, value: String) -> Result<String> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            reason: format!("{value:?} is not a valid identifier"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        let lookup = lookup_from(&[("BLANK", "  ")]);
        assert_eq!(required(&lookup, "ABSENT"), Err(ConfigError::Missing("ABSENT")));
        assert_eq!(required(&lookup, "BLANK"), Err(ConfigError::Missing("BLANK")));
    }

    #[test]
    fn optional_falls_back_to_default() {
        let lookup = lookup_from(&[("SET", "value")]);
        assert_eq!(optional(&lookup, "SET", "default"), "value");
        assert_eq!(optional(&lookup, "UNSET", "default"), "default");
    }

    #[test]
    fn parsed_reports_invalid_values() {
        let lookup = lookup_from(&[("PORT", "eighty")]);
        let err = parsed::<u16>(&lookup, "PORT", 8080).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        assert_eq!(parsed::<u16>(&lookup, "OTHER_PORT", 8080), Ok(8080));
    }

    #[test]
    fn parsed_opt_is_none_when_unset() {
        let lookup = lookup_from(&[("METRICS_PORT", "9100"), ("BAD", "x")]);
        assert_eq!(parsed_opt::<u16>(&lookup, "METRICS_PORT"), Ok(Some(9100)));
        assert_eq!(parsed_opt::<u16>(&lookup, "UNSET"), Ok(None));
        assert!(parsed_opt::<u16>(&lookup, "BAD").is_err());
    }

    #[test]
    fn identifier_accepts_only_plain_names() {
        assert!(identifier("T", "products".to_string()).is_ok());
        assert!(identifier("T", "_products_v2".to_string()).is_ok());
        assert!(identifier("T", "2products".to_string()).is_err());
        assert!(identifier("T", "products; DROP TABLE x".to_string()).is_err());
        assert!(identifier("T", String::new()).is_err());
    }
}
