use chrono::{SecondsFormat, Utc};
use common::LogRecord;
use serde::{Deserialize, Serialize};

/// One archived log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Ingestion time, RFC 3339.
    pub timestamp: String,
    pub message: String,
    /// Component that produced the record, when the body was a [`LogRecord`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LogEntry {
    /// Builds an entry from a consumed body, stamped with the current time.
    ///
    /// A JSON [`LogRecord`] contributes its message and source. Any other
    /// body is stored as text, with invalid UTF-8 replaced.
    pub fn ingest(body: &[u8]) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match serde_json::from_slice::<LogRecord>(body) {
            Ok(record) => Self {
                timestamp,
                message: record.message,
                source: Some(record.source),
            },
            Err(_) => Self {
                timestamp,
                message: String::from_utf8_lossy(body).into_owned(),
                source: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[test]
    fn ingests_log_record_json() {
        let record = LogRecord::new("replicator", "replication of insert event failed");
        let entry = LogEntry::ingest(&record.to_vec().unwrap());
        assert_eq!(entry.message, "replication of insert event failed");
        assert_eq!(entry.source.as_deref(), Some("replicator"));
        assert!(DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn ingests_plain_text_lossily() {
        let entry = LogEntry::ingest(b"disk full \xff");
        assert_eq!(entry.message, "disk full \u{fffd}");
        assert_eq!(entry.source, None);
    }
}
