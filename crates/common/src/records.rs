//! Operational signals: log records and dead-letter records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MutationKind;

/// Header carrying the processing error of a dead-lettered message.
pub const HEADER_ERROR: &str = "x-error";

/// Header carrying the mutation kind of a dead-lettered message.
pub const HEADER_MUTATION_KIND: &str = "x-mutation-kind";

/// Header carrying the queue a dead-lettered message was consumed from.
pub const HEADER_SOURCE_QUEUE: &str = "x-source-queue";

/// A diagnostic message destined for the log aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    /// Component that produced the record, e.g. `replicator`.
    pub source: String,
    pub message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A message whose replication failed.
///
/// The body is the original payload, byte for byte. The error text and the
/// mutation kind travel next to it as message headers so the body is never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterRecord {
    pub body: Vec<u8>,
    pub error: String,
    pub kind: Option<MutationKind>,
    pub source_queue: Option<String>,
}

impl DeadLetterRecord {
    pub fn new(
        body: Vec<u8>,
        error: impl Into<String>,
        kind: MutationKind,
        source_queue: impl Into<String>,
    ) -> Self {
        Self {
            body,
            error: error.into(),
            kind: Some(kind),
            source_queue: Some(source_queue.into()),
        }
    }

    /// Rebuilds a record from a consumed body and its headers.
    ///
    /// Missing or unrecognised headers leave the corresponding field empty;
    /// they never make the record unusable.
    pub fn from_parts(body: Vec<u8>, headers: &BTreeMap<String, String>) -> Self {
        Self {
            body,
            error: headers.get(HEADER_ERROR).cloned().unwrap_or_default(),
            kind: headers
                .get(HEADER_MUTATION_KIND)
                .and_then(|k| k.parse().ok()),
            source_queue: headers.get(HEADER_SOURCE_QUEUE).cloned(),
        }
    }

    /// Headers to publish alongside the body.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_ERROR.to_string(), self.error.clone());
        if let Some(kind) = self.kind {
            headers.insert(HEADER_MUTATION_KIND.to_string(), kind.to_string());
        }
        if let Some(queue) = &self.source_queue {
            headers.insert(HEADER_SOURCE_QUEUE.to_string(), queue.clone());
        }
        headers
    }
}
