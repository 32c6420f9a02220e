use std::sync::Arc;

use async_trait::async_trait;
use mongodb::{Client, Collection};
use tokio::sync::RwLock;

use crate::entry::LogEntry;
use crate::{AggregatorError, Result};

/// Append-only store for log entries.
#[async_trait]
pub trait LogArchive: Send + Sync {
    async fn append(&self, entry: &LogEntry) -> Result<()>;
}

/// MongoDB collection of log entries.
#[derive(Clone)]
pub struct MongoLogArchive {
    collection: Collection<LogEntry>,
}

impl MongoLogArchive {
    pub fn new(client: &Client, database: &str, collection: &str) -> Self {
        Self {
            collection: client.database(database).collection(collection),
        }
    }
}

#[async_trait]
impl LogArchive for MongoLogArchive {
    async fn append(&self, entry: &LogEntry) -> Result<()> {
        self.collection.insert_one(entry).await?;
        Ok(())
    }
}

#[derive(Default)]
struct ArchiveState {
    entries: Vec<LogEntry>,
    unavailable: bool,
}

/// In-memory log archive for testing.
#[derive(Clone, Default)]
pub struct InMemoryLogArchive {
    state: Arc<RwLock<ArchiveState>>,
}

impl InMemoryLogArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append fail.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the archived entries in insertion order.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.state.read().await.entries.clone()
    }
}

#[async_trait]
impl LogArchive for InMemoryLogArchive {
    async fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(AggregatorError::Unavailable("archive offline".to_string()));
        }
        state.entries.push(entry.clone());
        Ok(())
    }
}
