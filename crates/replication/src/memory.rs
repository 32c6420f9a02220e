use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ItemCode, Product, ProductPatch};
use tokio::sync::RwLock;

use crate::store::ReplicaStore;
use crate::{ReplicationError, Result};

#[derive(Default)]
struct ReplicaState {
    rows: HashMap<ItemCode, Product>,
    failure: Option<String>,
    latency: Option<Duration>,
    writes: usize,
}

/// In-memory replica store for testing.
///
/// Can be told to fail every write or to stall before answering, to exercise
/// the dead-letter path.
#[derive(Clone, Default)]
pub struct InMemoryReplicaStore {
    state: Arc<RwLock<ReplicaState>>,
}

impl InMemoryReplicaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `message`, or clears the failure.
    pub async fn set_failure(&self, message: Option<&str>) {
        self.state.write().await.failure = message.map(str::to_string);
    }

    /// Delays every subsequent write by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Returns the number of stored rows.
    pub async fn row_count(&self) -> usize {
        self.state.read().await.rows.len()
    }

    /// Returns how many writes succeeded.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    /// Waits out the configured latency, then fails if a failure is set.
    async fn before_write(&self) -> Result<()> {
        let (latency, failure) = {
            let state = self.state.read().await;
            (state.latency, state.failure.clone())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(message) => Err(ReplicationError::Unavailable(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReplicaStore for InMemoryReplicaStore {
    async fn upsert(&self, product: &Product) -> Result<()> {
        self.before_write().await?;

        let mut state = self.state.write().await;
        state
            .rows
            .insert(product.item_code.clone(), product.clone());
        state.writes += 1;
        Ok(())
    }

    async fn update(&self, item_code: &ItemCode, patch: &ProductPatch) -> Result<u64> {
        self.before_write().await?;

        let mut state = self.state.write().await;
        let Some(row) = state.rows.get_mut(item_code) else {
            return Ok(0);
        };
        if let Some(name) = &patch.name {
            row.name = name.clone();
        }
        if let Some(price) = patch.price {
            row.price = price;
        }
        if let Some(category) = &patch.category {
            row.category = category.clone();
        }
        if let Some(kind) = &patch.kind {
            row.kind = kind.clone();
        }
        state.writes += 1;
        Ok(1)
    }

    async fn get(&self, item_code: &ItemCode) -> Result<Option<Product>> {
        Ok(self.state.read().await.rows.get(item_code).cloned())
    }
}
