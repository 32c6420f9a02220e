use async_trait::async_trait;
use common::{ItemCode, Product, ProductPatch};

use crate::Result;

/// Core trait for secondary store implementations.
///
/// Rows are keyed by item code. Both writes are idempotent, so replaying an
/// event leaves the replica in the same state.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Inserts the product, or overwrites every column of an existing row.
    async fn upsert(&self, product: &Product) -> Result<()>;

    /// Writes the fields present in `patch` to the row keyed by `item_code`.
    ///
    /// Returns the number of rows affected; zero means no such row exists.
    async fn update(&self, item_code: &ItemCode, patch: &ProductPatch) -> Result<u64>;

    /// Loads a row by item code.
    async fn get(&self, item_code: &ItemCode) -> Result<Option<Product>>;
}
