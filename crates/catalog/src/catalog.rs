use async_trait::async_trait;
use common::{ItemCode, Product};

use crate::Result;

/// Core trait for authoritative product stores.
///
/// Every operation is keyed by the product's item code. Implementations must
/// be safe to share between tasks.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Stores a new product.
    ///
    /// Fails with `AlreadyExists` if the item code is taken.
    async fn insert(&self, product: &Product) -> Result<()>;

    /// Loads a product by item code.
    async fn find(&self, item_code: &ItemCode) -> Result<Option<Product>>;

    /// Replaces the fields of an existing product.
    ///
    /// Fails with `NotFound` if no product has this item code.
    async fn update(&self, product: &Product) -> Result<()>;

    /// Deletes a product.
    ///
    /// Returns whether a product was removed. Deleting an absent product
    /// succeeds, so repeating a delete is harmless.
    async fn delete(&self, item_code: &ItemCode) -> Result<bool>;
}
