use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ItemCode, Product};
use tokio::sync::RwLock;

use crate::catalog::ProductCatalog;
use crate::{CatalogError, Result};

#[derive(Default)]
struct CatalogState {
    products: HashMap<ItemCode, Product>,
    delete_calls: usize,
    fail_on_delete: bool,
    unavailable: bool,
}

/// In-memory product catalog for testing.
///
/// Provides the same interface as [`crate::MongoCatalog`], plus switches to
/// simulate an unavailable store.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent delete fail.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Makes every subsequent operation fail.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }

    /// Returns true if a product with this item code is stored.
    pub async fn contains(&self, item_code: &ItemCode) -> bool {
        self.state.read().await.products.contains_key(item_code)
    }

    /// Returns how many deletes have been attempted, including failed ones.
    pub async fn delete_calls(&self) -> usize {
        self.state.read().await.delete_calls
    }
}

fn check_available(state: &CatalogState) -> Result<()> {
    if state.unavailable {
        return Err(CatalogError::Unavailable("connection refused".to_string()));
    }
    Ok(())
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn ping(&self) -> Result<()> {
        check_available(&*self.state.read().await)
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        if state.products.contains_key(&product.item_code) {
            return Err(CatalogError::AlreadyExists(product.item_code.clone()));
        }
        state
            .products
            .insert(product.item_code.clone(), product.clone());
        Ok(())
    }

    async fn find(&self, item_code: &ItemCode) -> Result<Option<Product>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.products.get(item_code).cloned())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        match state.products.get_mut(&product.item_code) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(CatalogError::NotFound(product.item_code.clone())),
        }
    }

    async fn delete(&self, item_code: &ItemCode) -> Result<bool> {
        let mut state = self.state.write().await;
        state.delete_calls += 1;
        check_available(&state)?;

        if state.fail_on_delete {
            return Err(CatalogError::Unavailable("delete timed out".to_string()));
        }
        Ok(state.products.remove(item_code).is_some())
    }
}
