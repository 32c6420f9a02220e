use async_trait::async_trait;
use common::{ItemCode, Product};
use mongodb::bson::{self, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

use crate::catalog::ProductCatalog;
use crate::{CatalogError, Result};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Connects to MongoDB and verifies the connection with a ping.
pub async fn connect(uri: &str) -> Result<Client> {
    let client = Client::with_uri_str(uri).await?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await?;
    tracing::info!("connected to MongoDB");
    Ok(client)
}

/// MongoDB-backed product catalog.
#[derive(Clone)]
pub struct MongoCatalog {
    collection: Collection<Product>,
}

impl MongoCatalog {
    /// Creates a catalog over `database.collection`.
    pub fn new(client: &Client, database: &str, collection: &str) -> Self {
        Self {
            collection: client.database(database).collection(collection),
        }
    }

    /// Gets a reference to the underlying collection.
    pub fn collection(&self) -> &Collection<Product> {
        &self.collection
    }

    /// Creates the unique index on `itemcode` if it does not exist yet.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "itemcode": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    fn filter(item_code: &ItemCode) -> Document {
        doc! { "itemcode": item_code.as_str() }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl ProductCatalog for MongoCatalog {
    async fn ping(&self) -> Result<()> {
        self.collection
            .client()
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, product), fields(item_code = %product.item_code))]
    async fn insert(&self, product: &Product) -> Result<()> {
        self.collection.insert_one(product).await.map_err(|e| {
            if is_duplicate_key(&e) {
                CatalogError::AlreadyExists(product.item_code.clone())
            } else {
                CatalogError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn find(&self, item_code: &ItemCode) -> Result<Option<Product>> {
        Ok(self.collection.find_one(Self::filter(item_code)).await?)
    }

    #[tracing::instrument(skip(self, product), fields(item_code = %product.item_code))]
    async fn update(&self, product: &Product) -> Result<()> {
        let fields = bson::to_document(product)?;
        let result = self
            .collection
            .update_one(Self::filter(&product.item_code), doc! { "$set": fields })
            .await?;

        if result.matched_count == 0 {
            return Err(CatalogError::NotFound(product.item_code.clone()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(item_code = %item_code))]
    async fn delete(&self, item_code: &ItemCode) -> Result<bool> {
        let result = self.collection.delete_one(Self::filter(item_code)).await?;
        Ok(result.deleted_count > 0)
    }
}
