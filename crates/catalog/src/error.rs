use common::ItemCode;
use thiserror::Error;

/// Errors that can occur when interacting with the product catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A product with this item code already exists.
    #[error("Product already exists: {0}")]
    AlreadyExists(ItemCode),

    /// No product with this item code exists.
    #[error("Product not found: {0}")]
    NotFound(ItemCode),

    /// A MongoDB driver error occurred.
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A product could not be converted to a document.
    #[error("Serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    /// The store is unreachable or refused the operation.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
