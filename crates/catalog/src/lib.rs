//! Authoritative product store.
//!
//! The catalog is the single source of truth for whether a product exists.
//! [`MongoCatalog`] keeps one document per product keyed by `itemcode`;
//! [`InMemoryCatalog`] offers the same interface for tests.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod mongo;

pub use catalog::ProductCatalog;
pub use error::{CatalogError, Result};
pub use memory::InMemoryCatalog;
pub use mongo::{MongoCatalog, connect};
