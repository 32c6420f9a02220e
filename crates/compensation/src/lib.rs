//! Compensation for failed replication.
//!
//! Every record on the dead-letter queue names a product whose replication
//! failed. [`CompensationHandler`] deletes that product from the
//! authoritative store so the two stores converge again. The item code is
//! read with [`extract_item_code`], which accepts plain and MongoDB extended
//! JSON.

pub mod config;
pub mod error;
pub mod extract;
pub mod handler;

pub use config::Config;
pub use error::{CompensationError, Result};
pub use extract::{ExtractError, extract_item_code};
pub use handler::{CompensationHandler, CompensationOutcome};
