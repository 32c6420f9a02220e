//! Item code extraction from dead-letter bodies.

use common::ItemCode;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

/// Why no item code could be read from a dead-letter body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("body is not JSON: {0}")]
    NotJson(String),

    #[error("body is not valid extended JSON: {0}")]
    InvalidExtendedJson(String),

    #[error("body is not a JSON object")]
    NotAnObject,

    #[error("body has no itemcode")]
    Missing,

    #[error("itemcode is not a non-empty string")]
    Invalid,
}

/// Reads the `itemcode` of a dead-lettered product.
///
/// The body may be plain JSON or MongoDB extended JSON (`{"$oid": ...}`,
/// `{"$numberDouble": ...}` and similar). Only a non-empty string item code
/// is accepted.
pub fn extract_item_code(body: &[u8]) -> Result<ItemCode, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ExtractError::NotJson(e.to_string()))?;
    let document = match Bson::try_from(value) {
        Ok(Bson::Document(document)) => document,
        Ok(_) => return Err(ExtractError::NotAnObject),
        Err(e) => return Err(ExtractError::InvalidExtendedJson(e.to_string())),
    };
    item_code_of(&document)
}

fn item_code_of(document: &Document) -> Result<ItemCode, ExtractError> {
    match document.get("itemcode") {
        None | Some(Bson::Null) => Err(ExtractError::Missing),
        Some(Bson::String(code)) => ItemCode::new(code.as_str()).map_err(|_| ExtractError::Invalid),
        Some(_) => Err(ExtractError::Invalid),
    }
}
