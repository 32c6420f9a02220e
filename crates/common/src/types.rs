use serde::{Deserialize, Serialize};

/// Business key of a product.
///
/// Identifies a product in both the authoritative and the secondary store.
/// Never empty: deserializing a blank string fails, so a payload without a
/// usable key is rejected before it reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemCode(String);

/// Error returned when an item code is blank.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("itemcode must not be empty")]
pub struct InvalidItemCode;

impl ItemCode {
    /// Creates an item code, rejecting blank values.
    pub fn new(code: impl Into<String>) -> Result<Self, InvalidItemCode> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(InvalidItemCode);
        }
        Ok(Self(code))
    }

    /// Returns the item code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ItemCode {
    type Error = InvalidItemCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ItemCode {
    type Error = InvalidItemCode;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemCode> for String {
    fn from(code: ItemCode) -> Self {
        code.0
    }
}

impl AsRef<str> for ItemCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The unit of replication.
///
/// Wire field names (`itemcode`, `jenis`) are shared by the broker payload and
/// the authoritative document layout. Fields other than the key default to
/// their zero value when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "itemcode")]
    pub item_code: ItemCode,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    /// Product sub-type.
    #[serde(rename = "jenis", default)]
    pub kind: String,
}

impl Product {
    pub fn new(
        item_code: ItemCode,
        name: impl Into<String>,
        price: f64,
        category: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            item_code,
            name: name.into(),
            price,
            category: category.into(),
            kind: kind.into(),
        }
    }

    /// Decodes a mutation event body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Encodes the product as a mutation event body.
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A partial product carried by an update event.
///
/// Only the fields present in the payload are written to the secondary store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(rename = "itemcode")]
    pub item_code: Option<ItemCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "jenis", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ProductPatch {
    /// Decodes an update event body. The item code is mandatory.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<(ItemCode, Self)> {
        let patch: Self = serde_json::from_slice(body)?;
        match patch.item_code.clone() {
            Some(code) => Ok((code, patch)),
            None => Err(serde::de::Error::missing_field("itemcode")),
        }
    }
}

/// The operation an event requests, implied by the queue that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Insert,
    Update,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(MutationKind::Insert),
            "update" => Ok(MutationKind::Update),
            other => Err(format!("unknown mutation kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_code_rejects_blank() {
        assert_eq!(ItemCode::new(""), Err(InvalidItemCode));
        assert_eq!(ItemCode::new("   "), Err(InvalidItemCode));
        assert_eq!(ItemCode::new("SKU1").unwrap().as_str(), "SKU1");
    }

    #[test]
    fn product_uses_wire_field_names() {
        let product = Product::new(
            ItemCode::new("SKU1").unwrap(),
            "Widget",
            9.99,
            "tools",
            "hardware",
        );
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "itemcode": "SKU1",
                "name": "Widget",
                "price": 9.99,
                "category": "tools",
                "jenis": "hardware"
            })
        );
    }

    #[test]
    fn product_decode_defaults_missing_fields() {
        let product = Product::from_slice(br#"{"itemcode":"SKU9"}"#).unwrap();
        assert_eq!(product.item_code.as_str(), "SKU9");
        assert_eq!(product.name, "");
        assert_eq!(product.price, 0.0);
    }

    #[test]
    fn product_decode_fails_closed() {
        assert!(Product::from_slice(b"not json").is_err());
        assert!(Product::from_slice(br#"{"name":"Widget"}"#).is_err());
        assert!(Product::from_slice(br#"{"itemcode":""}"#).is_err());
        assert!(Product::from_slice(br#"{"itemcode":42}"#).is_err());
        assert!(Product::from_slice(br#"{"itemcode":"SKU1","price":"cheap"}"#).is_err());
    }

    #[test]
    fn patch_keeps_only_present_fields() {
        let (code, patch) = ProductPatch::from_slice(br#"{"itemcode":"SKU1","price":12.5}"#).unwrap();
        assert_eq!(code.as_str(), "SKU1");
        assert_eq!(patch.price, Some(12.5));
        assert_eq!(patch.name, None);
        assert_eq!(patch.kind, None);
    }

    #[test]
    fn patch_requires_item_code() {
        assert!(ProductPatch::from_slice(br#"{"price":12.5}"#).is_err());
        assert!(ProductPatch::from_slice(br#"{"itemcode":null,"price":1.0}"#).is_err());
    }

    #[test]
    fn mutation_kind_parses_its_own_display() {
        for kind in [MutationKind::Insert, MutationKind::Update] {
            assert_eq!(kind.to_string().parse::<MutationKind>().unwrap(), kind);
        }
        assert!("delete".parse::<MutationKind>().is_err());
    }
}
