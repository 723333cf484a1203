use serde::{Deserialize, Serialize};

/// Product — a single inventory item.
/// PK = id; `barcode` is unique across all products and immutable once set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,

    pub name: String,

    pub price: f64,

    /// Human-readable scan code, e.g. `REDMUG-001`. Allocated from the name
    /// family when the client does not supply one.
    pub barcode: String,

    /// Opaque reference to the uploaded image owned by this product.
    /// Interpreted only by the blob collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_json_roundtrip() {
        let p = Product {
            id: "f00d".into(),
            name: "Red Mug".into(),
            price: 12.5,
            barcode: "REDMUG-001".into(),
            image_ref: Some("images/redmug.jpg".into()),
            create_at: None,
            update_at: None,
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn product_wire_names_are_camel_case() {
        let p = Product {
            id: "f00d".into(),
            name: "Red Mug".into(),
            price: 12.5,
            barcode: "REDMUG-001".into(),
            image_ref: Some("images/redmug.jpg".into()),
            create_at: None,
            update_at: None,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"imageRef\""));
        assert!(!json.contains("image_ref"));
    }
}
