use serde::{Deserialize, Serialize};

/// Group — a named collection of products ("project" in the client UI).
///
/// `count` is derived state: it always equals the number of membership rows
/// referencing this group. The membership ledger is its only writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,

    pub name: String,

    /// Number of products currently in this group.
    #[serde(default)]
    pub count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_json_roundtrip() {
        let g = Group {
            id: "abc123".into(),
            name: "Kitchen".into(),
            count: 2,
            create_at: Some("2025-06-01T00:00:00+00:00".into()),
            update_at: None,
        };
        let json = serde_json::to_string(&g).unwrap();
        let back: Group = serde_json::from_str(&json).unwrap();
        assert_eq!(g, back);
    }

    #[test]
    fn group_count_defaults_to_zero() {
        let g: Group = serde_json::from_str(r#"{"id":"a","name":"Kitchen"}"#).unwrap();
        assert_eq!(g.count, 0);
    }
}
