use serde::{Deserialize, Serialize};

/// Source tag attached to every group read from Keycloak.
pub const GROUP_SOURCE: &str = "Keycloak";

/// Type tag attached to every group read from Keycloak.
pub const GROUP_TYPE: &str = "security";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Empty until created remotely.
    pub id: String,
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub group_type: String,
    /// Raw remote representation, kept for callers that need
    /// provider-specific fields (path, sub groups, attributes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
