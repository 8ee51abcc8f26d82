//! Declarative user-profile model.
//!
//! Mirrors the JSON Keycloak stores under `kc.user.profile.config`. Only the
//! fields the adapter reads are typed; everything else is carried through
//! the flattened `extra` maps so a read-modify-write never drops data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PERMISSION_ADMIN: &str = "admin";
pub const PERMISSION_USER: &str = "user";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfileConfig {
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<AttributeGroup>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfileConfig {
    pub fn find_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_header: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_description: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Validations>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multivalued: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttributeDefinition {
    /// A single-valued string attribute editable and viewable by admins and
    /// the user, with length bounds.
    pub fn string(
        name: impl Into<String>,
        display_name: impl Into<String>,
        min_len: u64,
        max_len: u64,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: Some(display_name.into()),
            validations: Some(Validations {
                length: Some(LengthValidation {
                    min: Some(Bound::Number(min_len)),
                    max: Some(Bound::Number(max_len)),
                    extra: Map::new(),
                }),
                extra: Map::new(),
            }),
            permissions: Some(Permissions::admin_and_user()),
            multivalued: Some(false),
            extra: Map::new(),
        }
    }

    /// Organization attribute: display name equals the name, length 1..=255.
    pub fn organization(name: &str) -> Self {
        Self::string(name, name, 1, 255)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthValidation>,

    /// Other validators (`email`, `pattern`, `person-name-prohibited-characters`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Bound>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Bound>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validator bound. Keycloak accepts both `255` and `"255"`; whichever form
/// was read is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Number(u64),
    Text(String),
}

impl Bound {
    pub fn value(&self) -> Option<u64> {
        match self {
            Bound::Number(n) => Some(*n),
            Bound::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Permissions {
    pub fn admin_and_user() -> Self {
        let both = vec![PERMISSION_ADMIN.to_string(), PERMISSION_USER.to_string()];
        Self {
            view: Some(both.clone()),
            edit: Some(both),
            extra: Map::new(),
        }
    }
}

/// Built-in fields every Keycloak realm declares.
pub const BUILT_IN_ATTRIBUTES: [&str; 4] = ["username", "email", "firstName", "lastName"];

/// Attribute that carries the user's display name.
pub const DISPLAY_NAME_ATTRIBUTE: &str = "DisplayName";

/// Organization attributes the adapter requires in every realm.
pub const ORGANIZATION_ATTRIBUTES: [&str; 13] = [
    "AccountType",
    "Citizenship",
    "Company",
    "ContractDate",
    "ContractNumber",
    "Department",
    DISPLAY_NAME_ATTRIBUTE,
    "MobilePhone",
    "OfficePhone",
    "Organization",
    "JobTitle",
    "ProgramRole",
    "Project",
];

/// Definitions for the built-in fields, as Keycloak ships them.
pub fn default_attributes() -> Vec<AttributeDefinition> {
    BUILT_IN_ATTRIBUTES
        .iter()
        .map(|name| AttributeDefinition::string(*name, format!("${{{name}}}"), 3, 255))
        .collect()
}

/// Definitions for the organization attribute set.
pub fn organization_attributes() -> Vec<AttributeDefinition> {
    ORGANIZATION_ATTRIBUTES
        .iter()
        .map(|name| AttributeDefinition::organization(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_unknown_fields() {
        let raw = r#"{"attributes":[{"name":"email","displayName":"${email}","validations":{"email":{},"length":{"max":255}},"required":{"roles":["user"]},"permissions":{"view":["admin","user"],"edit":["admin","user"]},"multivalued":false}],"groups":[{"name":"user-metadata","displayHeader":"User metadata","displayDescription":"Attributes, which refer to user metadata"}],"unmanagedAttributePolicy":"ENABLED"}"#;

        let config: UserProfileConfig = serde_json::from_str(raw).unwrap();
        let email = config.find_attribute("email").unwrap();

        assert!(email.extra.contains_key("required"));
        assert!(email.validations.as_ref().unwrap().extra.contains_key("email"));
        assert_eq!(
            config.extra.get("unmanagedAttributePolicy"),
            Some(&Value::String("ENABLED".into()))
        );

        let reparsed: UserProfileConfig =
            serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_absent_and_empty_lists_round_trip() {
        let raw = r#"{"attributes":[{"name":"x","permissions":{"view":["admin"]}}],"groups":[]}"#;

        let config: UserProfileConfig = serde_json::from_str(raw).unwrap();
        let permissions = config.attributes[0].permissions.as_ref().unwrap();

        assert_eq!(permissions.edit, None);
        assert_eq!(config.groups, Some(Vec::new()));
        assert_eq!(serde_json::to_string(&config).unwrap(), raw);
    }

    #[test]
    fn test_bound_keeps_representation() {
        let length: LengthValidation = serde_json::from_str(r#"{"min":"1","max":255}"#).unwrap();

        assert_eq!(length.min, Some(Bound::Text("1".into())));
        assert_eq!(length.min.as_ref().and_then(Bound::value), Some(1));
        assert_eq!(
            serde_json::to_string(&length).unwrap(),
            r#"{"min":"1","max":255}"#
        );
    }

    #[test]
    fn test_organization_attribute_shape() {
        let attr = AttributeDefinition::organization("Department");
        let json = serde_json::to_value(&attr).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "Department",
                "displayName": "Department",
                "validations": {"length": {"min": 1, "max": 255}},
                "permissions": {"view": ["admin", "user"], "edit": ["admin", "user"]},
                "multivalued": false
            })
        );
    }

    #[test]
    fn test_default_attribute_display_names() {
        let names: Vec<_> = default_attributes()
            .into_iter()
            .map(|a| a.display_name.unwrap())
            .collect();

        assert_eq!(
            names,
            vec!["${username}", "${email}", "${firstName}", "${lastName}"]
        );
    }
}
