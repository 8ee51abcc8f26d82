//! Keycloak admin REST wire representations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of the `openid-connect/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, Vec<String>>>,
}

impl UserRepresentation {
    /// First value of a named attribute, if any.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .as_ref()?
            .get(name)?
            .first()
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Sub groups, attributes, access map and anything newer releases add.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, Vec<String>>>,
}

/// OIDC client registration for `POST /clients`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_origins: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontchannel_logout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

/// The parts of `GET /admin/realms/{realm}` the adapter reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RealmRepresentation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialRepresentation {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub value: String,
    pub temporary: bool,
}

impl CredentialRepresentation {
    pub fn password(value: impl Into<String>, temporary: bool) -> Self {
        Self {
            credential_type: "password".to_string(),
            value: value.into(),
            temporary,
        }
    }
}

/// Query parameters for `GET /users`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub first: Option<usize>,
    pub max: Option<usize>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub exact: Option<bool>,
}

impl UserQuery {
    pub fn page(first: usize, max: usize) -> Self {
        Self {
            first: Some(first),
            max: Some(max),
            ..Default::default()
        }
    }

    pub fn exact_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            exact: Some(true),
            ..Default::default()
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(first) = self.first {
            pairs.push(("first", first.to_string()));
        }
        if let Some(max) = self.max {
            pairs.push(("max", max.to_string()));
        }
        if let Some(username) = &self.username {
            pairs.push(("username", username.clone()));
        }
        if let Some(email) = &self.email {
            pairs.push(("email", email.clone()));
        }
        if let Some(exact) = self.exact {
            pairs.push(("exact", exact.to_string()));
        }
        pairs
    }
}

/// `first`/`max` window for the member and membership listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub first: usize,
    pub max: usize,
}

impl Paging {
    pub fn new(first: usize, max: usize) -> Self {
        Self { first, max }
    }

    pub(crate) fn to_pairs(self) -> [(&'static str, String); 2] {
        [("first", self.first.to_string()), ("max", self.max.to_string())]
    }
}

/// Query parameters for `GET /groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupQuery {
    pub search: Option<String>,
    pub exact: Option<bool>,
}

impl GroupQuery {
    pub fn exact_name(name: impl Into<String>) -> Self {
        Self {
            search: Some(name.into()),
            exact: Some(true),
        }
    }

    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(exact) = self.exact {
            pairs.push(("exact", exact.to_string()));
        }
        pairs
    }
}

/// Action for a user-storage (LDAP federation) sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Full,
    ChangedUsers,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Full => "triggerFullSync",
            SyncAction::ChangedUsers => "triggerChangedUsersSync",
        }
    }
}
