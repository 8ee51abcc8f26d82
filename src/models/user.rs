use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A directory user, independent of the remote wire format.
///
/// `id` is empty until the remote service has created the user and is
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enabled: bool,
    pub display_name: String,
    /// Named string attributes. Only names known to the attribute registry
    /// survive translation to the remote service.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Whether the remote service has assigned an id.
    pub fn is_created(&self) -> bool {
        !self.id.is_empty()
    }
}
