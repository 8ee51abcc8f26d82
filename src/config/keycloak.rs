use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConfigError;

pub const DEFAULT_REALM: &str = "master";
pub const DEFAULT_CLIENT_ID: &str = "admin-cli";
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Connection and behaviour settings for the Keycloak-backed directory.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server (e.g., "https://sso.example.com/").
    pub endpoint: String,

    /// Admin account used for the password-grant login.
    pub admin_username: String,

    pub admin_password: String,

    /// Realm that is both logged into and administered.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// OAuth client used for the admin login.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Users fetched per page when enumerating.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Re-authenticate this many seconds before the token expires.
    #[serde(default = "default_token_refresh_skew_secs")]
    pub token_refresh_skew_secs: u64,

    /// Merge the required attributes into the realm's user profile on
    /// every session establishment.
    #[serde(default = "default_true")]
    pub sync_profile: bool,

    /// Attribute names required in addition to the organization set.
    #[serde(default)]
    pub extra_attributes: Vec<String>,
}

impl KeycloakConfig {
    pub fn new(
        endpoint: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            realm: default_realm(),
            client_id: default_client_id(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            token_refresh_skew_secs: default_token_refresh_skew_secs(),
            sync_profile: true,
            extra_attributes: Vec::new(),
        }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        let realm = realm.into();
        self.realm = if realm.is_empty() {
            default_realm()
        } else {
            realm
        };
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_profile_sync(mut self, enabled: bool) -> Self {
        self.sync_profile = enabled;
        self
    }

    pub fn with_extra_attributes(mut self, names: Vec<String>) -> Self {
        self.extra_attributes = names;
        self
    }

    /// Read `KEYCLOAK_HOST`, `KEYCLOAK_USER`, `KEYCLOAK_PWD` (required) and
    /// `KEYCLOAK_REALM` (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| ConfigError::EnvVarNotFound(name.to_string()))
        };

        let config = Self::new(
            required("KEYCLOAK_HOST")?,
            required("KEYCLOAK_USER")?,
            required("KEYCLOAK_PWD")?,
        )
        .with_realm(std::env::var("KEYCLOAK_REALM").unwrap_or_default());

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::Validation(format!(
                "keycloak.endpoint '{}' is not a valid URL: {e}",
                self.endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "keycloak.endpoint must use http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        if self.admin_username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "keycloak.admin_username must not be empty".into(),
            ));
        }
        if self.realm.trim().is_empty() {
            return Err(ConfigError::Validation(
                "keycloak.realm must not be empty".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "keycloak.page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("endpoint", &self.endpoint)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"****")
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("page_size", &self.page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_refresh_skew_secs", &self.token_refresh_skew_secs)
            .field("sync_profile", &self.sync_profile)
            .field("extra_attributes", &self.extra_attributes)
            .finish()
    }
}

fn default_realm() -> String {
    DEFAULT_REALM.to_string()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_refresh_skew_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
