//! Realm setup helpers: OIDC client registration and Active Directory
//! user federation.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    client::{ClientRepresentation, ComponentRepresentation},
    context::RequestContext,
    error::{DirectoryError, DirectoryResult},
    session::DirectorySession,
};

/// Provider id and type of an LDAP user-storage component.
pub const LDAP_PROVIDER_ID: &str = "ldap";
pub const USER_STORAGE_PROVIDER_TYPE: &str = "org.keycloak.storage.UserStorageProvider";

/// Client attribute holding `##`-separated post-logout redirect URIs.
const POST_LOGOUT_REDIRECT_URIS: &str = "post.logout.redirect.uris";

/// A public browser client using the authorization code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcWebClient {
    /// Used as both client id and display name.
    pub name: String,
    /// Root, base and admin URL of the application.
    pub url: String,
    pub redirect_url: String,
    pub post_logout_redirect_urls: Vec<String>,
}

impl OidcWebClient {
    pub fn to_remote(&self) -> ClientRepresentation {
        let mut attributes = BTreeMap::new();
        if !self.post_logout_redirect_urls.is_empty() {
            attributes.insert(
                POST_LOGOUT_REDIRECT_URIS.to_string(),
                self.post_logout_redirect_urls.join("##"),
            );
        }
        ClientRepresentation {
            id: None,
            client_id: Some(self.name.clone()),
            name: Some(self.name.clone()),
            root_url: Some(self.url.clone()),
            base_url: Some(self.url.clone()),
            admin_url: Some(self.url.clone()),
            redirect_uris: Some(vec![self.url.clone(), self.redirect_url.clone()]),
            web_origins: Some(vec!["*".to_string()]),
            public_client: Some(true),
            frontchannel_logout: Some(true),
            attributes: Some(attributes),
        }
    }
}

/// Read-only import of users from an Active Directory domain over LDAPS.
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveDirectoryFederation {
    pub host: String,
    pub port: Option<u16>,
    /// Domain base, e.g. `DC=corp,DC=example,DC=com`. Users are read from
    /// `CN=Users` under it.
    pub base_dn: String,
    /// Account name of the bind user inside `CN=Users`.
    pub bind_user: String,
    pub bind_password: String,
}

impl std::fmt::Debug for ActiveDirectoryFederation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveDirectoryFederation")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_dn", &self.base_dn)
            .field("bind_user", &self.bind_user)
            .field("bind_password", &"****")
            .finish()
    }
}

impl ActiveDirectoryFederation {
    pub fn connection_url(&self) -> String {
        match self.port {
            Some(port) => format!("ldaps://{}:{port}", self.host),
            None => format!("ldaps://{}", self.host),
        }
    }

    pub fn users_dn(&self) -> String {
        format!("CN=Users,{}", self.base_dn)
    }

    pub fn bind_dn(&self) -> String {
        format!("CN={},{}", self.bind_user, self.users_dn())
    }

    /// Component registering the federation under the realm `parent_id`.
    pub fn to_component(&self, parent_id: &str) -> ComponentRepresentation {
        let settings = [
            ("enabled", "true".to_string()),
            ("vendor", "ad".to_string()),
            ("connectionUrl", self.connection_url()),
            ("startTls", "false".to_string()),
            ("useTruststoreSpi", "always".to_string()),
            ("connectionPooling", "false".to_string()),
            ("authType", "simple".to_string()),
            ("bindDn", self.bind_dn()),
            ("bindCredential", self.bind_password.clone()),
            ("usersDn", self.users_dn()),
            ("usernameLDAPAttribute", "sAMAccountName".to_string()),
            ("rdnLDAPAttribute", "sAMAccountName".to_string()),
            ("uuidLDAPAttribute", "objectGUID".to_string()),
            ("krbPrincipalAttribute", "userPrincipalName".to_string()),
            (
                "userObjectClasses",
                "person, organizationalPerson, user".to_string(),
            ),
            ("editMode", "READ_ONLY".to_string()),
            ("importEnabled", "true".to_string()),
            ("syncRegistrations", "true".to_string()),
            ("pagination", "false".to_string()),
            ("fullSyncPeriod", "-1".to_string()),
            ("changedSyncPeriod", "-1".to_string()),
            ("cachePolicy", "DEFAULT".to_string()),
            ("trustEmail", "false".to_string()),
            ("validatePasswordPolicy", "false".to_string()),
            ("usePasswordModifyExtendedOp", "false".to_string()),
            ("allowKerberosAuthentication", "false".to_string()),
            ("useKerberosForPasswordAuthentication", "false".to_string()),
        ];
        ComponentRepresentation {
            name: Some(LDAP_PROVIDER_ID.to_string()),
            provider_id: Some(LDAP_PROVIDER_ID.to_string()),
            provider_type: Some(USER_STORAGE_PROVIDER_TYPE.to_string()),
            parent_id: Some(parent_id.to_string()),
            config: Some(
                settings
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), vec![value]))
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

/// Realm-level setup over the directory's admin session.
#[derive(Debug, Clone)]
pub struct KeycloakRealmAdmin {
    session: Arc<DirectorySession>,
}

impl KeycloakRealmAdmin {
    pub fn new(session: Arc<DirectorySession>) -> Self {
        Self { session }
    }

    /// Register `client` and return the internal id Keycloak assigned.
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), client = %client.name))]
    pub async fn create_oidc_web_client(
        &self,
        ctx: &RequestContext,
        client: &OidcWebClient,
    ) -> DirectoryResult<String> {
        let conn = self.session.ensure_connected(ctx).await?;
        let id = ctx
            .run(self.session.api().create_client(
                conn.token(),
                self.session.realm(),
                &client.to_remote(),
            ))
            .await?;
        tracing::info!(id = %id, "OIDC client created");
        Ok(id)
    }

    /// Add an Active Directory user federation to the realm and return the
    /// component id, usable with
    /// [`crate::KeycloakUserManager::trigger_user_storage_sync`].
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), host = %federation.host))]
    pub async fn add_ad_ldap_federation(
        &self,
        ctx: &RequestContext,
        federation: &ActiveDirectoryFederation,
    ) -> DirectoryResult<String> {
        let conn = self.session.ensure_connected(ctx).await?;
        let realm = ctx
            .run(
                self.session
                    .api()
                    .get_realm(conn.token(), self.session.realm()),
            )
            .await?;
        let parent_id = realm
            .id
            .ok_or_else(|| DirectoryError::Transport("Realm representation has no id".into()))?;

        let id = ctx
            .run(self.session.api().create_component(
                conn.token(),
                self.session.realm(),
                &federation.to_component(&parent_id),
            ))
            .await?;
        tracing::info!(id = %id, bind_dn = %federation.bind_dn(), "LDAP federation created");
        Ok(id)
    }
}
