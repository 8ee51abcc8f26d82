use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    AdminApi, ClientRepresentation, ComponentRepresentation, CredentialRepresentation,
    GroupQuery, GroupRepresentation, Paging, RealmRepresentation, SyncAction, TokenResponse,
    UserQuery, UserRepresentation,
};
use crate::{
    config::KeycloakConfig,
    error::{DirectoryError, DirectoryResult},
};

/// [`AdminApi`] over the Keycloak admin REST API.
///
/// The inner `reqwest::Client` is reference counted and safe to use from
/// concurrent tasks, so one instance serves every manager of an adapter.
#[derive(Debug, Clone)]
pub struct KeycloakRestClient {
    http: reqwest::Client,
    base: Url,
    client_id: String,
}

impl KeycloakRestClient {
    pub fn new(
        endpoint: &str,
        client_id: impl Into<String>,
        timeout: Duration,
    ) -> DirectoryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Config(format!("Failed to build HTTP client: {e}")))?;
        Self::with_http_client(endpoint, client_id, http)
    }

    pub fn from_config(config: &KeycloakConfig) -> DirectoryResult<Self> {
        Self::new(
            &config.endpoint,
            config.client_id.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_http_client(
        endpoint: &str,
        client_id: impl Into<String>,
        http: reqwest::Client,
    ) -> DirectoryResult<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| DirectoryError::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(DirectoryError::Config(format!(
                "Endpoint '{endpoint}' cannot be used as a base URL"
            )));
        }
        Ok(Self {
            http,
            base,
            client_id: client_id.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Config("Endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn admin_url(&self, realm: &str, segments: &[&str]) -> DirectoryResult<Url> {
        let mut all = vec!["admin", "realms", realm];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        tracing::debug!(method = %method, path = %url.path(), "Keycloak admin request");
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> DirectoryResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(DirectoryError::Remote {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, token: &str) -> DirectoryResult<T> {
        let response = self.send(self.request(Method::GET, url, token)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> DirectoryResult<()> {
        self.send(request).await.map(|_| ())
    }

    /// POST a representation and return the id from the `Location` header.
    async fn create(
        &self,
        url: Url,
        token: &str,
        body: &impl serde::Serialize,
    ) -> DirectoryResult<String> {
        let response = self
            .send(self.request(Method::POST, url, token).json(body))
            .await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(id_from_location)
            .ok_or_else(|| DirectoryError::Remote {
                status: response.status().as_u16(),
                message: "Created resource has no Location header".to_string(),
            })
    }
}

/// Last path segment of a `Location` header.
fn id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Pull a readable message out of a Keycloak error body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["errorMessage", "error_description", "error"] {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

#[async_trait]
impl AdminApi for KeycloakRestClient {
    #[tracing::instrument(skip_all, fields(realm = %realm, username = %username))]
    async fn login(
        &self,
        realm: &str,
        username: &str,
        password: &str,
    ) -> DirectoryResult<TokenResponse> {
        let url = self.url(&["realms", realm, "protocol", "openid-connect", "token"])?;
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", username),
            ("password", password),
        ];

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| DirectoryError::Authentication(format!("Endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Authentication(format!(
                "Admin login rejected ({}): {}",
                status.as_u16(),
                error_message(status, &body)
            )));
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            DirectoryError::Authentication(format!("Unreadable token response: {e}"))
        })
    }

    async fn get_user(
        &self,
        token: &str,
        realm: &str,
        id: &str,
    ) -> DirectoryResult<UserRepresentation> {
        self.get_json(self.admin_url(realm, &["users", id])?, token)
            .await
    }

    async fn list_users(
        &self,
        token: &str,
        realm: &str,
        query: &UserQuery,
    ) -> DirectoryResult<Vec<UserRepresentation>> {
        let mut url = self.admin_url(realm, &["users"])?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.get_json(url, token).await
    }

    async fn create_user(
        &self,
        token: &str,
        realm: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<String> {
        self.create(self.admin_url(realm, &["users"])?, token, user)
            .await
    }

    async fn update_user(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["users", id])?;
        self.send_empty(self.request(Method::PUT, url, token).json(user))
            .await
    }

    async fn delete_user(&self, token: &str, realm: &str, id: &str) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["users", id])?;
        self.send_empty(self.request(Method::DELETE, url, token))
            .await
    }

    async fn reset_password(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        credential: &CredentialRepresentation,
    ) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["users", id, "reset-password"])?;
        self.send_empty(self.request(Method::PUT, url, token).json(credential))
            .await
    }

    async fn list_groups(
        &self,
        token: &str,
        realm: &str,
        query: &GroupQuery,
    ) -> DirectoryResult<Vec<GroupRepresentation>> {
        let mut url = self.admin_url(realm, &["groups"])?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.get_json(url, token).await
    }

    async fn get_group(
        &self,
        token: &str,
        realm: &str,
        id: &str,
    ) -> DirectoryResult<GroupRepresentation> {
        self.get_json(self.admin_url(realm, &["groups", id])?, token)
            .await
    }

    async fn create_group(
        &self,
        token: &str,
        realm: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<String> {
        self.create(self.admin_url(realm, &["groups"])?, token, group)
            .await
    }

    async fn update_group(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["groups", id])?;
        self.send_empty(self.request(Method::PUT, url, token).json(group))
            .await
    }

    async fn delete_group(&self, token: &str, realm: &str, id: &str) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["groups", id])?;
        self.send_empty(self.request(Method::DELETE, url, token))
            .await
    }

    async fn group_members(
        &self,
        token: &str,
        realm: &str,
        group_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<UserRepresentation>> {
        let mut url = self.admin_url(realm, &["groups", group_id, "members"])?;
        url.query_pairs_mut().extend_pairs(paging.to_pairs());
        self.get_json(url, token).await
    }

    async fn user_groups(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<GroupRepresentation>> {
        let mut url = self.admin_url(realm, &["users", user_id, "groups"])?;
        url.query_pairs_mut().extend_pairs(paging.to_pairs());
        self.get_json(url, token).await
    }

    async fn add_user_to_group(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["users", user_id, "groups", group_id])?;
        self.send_empty(self.request(Method::PUT, url, token))
            .await
    }

    async fn remove_user_from_group(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()> {
        let url = self.admin_url(realm, &["users", user_id, "groups", group_id])?;
        self.send_empty(self.request(Method::DELETE, url, token))
            .await
    }

    async fn list_components(
        &self,
        token: &str,
        realm: &str,
    ) -> DirectoryResult<Vec<ComponentRepresentation>> {
        self.get_json(self.admin_url(realm, &["components"])?, token)
            .await
    }

    async fn update_component(
        &self,
        token: &str,
        realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<()> {
        let id = component.id.as_deref().ok_or_else(|| {
            DirectoryError::MalformedConfig("Component has no id".to_string())
        })?;
        let url = self.admin_url(realm, &["components", id])?;
        self.send_empty(self.request(Method::PUT, url, token).json(component))
            .await
    }

    async fn create_component(
        &self,
        token: &str,
        realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<String> {
        self.create(self.admin_url(realm, &["components"])?, token, component)
            .await
    }

    async fn create_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> DirectoryResult<String> {
        self.create(self.admin_url(realm, &["clients"])?, token, client)
            .await
    }

    async fn get_realm(&self, token: &str, realm: &str) -> DirectoryResult<RealmRepresentation> {
        self.get_json(self.admin_url(realm, &[])?, token).await
    }

    async fn trigger_user_storage_sync(
        &self,
        token: &str,
        realm: &str,
        component_id: &str,
        action: SyncAction,
    ) -> DirectoryResult<()> {
        let mut url = self.admin_url(realm, &["user-storage", component_id, "sync"])?;
        url.query_pairs_mut().append_pair("action", action.as_str());
        self.send_empty(self.request(Method::POST, url, token))
            .await
    }
}
