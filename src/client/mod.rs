//! Remote API boundary.
//!
//! [`AdminApi`] is the seam between the directory layer and the Keycloak
//! admin REST API. [`KeycloakRestClient`] implements it over `reqwest`;
//! tests substitute an in-memory implementation.

mod rest;
mod types;

use async_trait::async_trait;
pub use rest::KeycloakRestClient;
pub use types::*;

use crate::error::DirectoryResult;

/// Admin operations the directory needs from the remote service.
///
/// Every method except [`AdminApi::login`] takes the bearer token obtained
/// from `login`. Non-success responses surface as
/// [`crate::DirectoryError::Remote`] with the HTTP status, so a 404 can be
/// told apart from other failures.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Password-grant login against `realm`.
    async fn login(&self, realm: &str, username: &str, password: &str)
    -> DirectoryResult<TokenResponse>;

    async fn get_user(&self, token: &str, realm: &str, id: &str)
    -> DirectoryResult<UserRepresentation>;

    async fn list_users(
        &self,
        token: &str,
        realm: &str,
        query: &UserQuery,
    ) -> DirectoryResult<Vec<UserRepresentation>>;

    /// Returns the id the remote service assigned.
    async fn create_user(
        &self,
        token: &str,
        realm: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<String>;

    async fn update_user(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<()>;

    async fn delete_user(&self, token: &str, realm: &str, id: &str) -> DirectoryResult<()>;

    async fn reset_password(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        credential: &CredentialRepresentation,
    ) -> DirectoryResult<()>;

    async fn list_groups(
        &self,
        token: &str,
        realm: &str,
        query: &GroupQuery,
    ) -> DirectoryResult<Vec<GroupRepresentation>>;

    async fn get_group(&self, token: &str, realm: &str, id: &str)
    -> DirectoryResult<GroupRepresentation>;

    /// Returns the id the remote service assigned.
    async fn create_group(
        &self,
        token: &str,
        realm: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<String>;

    async fn update_group(
        &self,
        token: &str,
        realm: &str,
        id: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<()>;

    async fn delete_group(&self, token: &str, realm: &str, id: &str) -> DirectoryResult<()>;

    /// One window of a group's members. Keycloak caps an unpaged request,
    /// so callers walk windows until a short one comes back.
    async fn group_members(
        &self,
        token: &str,
        realm: &str,
        group_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<UserRepresentation>>;

    async fn user_groups(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<GroupRepresentation>>;

    async fn add_user_to_group(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()>;

    async fn remove_user_from_group(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()>;

    async fn list_components(
        &self,
        token: &str,
        realm: &str,
    ) -> DirectoryResult<Vec<ComponentRepresentation>>;

    async fn update_component(
        &self,
        token: &str,
        realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<()>;

    /// Returns the id the remote service assigned.
    async fn create_component(
        &self,
        token: &str,
        realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<String>;

    /// Returns the internal id the remote service assigned, not the client id.
    async fn create_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> DirectoryResult<String>;

    async fn get_realm(&self, token: &str, realm: &str) -> DirectoryResult<RealmRepresentation>;

    async fn trigger_user_storage_sync(
        &self,
        token: &str,
        realm: &str,
        component_id: &str,
        action: SyncAction,
    ) -> DirectoryResult<()>;
}
