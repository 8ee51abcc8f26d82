//! Provider-neutral directory traits and the Keycloak adapter that
//! implements them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::KeycloakConfig,
    context::RequestContext,
    error::DirectoryResult,
    groups::KeycloakGroupManager,
    models::{Group, MembershipReport, User},
    realm::KeycloakRealmAdmin,
    session::DirectorySession,
    users::KeycloakUserManager,
};

/// Name under which this adapter registers with a provider registry.
pub const KEYCLOAK: &str = "keycloak";

/// User management against an identity directory.
#[async_trait]
pub trait UserManager: Send + Sync {
    /// Every user. `filter` and `attrs` are accepted for interface
    /// compatibility and currently ignored.
    async fn list_users(
        &self,
        ctx: &RequestContext,
        filter: Option<&str>,
        attrs: &[String],
    ) -> DirectoryResult<Vec<User>>;

    /// Returns `None` when no user has `id`.
    async fn get_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<Option<User>>;

    async fn get_user_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> DirectoryResult<Option<User>>;

    /// Create `user` and write the assigned id back into it.
    async fn create_user(&self, ctx: &RequestContext, user: &mut User) -> DirectoryResult<User>;

    async fn update_user(&self, ctx: &RequestContext, user: &User) -> DirectoryResult<()>;

    async fn enable_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()>;

    async fn disable_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()>;

    async fn delete_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()>;

    /// Returns the proposed name and whether a user already holds it.
    async fn force_user_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> DirectoryResult<(String, bool)>;
}

/// Group management against an identity directory.
#[async_trait]
pub trait GroupManager: Send + Sync {
    async fn list_groups(
        &self,
        ctx: &RequestContext,
        filter: Option<&str>,
        attrs: &[String],
    ) -> DirectoryResult<Vec<Group>>;

    /// Returns `None` when no group has `id`.
    async fn get_group(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<Option<Group>>;

    /// Id of the group named exactly `name`.
    async fn get_group_id(&self, ctx: &RequestContext, name: &str)
    -> DirectoryResult<Option<String>>;

    async fn create_group(&self, ctx: &RequestContext, group: &mut Group) -> DirectoryResult<Group>;

    async fn update_group(&self, ctx: &RequestContext, group: &Group) -> DirectoryResult<()>;

    async fn delete_group(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()>;

    async fn get_group_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> DirectoryResult<Vec<User>>;

    async fn get_user_groups(&self, ctx: &RequestContext, user_id: &str)
    -> DirectoryResult<Vec<Group>>;

    /// One call per user id, in order. Not atomic.
    async fn add_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_ids: &[String],
    ) -> DirectoryResult<MembershipReport>;

    /// One call per user id, in order. Not atomic.
    async fn remove_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_ids: &[String],
    ) -> DirectoryResult<MembershipReport>;
}

/// A Keycloak adapter instance: one admin session shared by its user and
/// group managers.
#[derive(Debug, Clone)]
pub struct KeycloakDirectory {
    session: Arc<DirectorySession>,
    users: KeycloakUserManager,
    groups: KeycloakGroupManager,
    realm: KeycloakRealmAdmin,
}

impl KeycloakDirectory {
    pub fn new(config: &KeycloakConfig) -> DirectoryResult<Self> {
        Ok(Self::with_session(Arc::new(DirectorySession::from_config(
            config,
        )?)))
    }

    pub fn with_session(session: Arc<DirectorySession>) -> Self {
        Self {
            users: KeycloakUserManager::new(session.clone()),
            groups: KeycloakGroupManager::new(session.clone()),
            realm: KeycloakRealmAdmin::new(session.clone()),
            session,
        }
    }

    pub fn name(&self) -> &'static str {
        KEYCLOAK
    }

    pub fn session(&self) -> &Arc<DirectorySession> {
        &self.session
    }

    pub fn users(&self) -> &KeycloakUserManager {
        &self.users
    }

    pub fn groups(&self) -> &KeycloakGroupManager {
        &self.groups
    }

    pub fn realm(&self) -> &KeycloakRealmAdmin {
        &self.realm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAdminApi, base_profile, test_config};

    #[tokio::test]
    async fn test_managers_share_one_session() {
        let api = Arc::new(FakeAdminApi::new().with_profile(&base_profile()));
        let directory =
            KeycloakDirectory::with_session(Arc::new(DirectorySession::new(api.clone(), &test_config())));
        let ctx = RequestContext::new();

        let users: &dyn UserManager = directory.users();
        let groups: &dyn GroupManager = directory.groups();
        users.list_users(&ctx, None, &[]).await.unwrap();
        groups.list_groups(&ctx, None, &[]).await.unwrap();

        assert_eq!(api.logins(), 1);
        assert_eq!(directory.name(), "keycloak");
    }

    #[test]
    fn test_new_rejects_invalid_endpoint() {
        let config = KeycloakConfig::new("not a url", "admin", "admin");
        assert!(KeycloakDirectory::new(&config).is_err());
    }
}
