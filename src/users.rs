//! User directory operations backed by the Keycloak admin API.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    client::{CredentialRepresentation, SyncAction, UserQuery},
    context::RequestContext,
    error::{DirectoryError, DirectoryResult},
    models::User,
    pagination::{Page, PageCursor, UserEnumerator},
    provider::UserManager,
    session::DirectorySession,
    translate::{enabled_only, user_from_remote, user_to_remote},
};

#[derive(Debug, Clone)]
pub struct KeycloakUserManager {
    session: Arc<DirectorySession>,
    enumerator: UserEnumerator,
}

impl KeycloakUserManager {
    pub fn new(session: Arc<DirectorySession>) -> Self {
        Self {
            enumerator: UserEnumerator::new(session.clone()),
            session,
        }
    }

    /// One page of users; pass the returned cursor back to continue.
    pub async fn list_user_page(
        &self,
        ctx: &RequestContext,
        cursor: Option<PageCursor>,
    ) -> DirectoryResult<Page<User>> {
        self.enumerator.fetch_page(ctx, cursor).await
    }

    /// Same as [`UserManager::get_user`]; every registry attribute is
    /// always returned.
    pub async fn get_user_with_attributes(
        &self,
        ctx: &RequestContext,
        id: &str,
        _attrs: &[String],
    ) -> DirectoryResult<Option<User>> {
        self.get_user(ctx, id).await
    }

    /// Whether a user holds exactly `name`.
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), username = %name))]
    pub async fn user_name_exists(&self, ctx: &RequestContext, name: &str) -> DirectoryResult<bool> {
        let conn = self.session.ensure_connected(ctx).await?;
        let found = ctx
            .run(self.session.api().list_users(
                conn.token(),
                self.session.realm(),
                &UserQuery::exact_username(name),
            ))
            .await?;
        Ok(!found.is_empty())
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), user_id = %id))]
    pub async fn set_user_password(
        &self,
        ctx: &RequestContext,
        id: &str,
        password: &str,
        temporary: bool,
    ) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        let credential = CredentialRepresentation::password(password, temporary);
        ctx.run(
            self.session
                .api()
                .reset_password(conn.token(), self.session.realm(), id, &credential),
        )
        .await?;
        tracing::info!(temporary, "User password set");
        Ok(())
    }

    /// Ask a user-storage provider (LDAP federation) to sync now.
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), component_id = %component_id))]
    pub async fn trigger_user_storage_sync(
        &self,
        ctx: &RequestContext,
        component_id: &str,
        full: bool,
    ) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        let action = if full {
            SyncAction::Full
        } else {
            SyncAction::ChangedUsers
        };
        ctx.run(self.session.api().trigger_user_storage_sync(
            conn.token(),
            self.session.realm(),
            component_id,
            action,
        ))
        .await?;
        tracing::info!(action = action.as_str(), "User storage sync triggered");
        Ok(())
    }

    async fn set_enabled(&self, ctx: &RequestContext, id: &str, enabled: bool) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        ctx.run(self.session.api().update_user(
            conn.token(),
            self.session.realm(),
            id,
            &enabled_only(id, enabled),
        ))
        .await?;
        tracing::info!(user_id = %id, enabled, "User enabled flag updated");
        Ok(())
    }
}

#[async_trait]
impl UserManager for KeycloakUserManager {
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    async fn list_users(
        &self,
        ctx: &RequestContext,
        filter: Option<&str>,
        _attrs: &[String],
    ) -> DirectoryResult<Vec<User>> {
        if let Some(filter) = filter {
            tracing::debug!(filter, "User filter is not applied by this provider");
        }
        let users = self.enumerator.list_all(ctx).await?;
        tracing::debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), user_id = %id))]
    async fn get_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<Option<User>> {
        let conn = self.session.ensure_connected(ctx).await?;
        match ctx
            .run(
                self.session
                    .api()
                    .get_user(conn.token(), self.session.realm(), id),
            )
            .await
        {
            Ok(remote) => Ok(Some(user_from_remote(&remote, conn.registry()))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    async fn get_user_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> DirectoryResult<Option<User>> {
        let conn = self.session.ensure_connected(ctx).await?;
        let found = ctx
            .run(self.session.api().list_users(
                conn.token(),
                self.session.realm(),
                &UserQuery::email(email),
            ))
            .await?;
        Ok(found
            .first()
            .map(|remote| user_from_remote(remote, conn.registry())))
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), username = %user.username))]
    async fn create_user(&self, ctx: &RequestContext, user: &mut User) -> DirectoryResult<User> {
        let conn = self.session.ensure_connected(ctx).await?;
        let remote = user_to_remote(user, conn.registry());
        let id = ctx
            .run(
                self.session
                    .api()
                    .create_user(conn.token(), self.session.realm(), &remote),
            )
            .await?;
        if id.is_empty() {
            return Err(DirectoryError::Transport(
                "User created without an id in the response".into(),
            ));
        }
        user.id = id;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user.clone())
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), user_id = %user.id))]
    async fn update_user(&self, ctx: &RequestContext, user: &User) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        let remote = user_to_remote(user, conn.registry());
        ctx.run(
            self.session
                .api()
                .update_user(conn.token(), self.session.realm(), &user.id, &remote),
        )
        .await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    async fn enable_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()> {
        self.set_enabled(ctx, id, true).await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    async fn disable_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()> {
        self.set_enabled(ctx, id, false).await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), user_id = %id))]
    async fn delete_user(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        ctx.run(
            self.session
                .api()
                .delete_user(conn.token(), self.session.realm(), id),
        )
        .await?;
        tracing::info!("User deleted");
        Ok(())
    }

    /// Names are not transformed: the returned name is always `name`.
    async fn force_user_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> DirectoryResult<(String, bool)> {
        let exists = self.user_name_exists(ctx, name).await?;
        Ok((name.to_string(), exists))
    }
}
