//! Group directory operations backed by the Keycloak admin API.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    client::{GroupQuery, Paging},
    context::RequestContext,
    error::{DirectoryError, DirectoryResult},
    models::{Group, MembershipReport, User},
    pagination::{Page, PageCursor, collect_pages},
    provider::GroupManager,
    session::{Connection, DirectorySession},
    translate::{group_from_remote, group_to_remote, user_from_remote},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipChange {
    Add,
    Remove,
}

#[derive(Debug, Clone)]
pub struct KeycloakGroupManager {
    session: Arc<DirectorySession>,
}

impl KeycloakGroupManager {
    pub fn new(session: Arc<DirectorySession>) -> Self {
        Self { session }
    }

    async fn change_membership(
        &self,
        ctx: &RequestContext,
        conn: &Connection,
        change: MembershipChange,
        group_id: &str,
        user_id: &str,
    ) -> DirectoryResult<()> {
        let api = self.session.api();
        let realm = self.session.realm();
        match change {
            MembershipChange::Add => {
                ctx.run(api.add_user_to_group(conn.token(), realm, user_id, group_id))
                    .await
            }
            MembershipChange::Remove => {
                ctx.run(api.remove_user_from_group(conn.token(), realm, user_id, group_id))
                    .await
            }
        }
    }

    fn cursor_or_first(&self, cursor: Option<PageCursor>) -> PageCursor {
        cursor.unwrap_or_else(|| PageCursor::first(self.session.page_size()))
    }

    async fn member_page(
        &self,
        ctx: &RequestContext,
        conn: &Connection,
        group_id: &str,
        cursor: PageCursor,
    ) -> DirectoryResult<Page<User>> {
        let found = ctx
            .run(self.session.api().group_members(
                conn.token(),
                self.session.realm(),
                group_id,
                Paging::new(cursor.offset, cursor.page_size),
            ))
            .await?;
        let users = found
            .iter()
            .map(|u| user_from_remote(u, conn.registry()))
            .collect();
        Ok(Page::new(users, cursor))
    }

    async fn user_group_page(
        &self,
        ctx: &RequestContext,
        conn: &Connection,
        user_id: &str,
        cursor: PageCursor,
    ) -> DirectoryResult<Page<Group>> {
        let found = ctx
            .run(self.session.api().user_groups(
                conn.token(),
                self.session.realm(),
                user_id,
                Paging::new(cursor.offset, cursor.page_size),
            ))
            .await?;
        Ok(Page::new(found.iter().map(group_from_remote).collect(), cursor))
    }

    /// Apply `change` for each user id in order, recording every outcome.
    async fn apply_membership(
        &self,
        ctx: &RequestContext,
        change: MembershipChange,
        group_id: &str,
        user_ids: &[String],
    ) -> DirectoryResult<MembershipReport> {
        let conn = self.session.ensure_connected(ctx).await?;
        let mut report = MembershipReport::new(group_id);
        for user_id in user_ids {
            let outcome = self
                .change_membership(ctx, &conn, change, group_id, user_id)
                .await;
            if let Err(e) = &outcome {
                tracing::warn!(user_id = %user_id, error = %e, ?change, "Membership change failed");
            }
            report.record(user_id.clone(), outcome);
        }
        tracing::info!(
            requested = user_ids.len(),
            failed = report.failed().count(),
            ?change,
            "Group membership updated"
        );
        Ok(report)
    }
}

#[async_trait]
impl GroupManager for KeycloakGroupManager {
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    async fn list_groups(
        &self,
        ctx: &RequestContext,
        filter: Option<&str>,
        _attrs: &[String],
    ) -> DirectoryResult<Vec<Group>> {
        if let Some(filter) = filter {
            tracing::debug!(filter, "Group filter is not applied by this provider");
        }
        let conn = self.session.ensure_connected(ctx).await?;
        let found = ctx
            .run(self.session.api().list_groups(
                conn.token(),
                self.session.realm(),
                &GroupQuery::default(),
            ))
            .await?;
        Ok(found.iter().map(group_from_remote).collect())
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %id))]
    async fn get_group(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<Option<Group>> {
        let conn = self.session.ensure_connected(ctx).await?;
        match ctx
            .run(
                self.session
                    .api()
                    .get_group(conn.token(), self.session.realm(), id),
            )
            .await
        {
            Ok(remote) => Ok(Some(group_from_remote(&remote))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), name = %name))]
    async fn get_group_id(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> DirectoryResult<Option<String>> {
        let conn = self.session.ensure_connected(ctx).await?;
        let found = ctx
            .run(self.session.api().list_groups(
                conn.token(),
                self.session.realm(),
                &GroupQuery::exact_name(name),
            ))
            .await?;
        // Search can also match on sub group names
        Ok(found
            .into_iter()
            .find(|g| g.name.as_deref() == Some(name))
            .and_then(|g| g.id))
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), name = %group.name))]
    async fn create_group(&self, ctx: &RequestContext, group: &mut Group) -> DirectoryResult<Group> {
        let conn = self.session.ensure_connected(ctx).await?;
        let id = ctx
            .run(self.session.api().create_group(
                conn.token(),
                self.session.realm(),
                &group_to_remote(group),
            ))
            .await?;
        if id.is_empty() {
            return Err(DirectoryError::Transport(
                "Group created without an id in the response".into(),
            ));
        }
        group.id = id;
        tracing::info!(group_id = %group.id, "Group created");
        Ok(group.clone())
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %group.id))]
    async fn update_group(&self, ctx: &RequestContext, group: &Group) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        ctx.run(self.session.api().update_group(
            conn.token(),
            self.session.realm(),
            &group.id,
            &group_to_remote(group),
        ))
        .await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %id))]
    async fn delete_group(&self, ctx: &RequestContext, id: &str) -> DirectoryResult<()> {
        let conn = self.session.ensure_connected(ctx).await?;
        ctx.run(
            self.session
                .api()
                .delete_group(conn.token(), self.session.realm(), id),
        )
        .await?;
        tracing::info!("Group deleted");
        Ok(())
    }

    /// Members as Keycloak returns them, usually a brief representation.
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %group_id))]
    async fn get_group_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
    ) -> DirectoryResult<Vec<User>> {
        let conn = self.session.ensure_connected(ctx).await?;
        let conn = &conn;
        collect_pages(|cursor| {
            self.member_page(ctx, conn, group_id, self.cursor_or_first(cursor))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), user_id = %user_id))]
    async fn get_user_groups(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> DirectoryResult<Vec<Group>> {
        let conn = self.session.ensure_connected(ctx).await?;
        let conn = &conn;
        collect_pages(|cursor| {
            self.user_group_page(ctx, conn, user_id, self.cursor_or_first(cursor))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %group_id))]
    async fn add_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_ids: &[String],
    ) -> DirectoryResult<MembershipReport> {
        self.apply_membership(ctx, MembershipChange::Add, group_id, user_ids)
            .await
    }

    #[tracing::instrument(skip_all, fields(realm = %self.session.realm(), group_id = %group_id))]
    async fn remove_members(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        user_ids: &[String],
    ) -> DirectoryResult<MembershipReport> {
        self.apply_membership(ctx, MembershipChange::Remove, group_id, user_ids)
            .await
    }
}
