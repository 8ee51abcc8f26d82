//! Offset-cursor enumeration of remote users.

use std::{future::Future, sync::Arc};

use crate::{
    client::UserQuery,
    context::RequestContext,
    error::DirectoryResult,
    models::User,
    session::DirectorySession,
    translate::user_from_remote,
};

/// Position of the next page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: usize,
    pub page_size: usize,
}

impl PageCursor {
    pub fn first(page_size: usize) -> Self {
        Self {
            offset: 0,
            page_size,
        }
    }

    /// Cursor following a page that returned `fetched` records, or `None`
    /// when the page was short and the listing is exhausted. A zero page
    /// size never advances.
    pub fn after(self, fetched: usize) -> Option<Self> {
        (self.page_size > 0 && fetched == self.page_size).then(|| Self {
            offset: self.offset + self.page_size,
            page_size: self.page_size,
        })
    }
}

/// One fetched page and the cursor for the page after it.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: PageCursor) -> Self {
        let next = cursor.after(items.len());
        Self { items, next }
    }
}

/// Walk pages sequentially until one comes back without a next cursor.
///
/// Any failure aborts the walk and the records gathered so far are dropped.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> DirectoryResult<Vec<T>>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = DirectoryResult<Page<T>>>,
{
    let mut all = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch(cursor).await?;
        all.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(all)
}

/// Pages through the realm's users with the session's page size.
#[derive(Debug, Clone)]
pub struct UserEnumerator {
    session: Arc<DirectorySession>,
}

impl UserEnumerator {
    pub fn new(session: Arc<DirectorySession>) -> Self {
        Self { session }
    }

    /// Fetch the page at `cursor`, or the first page when `None`.
    #[tracing::instrument(skip_all, fields(realm = %self.session.realm()))]
    pub async fn fetch_page(
        &self,
        ctx: &RequestContext,
        cursor: Option<PageCursor>,
    ) -> DirectoryResult<Page<User>> {
        let conn = self.session.ensure_connected(ctx).await?;
        let cursor = cursor.unwrap_or_else(|| PageCursor::first(self.session.page_size()));

        let query = UserQuery::page(cursor.offset, cursor.page_size);
        let remote = ctx
            .run(
                self.session
                    .api()
                    .list_users(conn.token(), self.session.realm(), &query),
            )
            .await?;

        let users: Vec<User> = remote
            .iter()
            .map(|u| user_from_remote(u, conn.registry()))
            .collect();
        tracing::debug!(
            offset = cursor.offset,
            fetched = users.len(),
            "Fetched user page"
        );
        Ok(Page::new(users, cursor))
    }

    /// Every user in the realm, in remote order.
    pub async fn list_all(&self, ctx: &RequestContext) -> DirectoryResult<Vec<User>> {
        collect_pages(|cursor| self.fetch_page(ctx, cursor)).await
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        error::DirectoryError,
        testing::{FakeAdminApi, base_profile, test_config},
    };

    fn enumerator(api: Arc<FakeAdminApi>, page_size: usize) -> UserEnumerator {
        let config = test_config().with_page_size(page_size);
        UserEnumerator::new(Arc::new(DirectorySession::new(api, &config)))
    }

    #[test]
    fn test_zero_page_size_cursor_stops() {
        let cursor = PageCursor {
            offset: 0,
            page_size: 0,
        };
        assert_eq!(cursor.after(0), None);
    }

    #[test]
    fn test_cursor_advances_only_on_full_page() {
        let cursor = PageCursor::first(100);
        assert_eq!(
            cursor.after(100),
            Some(PageCursor {
                offset: 100,
                page_size: 100
            })
        );
        assert_eq!(cursor.after(99), None);
        assert_eq!(cursor.after(0), None);
    }

    #[rstest]
    #[case::empty(0, 100, 1)]
    #[case::short_first_page(42, 100, 1)]
    #[case::partial_last_page(250, 100, 3)]
    #[case::exact_multiple(200, 100, 3)]
    #[case::single_full_page(100, 100, 2)]
    #[tokio::test]
    async fn test_list_all_fetch_count(
        #[case] total: usize,
        #[case] page_size: usize,
        #[case] fetches: usize,
    ) {
        let api = Arc::new(FakeAdminApi::new().with_profile(&base_profile()));
        let ids = api.seed_users(total);

        let users = enumerator(api.clone(), page_size)
            .list_all(&RequestContext::new())
            .await
            .unwrap();

        let listed: Vec<_> = users.iter().map(|u| u.id.clone()).collect();
        assert_eq!(listed, ids);

        let queries = api.user_queries();
        assert_eq!(queries.len(), fetches);
        let offsets: Vec<_> = queries.iter().map(|q| q.first.unwrap()).collect();
        let expected: Vec<_> = (0..fetches).map(|i| i * page_size).collect();
        assert_eq!(offsets, expected);
        assert!(queries.iter().all(|q| q.max == Some(page_size)));
    }

    #[tokio::test]
    async fn test_failure_mid_walk_discards_partial_result() {
        let api = Arc::new(FakeAdminApi::new().with_profile(&base_profile()));
        api.seed_users(250);
        api.fail_list_at_offset(100);

        let err = enumerator(api.clone(), 100)
            .list_all(&RequestContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DirectoryError::Remote { status: 500, .. }));
        assert_eq!(api.user_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_page_returns_next_cursor() {
        let api = Arc::new(FakeAdminApi::new().with_profile(&base_profile()));
        api.seed_users(15);
        let enumerator = enumerator(api, 10);
        let ctx = RequestContext::new();

        let first = enumerator.fetch_page(&ctx, None).await.unwrap();
        assert_eq!(first.items.len(), 10);
        let next = first.next.unwrap();
        assert_eq!(next.offset, 10);

        let second = enumerator.fetch_page(&ctx, Some(next)).await.unwrap();
        assert_eq!(second.items.len(), 5);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_short_page() {
        let pages = collect_pages(|cursor| async move {
            let cursor = cursor.unwrap_or(PageCursor::first(2));
            let items: Vec<usize> = (cursor.offset..(cursor.offset + 2).min(5)).collect();
            Ok(Page::new(items, cursor))
        })
        .await
        .unwrap();

        assert_eq!(pages, vec![0, 1, 2, 3, 4]);
    }
}
