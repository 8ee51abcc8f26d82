//! In-memory [`AdminApi`] used by unit tests.
//!
//! Mimics the Keycloak behaviours the directory depends on: 404 for missing
//! resources, 409 for duplicate names, partial merges on user update, and
//! stable insertion order for paged listings.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    client::{
        AdminApi, ClientRepresentation, ComponentRepresentation, CredentialRepresentation,
        GroupQuery, GroupRepresentation, Paging, RealmRepresentation, SyncAction, TokenResponse,
        UserQuery, UserRepresentation,
    },
    config::KeycloakConfig,
    error::{DirectoryError, DirectoryResult},
    models::{UserProfileConfig, default_attributes},
    profile::{USER_PROFILE_CONFIG_KEY, USER_PROFILE_PROVIDER_ID},
    session::Clock,
};

/// Clock that only moves when told to.
pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Serialized profile holding only the built-in attributes.
pub(crate) fn base_profile() -> String {
    serde_json::to_string(&UserProfileConfig {
        attributes: default_attributes(),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn test_config() -> KeycloakConfig {
    KeycloakConfig::new("http://keycloak.test", "admin", "admin")
}

#[derive(Default)]
struct State {
    users: Vec<UserRepresentation>,
    groups: Vec<GroupRepresentation>,
    memberships: Vec<(String, String)>,
    components: Vec<ComponentRepresentation>,
    passwords: Vec<(String, String, bool)>,
    syncs: Vec<(String, SyncAction)>,
    user_queries: Vec<UserQuery>,
    member_pages: Vec<Paging>,
    clients: Vec<ClientRepresentation>,
    fail_list_at_offset: Option<usize>,
    unreachable: bool,
    next_id: usize,
}

pub(crate) struct FakeAdminApi {
    username: String,
    password: String,
    token_ttl_secs: i64,
    logins: AtomicUsize,
    component_updates: AtomicUsize,
    state: Mutex<State>,
}

fn not_found(what: &str) -> DirectoryError {
    DirectoryError::Remote {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn conflict(message: String) -> DirectoryError {
    DirectoryError::Remote {
        status: 409,
        message,
    }
}

impl FakeAdminApi {
    pub(crate) fn new() -> Self {
        Self {
            username: "admin".into(),
            password: "admin".into(),
            token_ttl_secs: 300,
            logins: AtomicUsize::new(0),
            component_updates: AtomicUsize::new(0),
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn with_token_ttl(mut self, secs: i64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn component_updates(&self) -> usize {
        self.component_updates.load(Ordering::SeqCst)
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub(crate) fn fail_list_at_offset(&self, offset: usize) {
        self.state().fail_list_at_offset = Some(offset);
    }

    pub(crate) fn set_components(&self, components: Vec<ComponentRepresentation>) {
        self.state().components = components;
    }

    /// Add a user profile component holding `raw`.
    pub(crate) fn with_profile(self, raw: &str) -> Self {
        self.state().components.push(ComponentRepresentation {
            id: Some("up-component".into()),
            name: Some("Declarative User Profile".into()),
            provider_id: Some(USER_PROFILE_PROVIDER_ID.into()),
            provider_type: Some("org.keycloak.userprofile.UserProfileProvider".into()),
            config: Some(
                [(USER_PROFILE_CONFIG_KEY.to_string(), vec![raw.to_string()])]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        });
        self
    }

    /// Current serialized user profile, if a profile component exists.
    pub(crate) fn profile_blob(&self) -> Option<String> {
        self.state()
            .components
            .iter()
            .find(|c| c.provider_id.as_deref() == Some(USER_PROFILE_PROVIDER_ID))
            .and_then(|c| c.config.as_ref()?.get(USER_PROFILE_CONFIG_KEY)?.first().cloned())
    }

    /// Insert users directly, bypassing the API. Returns their ids.
    pub(crate) fn seed_users(&self, count: usize) -> Vec<String> {
        let mut state = self.state();
        (0..count)
            .map(|i| {
                state.next_id += 1;
                let id = format!("user-{}", state.next_id);
                state.users.push(UserRepresentation {
                    id: Some(id.clone()),
                    username: Some(format!("seed{i:04}")),
                    email: Some(format!("seed{i:04}@example.com")),
                    enabled: Some(true),
                    ..Default::default()
                });
                id
            })
            .collect()
    }

    pub(crate) fn user_queries(&self) -> Vec<UserQuery> {
        self.state().user_queries.clone()
    }

    pub(crate) fn stored_user(&self, id: &str) -> Option<UserRepresentation> {
        self.state()
            .users
            .iter()
            .find(|u| u.id.as_deref() == Some(id))
            .cloned()
    }

    pub(crate) fn passwords(&self) -> Vec<(String, String, bool)> {
        self.state().passwords.clone()
    }

    pub(crate) fn syncs(&self) -> Vec<(String, SyncAction)> {
        self.state().syncs.clone()
    }

    /// Record memberships directly, bypassing the API.
    pub(crate) fn seed_members(&self, group_id: &str, user_ids: &[String]) {
        let mut state = self.state();
        state.memberships.extend(
            user_ids
                .iter()
                .map(|uid| (uid.clone(), group_id.to_string())),
        );
    }

    /// Windows requested from the member and membership listings.
    pub(crate) fn member_pages(&self) -> Vec<Paging> {
        self.state().member_pages.clone()
    }

    pub(crate) fn clients(&self) -> Vec<ClientRepresentation> {
        self.state().clients.clone()
    }

    pub(crate) fn component(&self, id: &str) -> Option<ComponentRepresentation> {
        self.state()
            .components
            .iter()
            .find(|c| c.id.as_deref() == Some(id))
            .cloned()
    }

    fn check_token(token: &str) -> DirectoryResult<()> {
        if token.starts_with("tok") {
            Ok(())
        } else {
            Err(DirectoryError::Remote {
                status: 401,
                message: "HTTP 401 Unauthorized".into(),
            })
        }
    }
}

fn has_user(state: &State, id: &str) -> bool {
    state.users.iter().any(|u| u.id.as_deref() == Some(id))
}

fn has_group(state: &State, id: &str) -> bool {
    state.groups.iter().any(|g| g.id.as_deref() == Some(id))
}

#[async_trait]
impl AdminApi for FakeAdminApi {
    async fn login(
        &self,
        _realm: &str,
        username: &str,
        password: &str,
    ) -> DirectoryResult<TokenResponse> {
        if self.state().unreachable {
            return Err(DirectoryError::Authentication(
                "Endpoint unreachable: connection refused".into(),
            ));
        }
        if username != self.username || password != self.password {
            return Err(DirectoryError::Authentication(
                "Admin login rejected (401): Invalid user credentials".into(),
            ));
        }
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenResponse {
            access_token: format!("tok-{n}"),
            expires_in: self.token_ttl_secs,
            refresh_token: None,
            token_type: Some("Bearer".into()),
        })
    }

    async fn get_user(
        &self,
        token: &str,
        _realm: &str,
        id: &str,
    ) -> DirectoryResult<UserRepresentation> {
        Self::check_token(token)?;
        self.stored_user(id).ok_or_else(|| not_found("User"))
    }

    async fn list_users(
        &self,
        token: &str,
        _realm: &str,
        query: &UserQuery,
    ) -> DirectoryResult<Vec<UserRepresentation>> {
        Self::check_token(token)?;
        let mut state = self.state();
        state.user_queries.push(query.clone());

        if let (Some(fail_at), Some(first)) = (state.fail_list_at_offset, query.first)
            && first == fail_at
        {
            return Err(DirectoryError::Remote {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }

        let exact = query.exact.unwrap_or(false);
        let matches: Vec<_> = state
            .users
            .iter()
            .filter(|u| match &query.username {
                Some(name) if exact => u.username.as_deref() == Some(name.as_str()),
                Some(name) => u
                    .username
                    .as_deref()
                    .is_some_and(|n| n.contains(name.to_lowercase().as_str())),
                None => true,
            })
            .filter(|u| match &query.email {
                Some(email) => u
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&email.to_lowercase())),
                None => true,
            })
            .cloned()
            .collect();

        let first = query.first.unwrap_or(0);
        let max = query.max.unwrap_or(100);
        Ok(matches.into_iter().skip(first).take(max).collect())
    }

    async fn create_user(
        &self,
        token: &str,
        _realm: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<String> {
        Self::check_token(token)?;
        let mut state = self.state();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(conflict("User exists with same username".into()));
        }
        state.next_id += 1;
        let id = format!("user-{}", state.next_id);
        let mut stored = user.clone();
        stored.id = Some(id.clone());
        stored.username = stored.username.map(|n| n.to_lowercase());
        state.users.push(stored);
        Ok(id)
    }

    async fn update_user(
        &self,
        token: &str,
        _realm: &str,
        id: &str,
        user: &UserRepresentation,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        let stored = state
            .users
            .iter_mut()
            .find(|u| u.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("User"))?;

        if user.username.is_some() {
            stored.username = user.username.clone();
        }
        if user.first_name.is_some() {
            stored.first_name = user.first_name.clone();
        }
        if user.last_name.is_some() {
            stored.last_name = user.last_name.clone();
        }
        if user.email.is_some() {
            stored.email = user.email.clone();
        }
        if user.enabled.is_some() {
            stored.enabled = user.enabled;
        }
        if user.attributes.is_some() {
            stored.attributes = user.attributes.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, token: &str, _realm: &str, id: &str) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_user(&state, id) {
            return Err(not_found("User"));
        }
        state.users.retain(|u| u.id.as_deref() != Some(id));
        state.memberships.retain(|(u, _)| u != id);
        Ok(())
    }

    async fn reset_password(
        &self,
        token: &str,
        _realm: &str,
        id: &str,
        credential: &CredentialRepresentation,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_user(&state, id) {
            return Err(not_found("User"));
        }
        state
            .passwords
            .push((id.to_string(), credential.value.clone(), credential.temporary));
        Ok(())
    }

    async fn list_groups(
        &self,
        token: &str,
        _realm: &str,
        query: &GroupQuery,
    ) -> DirectoryResult<Vec<GroupRepresentation>> {
        Self::check_token(token)?;
        let exact = query.exact.unwrap_or(false);
        Ok(self
            .state()
            .groups
            .iter()
            .filter(|g| match &query.search {
                Some(search) if exact => g.name.as_deref() == Some(search.as_str()),
                Some(search) => g
                    .name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&search.to_lowercase())),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_group(
        &self,
        token: &str,
        _realm: &str,
        id: &str,
    ) -> DirectoryResult<GroupRepresentation> {
        Self::check_token(token)?;
        self.state()
            .groups
            .iter()
            .find(|g| g.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| not_found("Could not find group by id"))
    }

    async fn create_group(
        &self,
        token: &str,
        _realm: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<String> {
        Self::check_token(token)?;
        let mut state = self.state();
        if state.groups.iter().any(|g| g.name == group.name) {
            return Err(conflict(format!(
                "Top level group named '{}' already exists.",
                group.name.as_deref().unwrap_or_default()
            )));
        }
        state.next_id += 1;
        let id = format!("group-{}", state.next_id);
        let mut stored = group.clone();
        stored.id = Some(id.clone());
        stored.path = stored.name.as_ref().map(|n| format!("/{n}"));
        state.groups.push(stored);
        Ok(id)
    }

    async fn update_group(
        &self,
        token: &str,
        _realm: &str,
        id: &str,
        group: &GroupRepresentation,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        let stored = state
            .groups
            .iter_mut()
            .find(|g| g.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("Could not find group by id"))?;
        if group.name.is_some() {
            stored.name = group.name.clone();
            stored.path = group.name.as_ref().map(|n| format!("/{n}"));
        }
        Ok(())
    }

    async fn delete_group(&self, token: &str, _realm: &str, id: &str) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_group(&state, id) {
            return Err(not_found("Could not find group by id"));
        }
        state.groups.retain(|g| g.id.as_deref() != Some(id));
        state.memberships.retain(|(_, g)| g != id);
        Ok(())
    }

    async fn group_members(
        &self,
        token: &str,
        _realm: &str,
        group_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<UserRepresentation>> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_group(&state, group_id) {
            return Err(not_found("Could not find group by id"));
        }
        state.member_pages.push(paging);
        Ok(state
            .users
            .iter()
            .filter(|u| {
                state
                    .memberships
                    .iter()
                    .any(|(uid, gid)| gid == group_id && u.id.as_deref() == Some(uid.as_str()))
            })
            .skip(paging.first)
            .take(paging.max)
            .cloned()
            .collect())
    }

    async fn user_groups(
        &self,
        token: &str,
        _realm: &str,
        user_id: &str,
        paging: Paging,
    ) -> DirectoryResult<Vec<GroupRepresentation>> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_user(&state, user_id) {
            return Err(not_found("User"));
        }
        state.member_pages.push(paging);
        Ok(state
            .groups
            .iter()
            .filter(|g| {
                state
                    .memberships
                    .iter()
                    .any(|(uid, gid)| uid == user_id && g.id.as_deref() == Some(gid.as_str()))
            })
            .skip(paging.first)
            .take(paging.max)
            .cloned()
            .collect())
    }

    async fn add_user_to_group(
        &self,
        token: &str,
        _realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_user(&state, user_id) {
            return Err(not_found("User"));
        }
        if !has_group(&state, group_id) {
            return Err(not_found("Group"));
        }
        let pair = (user_id.to_string(), group_id.to_string());
        if !state.memberships.contains(&pair) {
            state.memberships.push(pair);
        }
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        token: &str,
        _realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !has_user(&state, user_id) {
            return Err(not_found("User"));
        }
        if !has_group(&state, group_id) {
            return Err(not_found("Group"));
        }
        state
            .memberships
            .retain(|(u, g)| !(u == user_id && g == group_id));
        Ok(())
    }

    async fn list_components(
        &self,
        token: &str,
        _realm: &str,
    ) -> DirectoryResult<Vec<ComponentRepresentation>> {
        Self::check_token(token)?;
        Ok(self.state().components.clone())
    }

    async fn update_component(
        &self,
        token: &str,
        _realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        let stored = state
            .components
            .iter_mut()
            .find(|c| c.id == component.id)
            .ok_or_else(|| not_found("Component"))?;
        *stored = component.clone();
        self.component_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_component(
        &self,
        token: &str,
        _realm: &str,
        component: &ComponentRepresentation,
    ) -> DirectoryResult<String> {
        Self::check_token(token)?;
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("component-{}", state.next_id);
        let mut stored = component.clone();
        stored.id = Some(id.clone());
        state.components.push(stored);
        Ok(id)
    }

    async fn create_client(
        &self,
        token: &str,
        _realm: &str,
        client: &ClientRepresentation,
    ) -> DirectoryResult<String> {
        Self::check_token(token)?;
        let mut state = self.state();
        if state
            .clients
            .iter()
            .any(|c| c.client_id == client.client_id)
        {
            return Err(conflict(format!(
                "Client {} already exists",
                client.client_id.as_deref().unwrap_or_default()
            )));
        }
        state.next_id += 1;
        let id = format!("client-{}", state.next_id);
        let mut stored = client.clone();
        stored.id = Some(id.clone());
        state.clients.push(stored);
        Ok(id)
    }

    async fn get_realm(&self, token: &str, realm: &str) -> DirectoryResult<RealmRepresentation> {
        Self::check_token(token)?;
        Ok(RealmRepresentation {
            id: Some(format!("{realm}-id")),
            realm: Some(realm.to_string()),
        })
    }

    async fn trigger_user_storage_sync(
        &self,
        token: &str,
        _realm: &str,
        component_id: &str,
        action: SyncAction,
    ) -> DirectoryResult<()> {
        Self::check_token(token)?;
        let mut state = self.state();
        if !state
            .components
            .iter()
            .any(|c| c.id.as_deref() == Some(component_id))
        {
            return Err(not_found("Component"));
        }
        state.syncs.push((component_id.to_string(), action));
        Ok(())
    }
}
