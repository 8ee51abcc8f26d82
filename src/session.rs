//! Admin session and token lifecycle.
//!
//! Every directory operation calls [`DirectorySession::ensure_connected`]
//! first. The access token is cached together with the attribute registry
//! produced by the profile synchronizer, and both are replaced whenever the
//! token is re-established.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::{
    client::{AdminApi, KeycloakRestClient},
    config::KeycloakConfig,
    context::RequestContext,
    error::{DirectoryError, DirectoryResult},
    profile::{AttributeRegistry, ProfileSynchronizer},
};

/// Upper bound applied to token lifetimes and the refresh skew.
const MAX_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedSession {
    access_token: Arc<str>,
    /// Point after which the token is re-established. `None` when the token
    /// response carried no lifetime.
    refresh_at: Option<DateTime<Utc>>,
    registry: Arc<AttributeRegistry>,
}

impl CachedSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at.is_some_and(|at| now >= at)
    }

    fn connection(&self) -> Connection {
        Connection {
            token: self.access_token.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// A valid access token and the attribute registry of its session.
#[derive(Debug, Clone)]
pub struct Connection {
    token: Arc<str>,
    registry: Arc<AttributeRegistry>,
}

impl Connection {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }
}

/// Authenticated connection state of one adapter instance.
///
/// Shared through an `Arc` by the user and group managers of that instance.
pub struct DirectorySession {
    api: Arc<dyn AdminApi>,
    realm: String,
    username: String,
    password: String,
    page_size: usize,
    refresh_skew: Duration,
    synchronizer: ProfileSynchronizer,
    sync_profile: bool,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedSession>>,
}

impl std::fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySession")
            .field("realm", &self.realm)
            .field("username", &self.username)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl DirectorySession {
    pub fn new(api: Arc<dyn AdminApi>, config: &KeycloakConfig) -> Self {
        Self {
            api,
            realm: config.realm.clone(),
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            page_size: config.page_size.max(1),
            refresh_skew: Duration::seconds(
                config.token_refresh_skew_secs.min(MAX_LIFETIME_SECS as u64) as i64,
            ),
            synchronizer: ProfileSynchronizer::with_extra_attributes(&config.extra_attributes),
            sync_profile: config.sync_profile,
            clock: Arc::new(SystemClock),
            cached: RwLock::new(None),
        }
    }

    /// Session talking to Keycloak over HTTP.
    pub fn from_config(config: &KeycloakConfig) -> DirectoryResult<Self> {
        config
            .validate()
            .map_err(|e| DirectoryError::Config(e.to_string()))?;
        let client = KeycloakRestClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &dyn AdminApi {
        self.api.as_ref()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Return a valid connection, authenticating when no token is cached or
    /// the cached one is within the refresh skew of its expiry.
    ///
    /// Concurrent callers racing on first use authenticate once.
    pub async fn ensure_connected(&self, ctx: &RequestContext) -> DirectoryResult<Connection> {
        let now = self.clock.now();
        {
            let cached = self.cached.read().await;
            if let Some(session) = cached.as_ref()
                && !session.is_expired(now)
            {
                return Ok(session.connection());
            }
        }

        let mut cached = self.cached.write().await;
        let now = self.clock.now();
        if let Some(session) = cached.as_ref()
            && !session.is_expired(now)
        {
            return Ok(session.connection());
        }

        // Stale state must not survive a failed re-establishment.
        *cached = None;
        let session = self.establish(ctx, now).await?;
        let connection = session.connection();
        *cached = Some(session);
        Ok(connection)
    }

    #[tracing::instrument(skip_all, fields(realm = %self.realm))]
    async fn establish(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> DirectoryResult<CachedSession> {
        let token = ctx
            .run(self.api.login(&self.realm, &self.username, &self.password))
            .await?;

        let refresh_at = (token.expires_in > 0).then(|| {
            let lifetime = Duration::seconds(token.expires_in.min(MAX_LIFETIME_SECS));
            now + lifetime - self.effective_skew(lifetime)
        });

        let registry = if self.sync_profile {
            let profile = self
                .synchronizer
                .sync(self.api.as_ref(), ctx, &token.access_token, &self.realm)
                .await?;
            AttributeRegistry::from_profile(&profile)
        } else {
            AttributeRegistry::from_definitions(self.synchronizer.required())
        };

        tracing::info!(
            refresh_at = ?refresh_at,
            attributes = registry.len(),
            "Admin session established"
        );

        Ok(CachedSession {
            access_token: token.access_token.into(),
            refresh_at,
            registry: Arc::new(registry),
        })
    }

    /// Drop the cached token so the next operation re-authenticates.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    pub async fn is_connected(&self) -> bool {
        let now = self.clock.now();
        self.cached
            .read()
            .await
            .as_ref()
            .is_some_and(|s| !s.is_expired(now))
    }

    /// Refresh skew for a token of `lifetime`, capped at half the lifetime
    /// so short-lived tokens are still reused.
    fn effective_skew(&self, lifetime: Duration) -> Duration {
        self.refresh_skew.min(lifetime / 2)
    }
}
