//! User and group directory adapter backed by the Keycloak admin REST API.
//!
//! A [`KeycloakDirectory`] owns one admin [`DirectorySession`] shared by its
//! [`KeycloakUserManager`] and [`KeycloakGroupManager`]. The session
//! authenticates lazily, re-authenticates before the token expires, and
//! on each establishment makes sure the realm's declarative user profile
//! declares every attribute the adapter translates.
//!
//! ```no_run
//! use keycloak_directory::{
//!     KeycloakConfig, KeycloakDirectory, RequestContext, User, UserManager,
//! };
//!
//! # async fn run() -> keycloak_directory::DirectoryResult<()> {
//! let config = KeycloakConfig::new("https://sso.example.com/", "admin", "secret")
//!     .with_realm("corp");
//! let directory = KeycloakDirectory::new(&config)?;
//! let ctx = RequestContext::new();
//!
//! let mut user = User::new("jdoe").with_email("jdoe@example.com");
//! directory.users().create_user(&ctx, &mut user).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod groups;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod pagination;
pub mod profile;
pub mod provider;
pub mod realm;
pub mod session;
pub mod translate;
pub mod users;

#[cfg(test)]
mod testing;

pub use client::{AdminApi, KeycloakRestClient};
pub use config::{DirectoryConfig, KeycloakConfig};
pub use context::RequestContext;
pub use error::{DirectoryError, DirectoryResult, MemberFailure};
pub use groups::KeycloakGroupManager;
pub use models::{Group, MembershipReport, User};
pub use pagination::{Page, PageCursor};
pub use profile::{AttributeRegistry, ProfileSynchronizer};
pub use provider::{GroupManager, KEYCLOAK, KeycloakDirectory, UserManager};
pub use realm::{ActiveDirectoryFederation, KeycloakRealmAdmin, OidcWebClient};
pub use session::{Clock, DirectorySession, SystemClock};
pub use users::KeycloakUserManager;
