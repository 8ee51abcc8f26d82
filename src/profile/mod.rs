//! Attribute profile synchronization.
//!
//! Keycloak only stores user attributes its declarative user profile knows
//! about. The synchronizer reads the profile from the realm's
//! `declarative-user-profile` component, appends every required attribute
//! definition that is missing, and writes the profile back. Existing
//! definitions are never modified, so running it again is a no-op write.
//!
//! The read-modify-write is not transactional: a concurrent writer to the
//! same component can lose its update.

mod registry;

pub use registry::AttributeRegistry;

use crate::{
    client::{AdminApi, ComponentRepresentation},
    context::RequestContext,
    error::{DirectoryError, DirectoryResult},
    models::{AttributeDefinition, UserProfileConfig, organization_attributes},
};

/// Provider id of the component holding the user profile.
pub const USER_PROFILE_PROVIDER_ID: &str = "declarative-user-profile";

/// Component config key holding the serialized profile.
pub const USER_PROFILE_CONFIG_KEY: &str = "kc.user.profile.config";

/// Append each definition in `required` whose name is not already present.
///
/// Pre-existing entries keep their position and content. Returns the
/// number of definitions appended.
pub fn merge_attributes(config: &mut UserProfileConfig, required: &[AttributeDefinition]) -> usize {
    let mut added = 0;
    for attr in required {
        if config.find_attribute(&attr.name).is_some() {
            continue;
        }
        config.attributes.push(attr.clone());
        added += 1;
    }
    added
}

/// First component whose provider id matches `provider_id`.
pub fn find_component<'a>(
    components: &'a [ComponentRepresentation],
    provider_id: &str,
) -> Option<&'a ComponentRepresentation> {
    components
        .iter()
        .find(|c| c.provider_id.as_deref() == Some(provider_id))
}

/// Parse the profile blob out of a user-profile component.
pub fn parse_profile(component: &ComponentRepresentation) -> DirectoryResult<UserProfileConfig> {
    let values = component
        .config
        .as_ref()
        .and_then(|c| c.get(USER_PROFILE_CONFIG_KEY))
        .ok_or_else(|| {
            DirectoryError::MalformedConfig(format!("{USER_PROFILE_CONFIG_KEY} is missing"))
        })?;

    let [raw] = values.as_slice() else {
        return Err(DirectoryError::MalformedConfig(format!(
            "{USER_PROFILE_CONFIG_KEY} has {} values, expected 1",
            values.len()
        )));
    };

    serde_json::from_str(raw).map_err(|e| {
        DirectoryError::MalformedConfig(format!("{USER_PROFILE_CONFIG_KEY} is not valid: {e}"))
    })
}

/// Serialize `config` into the component's profile key.
pub fn write_profile(
    component: &mut ComponentRepresentation,
    config: &UserProfileConfig,
) -> DirectoryResult<()> {
    let serialized = serde_json::to_string(config)?;
    component
        .config
        .get_or_insert_with(Default::default)
        .insert(USER_PROFILE_CONFIG_KEY.to_string(), vec![serialized]);
    Ok(())
}

/// Ensures a fixed set of attribute definitions exists in a realm's profile.
#[derive(Debug, Clone)]
pub struct ProfileSynchronizer {
    required: Vec<AttributeDefinition>,
}

impl ProfileSynchronizer {
    pub fn new(required: Vec<AttributeDefinition>) -> Self {
        Self { required }
    }

    /// The organization attribute set plus `extra` names, each defined as a
    /// single-valued string attribute.
    pub fn with_extra_attributes(extra: &[String]) -> Self {
        let mut required = organization_attributes();
        required.extend(extra.iter().map(|name| AttributeDefinition::organization(name)));
        Self::new(required)
    }

    pub fn required(&self) -> &[AttributeDefinition] {
        &self.required
    }

    /// Run the merge against `realm` and return the profile as written.
    #[tracing::instrument(skip_all, fields(realm = %realm))]
    pub async fn sync(
        &self,
        api: &dyn AdminApi,
        ctx: &RequestContext,
        token: &str,
        realm: &str,
    ) -> DirectoryResult<UserProfileConfig> {
        let components = ctx.run(api.list_components(token, realm)).await?;
        let mut component = find_component(&components, USER_PROFILE_PROVIDER_ID)
            .cloned()
            .ok_or(DirectoryError::ProfileNotFound)?;

        let mut config = parse_profile(&component)?;
        let added = merge_attributes(&mut config, &self.required);
        // Nothing appended: the stored blob is written back as read
        if added > 0 {
            write_profile(&mut component, &config)?;
        }

        ctx.run(api.update_component(token, realm, &component))
            .await?;

        tracing::info!(
            added,
            total = config.attributes.len(),
            "User profile attributes synchronized"
        );
        Ok(config)
    }
}

impl Default for ProfileSynchronizer {
    fn default() -> Self {
        Self::new(organization_attributes())
    }
}
