//! Mapping between Keycloak representations and directory records.
//!
//! Pure functions. User attributes only cross the boundary when the
//! [`AttributeRegistry`] knows their name.

use std::collections::BTreeMap;

use crate::{
    client::{GroupRepresentation, UserRepresentation},
    models::{DISPLAY_NAME_ATTRIBUTE, GROUP_SOURCE, GROUP_TYPE, Group, User},
    profile::AttributeRegistry,
};

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Full representation of `user` for create and update calls.
///
/// Attributes outside the registry are dropped. A non-empty `display_name`
/// is carried as the `DisplayName` attribute when the registry declares it.
pub fn user_to_remote(user: &User, registry: &AttributeRegistry) -> UserRepresentation {
    let mut attributes: BTreeMap<String, Vec<String>> = user
        .attributes
        .iter()
        .filter(|(name, _)| registry.contains(name))
        .map(|(name, value)| (name.clone(), vec![value.clone()]))
        .collect();

    if !user.display_name.is_empty() && registry.contains(DISPLAY_NAME_ATTRIBUTE) {
        attributes.insert(
            DISPLAY_NAME_ATTRIBUTE.to_string(),
            vec![user.display_name.clone()],
        );
    }

    UserRepresentation {
        id: non_empty(&user.id),
        username: Some(user.username.clone()),
        first_name: Some(user.first_name.clone()),
        last_name: Some(user.last_name.clone()),
        email: Some(user.email.clone()),
        enabled: Some(user.enabled),
        attributes: Some(attributes),
    }
}

/// Representation carrying only the id and the enabled flag.
pub fn enabled_only(id: &str, enabled: bool) -> UserRepresentation {
    UserRepresentation {
        id: Some(id.to_string()),
        enabled: Some(enabled),
        ..Default::default()
    }
}

pub fn user_from_remote(remote: &UserRepresentation, registry: &AttributeRegistry) -> User {
    let attributes = registry
        .names()
        .filter_map(|name| {
            remote
                .attribute(name)
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    User {
        id: remote.id.clone().unwrap_or_default(),
        username: remote.username.clone().unwrap_or_default(),
        first_name: remote.first_name.clone().unwrap_or_default(),
        last_name: remote.last_name.clone().unwrap_or_default(),
        email: remote.email.clone().unwrap_or_default(),
        enabled: remote.enabled.unwrap_or(false),
        display_name: remote
            .attribute(DISPLAY_NAME_ATTRIBUTE)
            .unwrap_or_default()
            .to_string(),
        attributes,
    }
}

pub fn group_to_remote(group: &Group) -> GroupRepresentation {
    GroupRepresentation {
        id: non_empty(&group.id),
        name: non_empty(&group.name),
        ..Default::default()
    }
}

/// Directory group tagged with the Keycloak source and type. The raw
/// representation is kept in `extra`.
pub fn group_from_remote(remote: &GroupRepresentation) -> Group {
    Group {
        id: remote.id.clone().unwrap_or_default(),
        name: remote.name.clone().unwrap_or_default(),
        source: GROUP_SOURCE.to_string(),
        group_type: GROUP_TYPE.to_string(),
        extra: serde_json::to_value(remote).ok().filter(|v| !v.is_null()),
    }
}
