use crate::models::{AttributeDefinition, BUILT_IN_ATTRIBUTES, UserProfileConfig};

/// Names of the custom user attributes the adapter translates.
///
/// Built from the synchronized user profile, so attributes declared in the
/// realm at runtime are carried without code changes. Built-in fields
/// (`username`, `email`, `firstName`, `lastName`) are excluded because they
/// travel as first-class fields of the user representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRegistry {
    names: Vec<String>,
}

impl AttributeRegistry {
    pub fn from_profile(config: &UserProfileConfig) -> Self {
        Self::from_names(config.attributes.iter().map(|a| a.name.as_str()))
    }

    pub fn from_definitions(definitions: &[AttributeDefinition]) -> Self {
        Self::from_names(definitions.iter().map(|a| a.name.as_str()))
    }

    fn from_names<'a>(names: impl Iterator<Item = &'a str>) -> Self {
        let mut registry = Self::default();
        for name in names {
            if BUILT_IN_ATTRIBUTES.contains(&name) || registry.contains(name) {
                continue;
            }
            registry.names.push(name.to_string());
        }
        registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Attribute names in profile order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
