//! Convention pipeline configuration.

use modelkit_core::Result;
use serde::Deserialize;

/// Toggles and defaults shared by the built-in conventions.
///
/// Every field has a default, so a JSON document only needs the settings it changes:
///
/// ```ignore
/// let config = ConventionConfig::from_json(r#"{"bind_constructors": false}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConventionConfig {
    /// Remove entity types that cannot be reached from a root at model-built time.
    pub remove_unreachable_types: bool,
    /// Remove convention-created foreign keys that ended up with no navigations.
    pub prune_navigationless_foreign_keys: bool,
    /// Derive requiredness from compiler nullability markers.
    pub honor_nullable_markers: bool,
    /// Choose and record a materialization constructor for every entity type.
    pub bind_constructors: bool,
    /// Parameter types treated as injectable services during constructor binding.
    pub service_type_names: Vec<String>,
    /// Store size applied to string key columns that have no max length.
    pub string_key_max_length: Option<u32>,
}

impl Default for ConventionConfig {
    fn default() -> Self {
        Self {
            remove_unreachable_types: true,
            prune_navigationless_foreign_keys: true,
            honor_nullable_markers: true,
            bind_constructors: true,
            service_type_names: vec![
                "LazyLoader".to_string(),
                "ModelContext".to_string(),
                "EntityType".to_string(),
            ],
            string_key_max_length: None,
        }
    }
}

impl ConventionConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn remove_unreachable_types(mut self, enabled: bool) -> Self {
        self.remove_unreachable_types = enabled;
        self
    }

    #[must_use]
    pub fn prune_navigationless_foreign_keys(mut self, enabled: bool) -> Self {
        self.prune_navigationless_foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn honor_nullable_markers(mut self, enabled: bool) -> Self {
        self.honor_nullable_markers = enabled;
        self
    }

    #[must_use]
    pub fn bind_constructors(mut self, enabled: bool) -> Self {
        self.bind_constructors = enabled;
        self
    }

    /// Add a service parameter type name.
    #[must_use]
    pub fn service_type(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.service_type_names.contains(&name) {
            self.service_type_names.push(name);
        }
        self
    }

    #[must_use]
    pub fn string_key_max_length(mut self, length: Option<u32>) -> Self {
        self.string_key_max_length = length;
        self
    }
}
