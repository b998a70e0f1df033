//! Annotations attached for the provider layer once discovery is complete.

use serde::{Deserialize, Serialize};

/// Resolved store mapping of a scalar property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapping {
    /// Full store type, e.g. `varchar(255)`.
    pub store_type: String,
    /// Store type without facets, e.g. `varchar`.
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl TypeMapping {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            store_type: base.clone(),
            base,
            size: None,
            precision: None,
            scale: None,
        }
    }

    /// Set a size facet and render it into the store type.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self.store_type = format!("{}({})", self.base, size);
        self
    }

    /// Set precision/scale facets and render them into the store type.
    #[must_use]
    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self.store_type = format!("{}({},{})", self.base, precision, scale);
        self
    }
}

/// How one constructor parameter is supplied at materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ParameterBinding {
    /// Supplied by a service of the named type.
    Service(String),
    /// Supplied from the named property's value.
    Property(String),
}

/// The constructor chosen for materializing an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorBinding {
    pub signature: String,
    pub parameters: Vec<ParameterBinding>,
}

impl ConstructorBinding {
    pub fn service_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| matches!(p, ParameterBinding::Service(_)))
            .count()
    }

    pub fn property_count(&self) -> usize {
        self.parameters.len() - self.service_count()
    }
}
