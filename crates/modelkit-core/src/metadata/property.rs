//! Scalar properties.

use super::annotations::TypeMapping;
use super::EntityTypeId;
use crate::descriptor::{MemberKind, ScalarKind};
use crate::source::ConfigurationSource;
use serde::{Deserialize, Serialize};

/// When the store generates a value for a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueGenerated {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

/// A scalar mapped member of an entity type.
#[derive(Debug, Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) member: Option<MemberKind>,
    pub(crate) scalar: Option<ScalarKind>,
    pub(crate) runtime_type_name: String,
    pub(crate) source: ConfigurationSource,
    pub(crate) is_nullable: bool,
    pub(crate) is_nullable_source: Option<ConfigurationSource>,
    pub(crate) max_length: Option<u32>,
    pub(crate) max_length_source: Option<ConfigurationSource>,
    pub(crate) column_type: Option<String>,
    pub(crate) column_type_source: Option<ConfigurationSource>,
    pub(crate) value_generated: ValueGenerated,
    pub(crate) value_generated_source: Option<ConfigurationSource>,
    pub(crate) type_mapping: Option<TypeMapping>,
}

impl Property {
    /// A new property. Nullability defaults from the runtime type: reference-like
    /// scalars and optional value types are nullable.
    pub fn new(
        name: impl Into<String>,
        declaring_type: EntityTypeId,
        scalar: Option<ScalarKind>,
        optional: bool,
        source: ConfigurationSource,
    ) -> Self {
        let is_nullable = optional || scalar.is_some_and(ScalarKind::is_reference);
        Self {
            name: name.into(),
            declaring_type,
            member: None,
            runtime_type_name: scalar.map_or_else(|| "unknown".to_string(), |s| s.name().to_string()),
            scalar,
            source,
            is_nullable,
            is_nullable_source: None,
            max_length: None,
            max_length_source: None,
            column_type: None,
            column_type_source: None,
            value_generated: ValueGenerated::Never,
            value_generated_source: None,
            type_mapping: None,
        }
    }

    /// Mark the property as backed by a runtime member.
    #[must_use]
    pub fn with_member(mut self, kind: MemberKind) -> Self {
        self.member = Some(kind);
        self
    }

    /// Record the display name of a runtime type that has no scalar mapping.
    #[must_use]
    pub fn with_runtime_type_name(mut self, name: impl Into<String>) -> Self {
        self.runtime_type_name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity type this property was first declared on.
    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    pub fn member(&self) -> Option<MemberKind> {
        self.member
    }

    /// Whether the property has no backing member.
    pub fn is_shadow(&self) -> bool {
        self.member.is_none()
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        self.scalar
    }

    pub fn runtime_type_name(&self) -> &str {
        &self.runtime_type_name
    }

    pub fn source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn is_nullable_source(&self) -> Option<ConfigurationSource> {
        self.is_nullable_source
    }

    pub fn max_length(&self) -> Option<u32> {
        self.max_length
    }

    pub fn max_length_source(&self) -> Option<ConfigurationSource> {
        self.max_length_source
    }

    pub fn column_type(&self) -> Option<&str> {
        self.column_type.as_deref()
    }

    pub fn column_type_source(&self) -> Option<ConfigurationSource> {
        self.column_type_source
    }

    pub fn value_generated(&self) -> ValueGenerated {
        self.value_generated
    }

    pub fn value_generated_source(&self) -> Option<ConfigurationSource> {
        self.value_generated_source
    }

    pub fn type_mapping(&self) -> Option<&TypeMapping> {
        self.type_mapping.as_ref()
    }

    /// Upgrade the property's own source.
    pub fn update_source(&mut self, source: ConfigurationSource) {
        self.source = source.max_with(Some(self.source));
    }

    /// Set nullability if `source` may override the current setting.
    pub fn set_nullable(&mut self, nullable: bool, source: ConfigurationSource) -> bool {
        if !source.overrides(self.is_nullable_source) {
            return false;
        }
        self.is_nullable = nullable;
        self.is_nullable_source = Some(source.max_with(self.is_nullable_source));
        true
    }

    pub fn set_max_length(&mut self, length: Option<u32>, source: ConfigurationSource) -> bool {
        if !source.overrides(self.max_length_source) {
            return false;
        }
        self.max_length = length;
        self.max_length_source = Some(source.max_with(self.max_length_source));
        true
    }

    pub fn set_column_type(&mut self, store_type: Option<String>, source: ConfigurationSource) -> bool {
        if !source.overrides(self.column_type_source) {
            return false;
        }
        self.column_type = store_type;
        self.column_type_source = Some(source.max_with(self.column_type_source));
        true
    }

    pub fn set_value_generated(&mut self, value: ValueGenerated, source: ConfigurationSource) -> bool {
        if !source.overrides(self.value_generated_source) {
            return false;
        }
        self.value_generated = value;
        self.value_generated_source = Some(source.max_with(self.value_generated_source));
        true
    }

    pub fn set_type_mapping(&mut self, mapping: Option<TypeMapping>) {
        self.type_mapping = mapping;
    }

    /// Back a shadow property with a runtime member. Nullability follows the member's
    /// type unless it was configured.
    pub fn attach_member(&mut self, kind: MemberKind, scalar: Option<ScalarKind>, optional: bool) {
        self.member = Some(kind);
        if let Some(scalar) = scalar {
            self.scalar = Some(scalar);
            self.runtime_type_name = scalar.name().to_string();
        }
        if self.is_nullable_source.is_none() {
            self.is_nullable = optional || self.scalar.is_some_and(ScalarKind::is_reference);
        }
    }
}
