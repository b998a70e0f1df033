//! Entity types.

use super::annotations::ConstructorBinding;
use super::{EntityTypeId, ForeignKeyId, KeyId, PropertyId};
use crate::source::ConfigurationSource;
use std::collections::BTreeMap;

/// Owner and navigation that identify a weak (owned) entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefiningNavigation {
    pub owner: EntityTypeId,
    pub navigation: String,
}

/// One mapped shape in the model.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) runtime_type: Option<String>,
    pub(crate) source: ConfigurationSource,
    pub(crate) base_type: Option<EntityTypeId>,
    pub(crate) base_type_source: Option<ConfigurationSource>,
    pub(crate) defining_navigation: Option<DefiningNavigation>,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) keys: Vec<KeyId>,
    pub(crate) primary_key: Option<KeyId>,
    pub(crate) primary_key_source: Option<ConfigurationSource>,
    pub(crate) keyless_source: Option<ConfigurationSource>,
    pub(crate) foreign_keys: Vec<ForeignKeyId>,
    pub(crate) referencing_foreign_keys: Vec<ForeignKeyId>,
    pub(crate) ignored_members: BTreeMap<String, ConfigurationSource>,
    pub(crate) constructor_binding: Option<ConstructorBinding>,
}

impl EntityType {
    pub(crate) fn new(
        name: String,
        runtime_type: Option<String>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            name,
            runtime_type,
            source,
            base_type: None,
            base_type_source: None,
            defining_navigation: None,
            properties: Vec::new(),
            keys: Vec::new(),
            primary_key: None,
            primary_key_source: None,
            keyless_source: None,
            foreign_keys: Vec::new(),
            referencing_foreign_keys: Vec::new(),
            ignored_members: BTreeMap::new(),
            constructor_binding: None,
        }
    }

    /// Model-unique name. Weak types are named `Owner.navigation#Type`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the backing runtime type; `None` for shadow types.
    pub fn runtime_type(&self) -> Option<&str> {
        self.runtime_type.as_deref()
    }

    pub fn source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn base_type(&self) -> Option<EntityTypeId> {
        self.base_type
    }

    pub fn base_type_source(&self) -> Option<ConfigurationSource> {
        self.base_type_source
    }

    pub fn defining_navigation(&self) -> Option<&DefiningNavigation> {
        self.defining_navigation.as_ref()
    }

    /// Whether this type is identified by its owner and navigation.
    pub fn is_weak(&self) -> bool {
        self.defining_navigation.is_some()
    }

    /// Properties declared on this type, in declaration order.
    pub fn declared_properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn declared_keys(&self) -> &[KeyId] {
        &self.keys
    }

    /// The primary key declared on this type. Derived types share their root's key.
    pub fn declared_primary_key(&self) -> Option<KeyId> {
        self.primary_key
    }

    pub fn primary_key_source(&self) -> Option<ConfigurationSource> {
        self.primary_key_source
    }

    pub fn is_keyless(&self) -> bool {
        self.keyless_source.is_some()
    }

    pub fn keyless_source(&self) -> Option<ConfigurationSource> {
        self.keyless_source
    }

    /// Foreign keys for which this type is the dependent.
    pub fn declared_foreign_keys(&self) -> &[ForeignKeyId] {
        &self.foreign_keys
    }

    /// Foreign keys for which this type is the principal.
    pub fn referencing_foreign_keys(&self) -> &[ForeignKeyId] {
        &self.referencing_foreign_keys
    }

    /// Ignored member names with the source that ignored them.
    pub fn ignored_members(&self) -> &BTreeMap<String, ConfigurationSource> {
        &self.ignored_members
    }

    pub fn is_member_ignored(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_members.get(name).copied()
    }

    pub fn constructor_binding(&self) -> Option<&ConstructorBinding> {
        self.constructor_binding.as_ref()
    }
}
