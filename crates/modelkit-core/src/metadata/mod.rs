//! The mutable metadata graph.
//!
//! `Model` exclusively owns every entity type, property, key and foreign key. Each kind
//! lives in its own [`Arena`]; all cross-entity edges (base type, navigation targets,
//! foreign key principal, defining navigation owner) are handles resolved by lookup.
//!
//! Mutators here are raw. They keep the graph's own indexes consistent but raise no
//! events and apply no precedence rules beyond what the caller passes in.

mod annotations;
mod entity_type;
mod foreign_key;
mod key;
mod property;

pub use annotations::{ConstructorBinding, ParameterBinding, TypeMapping};
pub use entity_type::{DefiningNavigation, EntityType};
pub use foreign_key::{ForeignKey, Navigation, NavigationEnd, NavigationRef, NavigationView};
pub use key::Key;
pub use property::{Property, ValueGenerated};

use crate::arena::Arena;
use crate::source::ConfigurationSource;
use std::collections::{BTreeMap, BTreeSet};

crate::arena_id!(
    /// Handle to an [`EntityType`].
    EntityTypeId,
    "entity"
);
crate::arena_id!(
    /// Handle to a [`Property`].
    PropertyId,
    "property"
);
crate::arena_id!(
    /// Handle to a [`Key`].
    KeyId,
    "key"
);
crate::arena_id!(
    /// Handle to a [`ForeignKey`].
    ForeignKeyId,
    "fk"
);

/// The persistence model under construction.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entity_types: Arena<EntityTypeId, EntityType>,
    properties: Arena<PropertyId, Property>,
    keys: Arena<KeyId, Key>,
    foreign_keys: Arena<ForeignKeyId, ForeignKey>,
    by_name: BTreeMap<String, EntityTypeId>,
    weak_by_type: BTreeMap<String, BTreeSet<EntityTypeId>>,
    ignored_types: BTreeMap<String, ConfigurationSource>,
    owned_types: BTreeMap<String, ConfigurationSource>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Entity types ====================

    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entity_types.get(id)
    }

    pub fn contains_entity_type(&self, id: EntityTypeId) -> bool {
        self.entity_types.contains(id)
    }

    /// Live entity types in creation order.
    pub fn entity_types(&self) -> impl Iterator<Item = (EntityTypeId, &EntityType)> + '_ {
        self.entity_types.iter()
    }

    pub fn entity_type_ids(&self) -> Vec<EntityTypeId> {
        self.entity_types.ids()
    }

    pub fn entity_type_count(&self) -> usize {
        self.entity_types.len()
    }

    /// Find an entity type by its model name.
    pub fn find_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a live entity type, or `"<removed>"`.
    pub fn entity_type_name(&self, id: EntityTypeId) -> &str {
        self.entity_types.get(id).map_or("<removed>", EntityType::name)
    }

    /// Weak instances sharing a runtime type, in creation order.
    pub fn weak_entity_types(&self, runtime_type: &str) -> Vec<EntityTypeId> {
        self.weak_by_type
            .get(runtime_type)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any weak instance of `runtime_type` exists.
    pub fn has_weak_entity_types(&self, runtime_type: &str) -> bool {
        self.weak_by_type
            .get(runtime_type)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// The weak instance owned through `owner.navigation`, if any.
    pub fn find_weak_entity_type(
        &self,
        runtime_type: &str,
        owner: EntityTypeId,
        navigation: &str,
    ) -> Option<EntityTypeId> {
        self.weak_entity_types(runtime_type).into_iter().find(|id| {
            self.entity_type(*id)
                .and_then(EntityType::defining_navigation)
                .is_some_and(|d| d.owner == owner && d.navigation == navigation)
        })
    }

    /// Add a non-weak entity type. Returns `None` if the name is taken.
    pub fn add_entity_type(
        &mut self,
        name: &str,
        runtime_type: Option<&str>,
        source: ConfigurationSource,
    ) -> Option<EntityTypeId> {
        if self.by_name.contains_key(name) {
            return None;
        }
        let entity = EntityType::new(name.to_string(), runtime_type.map(str::to_string), source);
        let id = self.entity_types.insert(entity);
        self.by_name.insert(name.to_string(), id);
        tracing::trace!(entity_type = name, %id, "entity type added to graph");
        Some(id)
    }

    /// Add a weak entity type identified by `owner.navigation`. Returns `None` if the
    /// owner is gone or that weak instance already exists.
    pub fn add_weak_entity_type(
        &mut self,
        runtime_type: &str,
        owner: EntityTypeId,
        navigation: &str,
        source: ConfigurationSource,
    ) -> Option<EntityTypeId> {
        let owner_name = self.entity_type(owner)?.name().to_string();
        let name = format!("{}.{}#{}", owner_name, navigation, runtime_type);
        let id = self.add_entity_type(&name, Some(runtime_type), source)?;
        if let Some(entity) = self.entity_types.get_mut(id) {
            entity.defining_navigation = Some(DefiningNavigation {
                owner,
                navigation: navigation.to_string(),
            });
        }
        self.weak_by_type
            .entry(runtime_type.to_string())
            .or_default()
            .insert(id);
        Some(id)
    }

    /// Remove an entity type together with its declared members and every foreign key
    /// that touches it. Derived types lose their base type.
    pub fn remove_entity_type(&mut self, id: EntityTypeId) -> Option<EntityType> {
        let entity = self.entity_types.get(id)?;
        let fks: Vec<ForeignKeyId> = entity
            .foreign_keys
            .iter()
            .chain(entity.referencing_foreign_keys.iter())
            .copied()
            .collect();
        for fk in fks {
            self.remove_foreign_key(fk);
        }
        for derived in self.directly_derived_types(id) {
            self.set_base_type(derived, None, None);
        }
        let entity = self.entity_types.remove(id)?;
        for key in &entity.keys {
            self.keys.remove(*key);
        }
        for property in &entity.properties {
            self.properties.remove(*property);
        }
        for (_, fk) in self.foreign_keys.iter_mut() {
            if fk.properties.iter().any(|p| entity.properties.contains(p)) {
                fk.set_properties(Vec::new(), None);
            }
        }
        self.by_name.remove(&entity.name);
        if let Some(runtime_type) = entity.runtime_type.as_deref() {
            if let Some(weak) = self.weak_by_type.get_mut(runtime_type) {
                weak.remove(&id);
                if weak.is_empty() {
                    self.weak_by_type.remove(runtime_type);
                }
            }
        }
        tracing::trace!(entity_type = %entity.name, %id, "entity type removed from graph");
        Some(entity)
    }

    pub fn update_entity_type_source(&mut self, id: EntityTypeId, source: ConfigurationSource) {
        if let Some(entity) = self.entity_types.get_mut(id) {
            entity.source = source.max_with(Some(entity.source));
        }
    }

    /// Point `id` at a new base type (or none).
    pub fn set_base_type(
        &mut self,
        id: EntityTypeId,
        base: Option<EntityTypeId>,
        source: Option<ConfigurationSource>,
    ) -> bool {
        let Some(entity) = self.entity_types.get_mut(id) else {
            return false;
        };
        entity.base_type = base;
        entity.base_type_source = source;
        true
    }

    /// Base types of `id`, nearest first.
    pub fn base_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = self.entity_type(id).and_then(EntityType::base_type);
        while let Some(base) = current {
            if !seen.insert(base) {
                break;
            }
            chain.push(base);
            current = self.entity_type(base).and_then(EntityType::base_type);
        }
        chain
    }

    /// The top of `id`'s hierarchy.
    pub fn root_type(&self, id: EntityTypeId) -> EntityTypeId {
        self.base_types(id).last().copied().unwrap_or(id)
    }

    /// Whether `id` is `ancestor` or one of its descendants.
    pub fn is_same_or_derived(&self, id: EntityTypeId, ancestor: EntityTypeId) -> bool {
        id == ancestor || self.base_types(id).contains(&ancestor)
    }

    pub fn directly_derived_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.entity_types
            .iter()
            .filter(|(_, e)| e.base_type == Some(id))
            .map(|(derived, _)| derived)
            .collect()
    }

    /// All descendants of `id`, breadth first.
    pub fn derived_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut result = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for derived in self.directly_derived_types(current) {
                if derived != id && !result.contains(&derived) {
                    result.push(derived);
                    frontier.insert(0, derived);
                }
            }
        }
        result
    }

    // ==================== Ignored / owned type names ====================

    pub fn ignored_type_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_types.get(name).copied()
    }

    pub fn set_ignored_type(&mut self, name: &str, source: Option<ConfigurationSource>) {
        match source {
            Some(source) => {
                let merged = source.max_with(self.ignored_types.get(name).copied());
                self.ignored_types.insert(name.to_string(), merged);
            }
            None => {
                self.ignored_types.remove(name);
            }
        }
    }

    pub fn owned_type_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.owned_types.get(name).copied()
    }

    pub fn set_owned_type(&mut self, name: &str, source: Option<ConfigurationSource>) {
        match source {
            Some(source) => {
                let merged = source.max_with(self.owned_types.get(name).copied());
                self.owned_types.insert(name.to_string(), merged);
            }
            None => {
                self.owned_types.remove(name);
            }
        }
    }

    /// Whether the entity type is owned: weak, the dependent of an ownership, or of a
    /// runtime type marked owned.
    pub fn is_owned(&self, id: EntityTypeId) -> bool {
        let Some(entity) = self.entity_type(id) else {
            return false;
        };
        entity.is_weak()
            || self.find_ownership(id).is_some()
            || entity
                .runtime_type()
                .is_some_and(|t| self.owned_types.contains_key(t))
    }

    /// The ownership foreign key for which `id` is the dependent.
    pub fn find_ownership(&self, id: EntityTypeId) -> Option<ForeignKeyId> {
        self.entity_type(id)?
            .foreign_keys
            .iter()
            .copied()
            .find(|fk| self.foreign_key(*fk).is_some_and(ForeignKey::is_ownership))
    }

    // ==================== Ignored members ====================

    pub fn set_ignored_member(
        &mut self,
        id: EntityTypeId,
        name: &str,
        source: Option<ConfigurationSource>,
    ) -> bool {
        let Some(entity) = self.entity_types.get_mut(id) else {
            return false;
        };
        match source {
            Some(source) => {
                let merged = source.max_with(entity.ignored_members.get(name).copied());
                entity.ignored_members.insert(name.to_string(), merged);
            }
            None => {
                entity.ignored_members.remove(name);
            }
        }
        true
    }

    /// Whether `name` is ignored on `id` or any of its base types.
    pub fn is_member_ignored_in_hierarchy(&self, id: EntityTypeId, name: &str) -> bool {
        std::iter::once(id)
            .chain(self.base_types(id))
            .filter_map(|e| self.entity_type(e))
            .any(|e| e.ignored_members.contains_key(name))
    }

    // ==================== Properties ====================

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(id)
    }

    pub fn contains_property(&self, id: PropertyId) -> bool {
        self.properties.contains(id)
    }

    pub fn property_name(&self, id: PropertyId) -> &str {
        self.properties.get(id).map_or("<removed>", Property::name)
    }

    pub fn add_property(&mut self, property: Property) -> Option<PropertyId> {
        let declaring = property.declaring_type;
        if !self.entity_types.contains(declaring) {
            return None;
        }
        let id = self.properties.insert(property);
        if let Some(entity) = self.entity_types.get_mut(declaring) {
            entity.properties.push(id);
        }
        Some(id)
    }

    /// Remove a property, dropping every key that contains it and clearing the
    /// property list of every foreign key that uses it.
    pub fn remove_property(&mut self, id: PropertyId) -> Option<Property> {
        let declaring = self.properties.get(id)?.declaring_type;
        let keys: Vec<KeyId> = self
            .keys
            .iter()
            .filter(|(_, k)| k.properties.contains(&id))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.remove_key(key);
        }
        for (_, fk) in self.foreign_keys.iter_mut() {
            if fk.properties.contains(&id) {
                fk.set_properties(Vec::new(), None);
            }
        }
        if let Some(entity) = self.entity_types.get_mut(declaring) {
            entity.properties.retain(|p| *p != id);
        }
        self.properties.remove(id)
    }

    pub fn find_declared_property(&self, id: EntityTypeId, name: &str) -> Option<PropertyId> {
        self.entity_type(id)?
            .properties
            .iter()
            .copied()
            .find(|p| self.property(*p).is_some_and(|p| p.name == name))
    }

    /// Find a property on `id` or any of its base types.
    pub fn find_property(&self, id: EntityTypeId, name: &str) -> Option<PropertyId> {
        std::iter::once(id)
            .chain(self.base_types(id))
            .find_map(|e| self.find_declared_property(e, name))
    }

    /// All properties visible on `id`, root type's first.
    pub fn properties(&self, id: EntityTypeId) -> Vec<PropertyId> {
        let mut hierarchy = self.base_types(id);
        hierarchy.reverse();
        hierarchy.push(id);
        hierarchy
            .into_iter()
            .filter_map(|e| self.entity_type(e))
            .flat_map(|e| e.properties.iter().copied())
            .collect()
    }

    // ==================== Keys ====================

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id)
    }

    /// A key declared on `id` over exactly `properties`, in order.
    pub fn find_declared_key(&self, id: EntityTypeId, properties: &[PropertyId]) -> Option<KeyId> {
        self.entity_type(id)?
            .keys
            .iter()
            .copied()
            .find(|k| self.key(*k).is_some_and(|k| k.properties == properties))
    }

    pub fn add_key(
        &mut self,
        id: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Option<KeyId> {
        if properties.is_empty() || !properties.iter().all(|p| self.properties.contains(*p)) {
            return None;
        }
        self.entity_types.get(id)?;
        let key = self.keys.insert(Key {
            declaring_type: id,
            properties,
            source,
        });
        if let Some(entity) = self.entity_types.get_mut(id) {
            entity.keys.push(key);
        }
        Some(key)
    }

    /// Remove a key; clears the primary key if it was this one.
    pub fn remove_key(&mut self, id: KeyId) -> Option<Key> {
        let key = self.keys.remove(id)?;
        if let Some(entity) = self.entity_types.get_mut(key.declaring_type) {
            entity.keys.retain(|k| *k != id);
            if entity.primary_key == Some(id) {
                entity.primary_key = None;
                entity.primary_key_source = None;
            }
        }
        Some(key)
    }

    pub fn set_primary_key(
        &mut self,
        id: EntityTypeId,
        key: Option<KeyId>,
        source: Option<ConfigurationSource>,
    ) -> bool {
        let Some(entity) = self.entity_types.get_mut(id) else {
            return false;
        };
        entity.primary_key = key;
        entity.primary_key_source = source;
        true
    }

    /// The primary key of `id`'s hierarchy, declared on the root type.
    pub fn find_primary_key(&self, id: EntityTypeId) -> Option<KeyId> {
        self.entity_type(self.root_type(id))?.primary_key
    }

    /// Names of the primary key's properties, in key order.
    pub fn primary_key_names(&self, id: EntityTypeId) -> Vec<String> {
        self.find_primary_key(id)
            .and_then(|k| self.key(k))
            .map(|k| {
                k.properties
                    .iter()
                    .map(|p| self.property_name(*p).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_keyless(&mut self, id: EntityTypeId, source: Option<ConfigurationSource>) -> bool {
        let Some(entity) = self.entity_types.get_mut(id) else {
            return false;
        };
        entity.keyless_source = source;
        true
    }

    // ==================== Foreign keys ====================

    pub fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKey> {
        self.foreign_keys.get(id)
    }

    pub fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Option<&mut ForeignKey> {
        self.foreign_keys.get_mut(id)
    }

    pub fn contains_foreign_key(&self, id: ForeignKeyId) -> bool {
        self.foreign_keys.contains(id)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (ForeignKeyId, &ForeignKey)> + '_ {
        self.foreign_keys.iter()
    }

    pub fn foreign_key_ids(&self) -> Vec<ForeignKeyId> {
        self.foreign_keys.ids()
    }

    /// Add a foreign key. Both ends must be live.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> Option<ForeignKeyId> {
        let (dependent, principal) = (foreign_key.dependent, foreign_key.principal);
        if !self.entity_types.contains(dependent) || !self.entity_types.contains(principal) {
            return None;
        }
        let id = self.foreign_keys.insert(foreign_key);
        self.link_foreign_key(id, dependent, principal);
        Some(id)
    }

    pub fn remove_foreign_key(&mut self, id: ForeignKeyId) -> Option<ForeignKey> {
        let fk = self.foreign_keys.remove(id)?;
        self.unlink_foreign_key(id, fk.dependent, fk.principal);
        Some(fk)
    }

    /// Swap a foreign key's dependent and principal.
    pub fn invert_foreign_key(&mut self, id: ForeignKeyId) -> bool {
        let Some(fk) = self.foreign_keys.get_mut(id) else {
            return false;
        };
        let (dependent, principal) = (fk.dependent, fk.principal);
        fk.invert();
        self.unlink_foreign_key(id, dependent, principal);
        self.link_foreign_key(id, principal, dependent);
        true
    }

    fn link_foreign_key(&mut self, id: ForeignKeyId, dependent: EntityTypeId, principal: EntityTypeId) {
        if let Some(entity) = self.entity_types.get_mut(dependent) {
            entity.foreign_keys.push(id);
        }
        if let Some(entity) = self.entity_types.get_mut(principal) {
            entity.referencing_foreign_keys.push(id);
        }
    }

    fn unlink_foreign_key(&mut self, id: ForeignKeyId, dependent: EntityTypeId, principal: EntityTypeId) {
        if let Some(entity) = self.entity_types.get_mut(dependent) {
            entity.foreign_keys.retain(|fk| *fk != id);
        }
        if let Some(entity) = self.entity_types.get_mut(principal) {
            entity.referencing_foreign_keys.retain(|fk| *fk != id);
        }
    }

    // ==================== Navigations ====================

    pub fn navigation(&self, reference: NavigationRef) -> Option<NavigationView<'_>> {
        NavigationView::new(self, reference)
    }

    /// Navigations declared on `id`, in foreign key order.
    pub fn declared_navigations(&self, id: EntityTypeId) -> Vec<NavigationRef> {
        let Some(entity) = self.entity_type(id) else {
            return Vec::new();
        };
        let outgoing = entity.foreign_keys.iter().map(|fk| NavigationRef {
            foreign_key: *fk,
            end: NavigationEnd::DependentToPrincipal,
        });
        let incoming = entity.referencing_foreign_keys.iter().map(|fk| NavigationRef {
            foreign_key: *fk,
            end: NavigationEnd::PrincipalToDependent,
        });
        let mut navigations: Vec<NavigationRef> = outgoing
            .chain(incoming)
            .filter(|r| self.navigation(*r).is_some())
            .collect();
        navigations.sort();
        navigations.dedup();
        navigations
    }

    pub fn find_declared_navigation(&self, id: EntityTypeId, name: &str) -> Option<NavigationRef> {
        self.declared_navigations(id)
            .into_iter()
            .find(|r| self.navigation(*r).is_some_and(|n| n.name() == name))
    }

    /// Find a navigation on `id` or any of its base types.
    pub fn find_navigation(&self, id: EntityTypeId, name: &str) -> Option<NavigationRef> {
        std::iter::once(id)
            .chain(self.base_types(id))
            .find_map(|e| self.find_declared_navigation(e, name))
    }

    /// `Type.Navigation` for messages.
    pub fn navigation_path(&self, reference: NavigationRef) -> String {
        match self.navigation(reference) {
            Some(nav) => format!("{}.{}", self.entity_type_name(nav.declaring_type()), nav.name()),
            None => "<removed>".to_string(),
        }
    }

    /// The entity type declaring a property or navigation named `name`, searching
    /// `id` and its base types.
    pub fn find_member_declaration(&self, id: EntityTypeId, name: &str) -> Option<EntityTypeId> {
        if let Some(property) = self.find_property(id, name) {
            return self.property(property).map(Property::declaring_type);
        }
        let reference = self.find_navigation(id, name)?;
        self.navigation(reference).map(|n| n.declaring_type())
    }

    /// Entity types that `id`'s declared navigations point to.
    pub fn navigation_neighbors(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.declared_navigations(id)
            .into_iter()
            .filter_map(|r| self.navigation(r).map(|n| n.target_type()))
            .collect()
    }

    // ==================== Annotations ====================

    pub fn set_constructor_binding(
        &mut self,
        id: EntityTypeId,
        binding: Option<ConstructorBinding>,
    ) -> bool {
        let Some(entity) = self.entity_types.get_mut(id) else {
            return false;
        };
        entity.constructor_binding = binding;
        true
    }
}
