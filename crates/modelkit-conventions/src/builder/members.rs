//! Properties, keys and ignored members.

use super::ModelBuilder;
use crate::dispatcher::ModelEvent;
use modelkit_core::{
    ConfigurationSource, EntityTypeId, KeyId, MemberKind, MemberType, Property, PropertyId,
    Result, ScalarKind, ValueGenerated,
};

/// What a runtime member contributes to a new property.
struct MemberShape {
    kind: MemberKind,
    scalar: Option<ScalarKind>,
    optional: bool,
    type_name: String,
}

impl ModelBuilder {
    // ==================== Properties ====================

    /// Add or find the property `name` backed by the runtime member of that name.
    ///
    /// Returns `Ok(None)` when the member is ignored with an equal or stronger source,
    /// when it is a navigation, or when the runtime type has no such member.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Option<PropertyId>> {
        if !self.model.contains_entity_type(entity) {
            return Ok(None);
        }
        let shape = self.member_shape(entity, name);

        if let Some(existing) = self.model.find_property(entity, name) {
            if let Some(property) = self.model.property_mut(existing) {
                property.update_source(source);
                if property.is_shadow() {
                    if let Some(shape) = &shape {
                        property.attach_member(shape.kind, shape.scalar, shape.optional);
                    }
                }
            }
            return Ok(Some(existing));
        }

        if !self.clear_member_ignore(entity, name, source) {
            return Ok(None);
        }
        if self.model.find_navigation(entity, name).is_some() {
            return Ok(None);
        }
        let Some(shape) = shape else {
            return Ok(None);
        };

        self.drop_derived_properties(entity, name)?;
        let property = Property::new(name, entity, shape.scalar, shape.optional, source)
            .with_member(shape.kind);
        let property = if shape.scalar.is_none() {
            property.with_runtime_type_name(shape.type_name)
        } else {
            property
        };
        let Some(id) = self.model.add_property(property) else {
            return Ok(None);
        };
        tracing::trace!(
            entity_type = self.model.entity_type_name(entity),
            property = name,
            %id,
            "property added"
        );
        self.raise_property_added(id)
    }

    /// Add or find a property with no backing member. If the runtime type does have a
    /// member called `name`, the property is backed by it instead.
    pub fn shadow_property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        scalar: ScalarKind,
        optional: bool,
        source: ConfigurationSource,
    ) -> Result<Option<PropertyId>> {
        if !self.model.contains_entity_type(entity) {
            return Ok(None);
        }
        if let Some(existing) = self.model.find_property(entity, name) {
            if let Some(property) = self.model.property_mut(existing) {
                property.update_source(source);
            }
            return Ok(Some(existing));
        }
        if self.member_shape(entity, name).is_some() {
            return self.property(entity, name, source);
        }
        if !self.clear_member_ignore(entity, name, source) {
            return Ok(None);
        }
        if self.model.find_navigation(entity, name).is_some() {
            return Ok(None);
        }

        self.drop_derived_properties(entity, name)?;
        let property = Property::new(name, entity, Some(scalar), optional, source);
        let Some(id) = self.model.add_property(property) else {
            return Ok(None);
        };
        tracing::trace!(
            entity_type = self.model.entity_type_name(entity),
            property = name,
            %id,
            "shadow property added"
        );
        self.raise_property_added(id)
    }

    /// Remove a property unless it was configured with a stronger source.
    pub fn remove_property(&mut self, property: PropertyId, source: ConfigurationSource) -> Result<bool> {
        let Some(p) = self.model.property(property) else {
            return Ok(false);
        };
        if !source.overrides(Some(p.source())) {
            return Ok(false);
        }
        self.remove_property_unchecked(property)?;
        Ok(true)
    }

    /// Remove a property; raises a primary key change when it was part of the key.
    pub(crate) fn remove_property_unchecked(&mut self, property: PropertyId) -> Result<()> {
        let Some(declaring) = self.model.property(property).map(Property::declaring_type) else {
            return Ok(());
        };
        let previous = self
            .model
            .entity_type(declaring)
            .and_then(|e| e.declared_primary_key());
        let previous_properties = previous
            .and_then(|k| self.model.key(k))
            .map(|k| k.properties().to_vec())
            .unwrap_or_default();
        self.model.remove_property(property);
        let current = self
            .model
            .entity_type(declaring)
            .and_then(|e| e.declared_primary_key());
        if previous.is_some() && current != previous {
            self.raise_primary_key_changed(declaring, previous, previous_properties)?;
        }
        Ok(())
    }

    // ==================== Ignored members ====================

    /// Ignore the member `name` on `entity`, removing the property or navigation
    /// declared with that name on it and its derived types.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn ignore_member(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<bool> {
        if !self.model.contains_entity_type(entity) {
            return Ok(false);
        }
        if let Some(property) = self.model.find_declared_property(entity, name) {
            if !self
                .model
                .property(property)
                .is_some_and(|p| source.overrides(Some(p.source())))
            {
                return Ok(false);
            }
        }
        if let Some(navigation) = self.model.find_declared_navigation(entity, name) {
            if !self
                .model
                .navigation(navigation)
                .is_some_and(|n| source.overrides(Some(n.source())))
            {
                return Ok(false);
            }
        }

        self.delay_conventions(|builder| {
            builder.model.set_ignored_member(entity, name, Some(source));
            let mut affected = vec![entity];
            affected.extend(builder.model.derived_types(entity));
            for id in affected {
                if let Some(property) = builder.model.find_declared_property(id, name) {
                    builder.remove_property_unchecked(property)?;
                }
                if let Some(navigation) = builder.model.find_declared_navigation(id, name) {
                    builder.remove_navigation(navigation)?;
                }
            }
            builder.raise(ModelEvent::EntityTypeMemberIgnored {
                entity,
                name: name.to_string(),
            })?;
            Ok(true)
        })
    }

    /// Forget that `name` was ignored on `entity`. Discovery does not run again until
    /// [`rediscover`](Self::rediscover) is called.
    pub fn unignore_member(&mut self, entity: EntityTypeId, name: &str) -> bool {
        let ignored = self
            .model
            .entity_type(entity)
            .and_then(|e| e.is_member_ignored(name))
            .is_some();
        ignored && self.model.set_ignored_member(entity, name, None)
    }

    // ==================== Keys ====================

    /// Set the primary key of `entity` by property names.
    pub fn primary_key(
        &mut self,
        entity: EntityTypeId,
        names: &[&str],
        source: ConfigurationSource,
    ) -> Result<Option<KeyId>> {
        let properties: Option<Vec<PropertyId>> = names
            .iter()
            .map(|name| self.model.find_property(entity, name))
            .collect();
        match properties {
            Some(properties) => self.set_primary_key(entity, properties, source),
            None => Ok(None),
        }
    }

    /// Set the primary key of `entity`. Only root types carry keys; key properties
    /// become required.
    pub fn set_primary_key(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Result<Option<KeyId>> {
        let Some(et) = self.model.entity_type(entity) else {
            return Ok(None);
        };
        if et.base_type().is_some() || properties.is_empty() {
            return Ok(None);
        }
        let previous_source = et.primary_key_source();
        if !source.overrides(previous_source) {
            return Ok(None);
        }
        let previous = et.declared_primary_key();
        let previous_properties = previous
            .and_then(|k| self.model.key(k))
            .map(|k| k.properties().to_vec())
            .unwrap_or_default();
        let merged = source.max_with(previous_source);

        if previous.is_some() && previous_properties == properties {
            self.model.set_primary_key(entity, previous, Some(merged));
            return Ok(previous);
        }

        let key = match self.model.find_declared_key(entity, &properties) {
            Some(key) => key,
            None => match self.model.add_key(entity, properties.clone(), source) {
                Some(key) => key,
                None => return Ok(None),
            },
        };
        if let Some(previous) = previous {
            self.model.remove_key(previous);
        }
        self.model.set_primary_key(entity, Some(key), Some(merged));
        self.model.set_keyless(entity, None);
        for property in &properties {
            if let Some(p) = self.model.property_mut(*property) {
                p.set_nullable(false, source);
            }
        }
        tracing::debug!(
            entity_type = self.model.entity_type_name(entity),
            key = ?self.model.primary_key_names(entity),
            %source,
            "primary key set"
        );
        self.raise_primary_key_changed(entity, previous, previous_properties)?;
        Ok(self.model.key(key).is_some().then_some(key))
    }

    /// Configure `entity` as keyless, dropping its primary key.
    pub fn has_no_key(&mut self, entity: EntityTypeId, source: ConfigurationSource) -> Result<bool> {
        let Some(et) = self.model.entity_type(entity) else {
            return Ok(false);
        };
        if !source.overrides(et.primary_key_source()) || !source.overrides(et.keyless_source()) {
            return Ok(false);
        }
        let previous = et.declared_primary_key();
        let previous_properties = previous
            .and_then(|k| self.model.key(k))
            .map(|k| k.properties().to_vec())
            .unwrap_or_default();
        if let Some(previous) = previous {
            self.model.remove_key(previous);
        }
        self.model.set_keyless(entity, Some(source));
        if previous.is_some() {
            self.raise_primary_key_changed(entity, previous, previous_properties)?;
        }
        Ok(true)
    }

    // ==================== Property facets ====================

    pub fn is_property_required(
        &mut self,
        property: PropertyId,
        required: bool,
        source: ConfigurationSource,
    ) -> bool {
        self.model
            .property_mut(property)
            .is_some_and(|p| p.set_nullable(!required, source))
    }

    pub fn has_max_length(
        &mut self,
        property: PropertyId,
        length: Option<u32>,
        source: ConfigurationSource,
    ) -> bool {
        self.model
            .property_mut(property)
            .is_some_and(|p| p.set_max_length(length, source))
    }

    pub fn has_column_type(
        &mut self,
        property: PropertyId,
        store_type: Option<&str>,
        source: ConfigurationSource,
    ) -> bool {
        self.model
            .property_mut(property)
            .is_some_and(|p| p.set_column_type(store_type.map(str::to_string), source))
    }

    pub fn value_generated(
        &mut self,
        property: PropertyId,
        value: ValueGenerated,
        source: ConfigurationSource,
    ) -> bool {
        self.model
            .property_mut(property)
            .is_some_and(|p| p.set_value_generated(value, source))
    }

    // ==================== Internals ====================

    fn member_shape(&self, entity: EntityTypeId, name: &str) -> Option<MemberShape> {
        let runtime_type = self.model.entity_type(entity)?.runtime_type()?;
        let found = self.catalog.find_member(runtime_type, name)?;
        let member = found.member();
        if member.is_static {
            return None;
        }
        match &member.ty {
            MemberType::Scalar { scalar, optional } => Some(MemberShape {
                kind: member.kind,
                scalar: Some(*scalar),
                optional: *optional,
                type_name: scalar.name().to_string(),
            }),
            MemberType::Other { name } => Some(MemberShape {
                kind: member.kind,
                scalar: None,
                optional: false,
                type_name: name.clone(),
            }),
            MemberType::Reference { .. } | MemberType::Collection { .. } => None,
        }
    }

    /// Whether `name` may be mapped on `entity` with `source`; lifts weaker ignores.
    pub(crate) fn clear_member_ignore(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> bool {
        let mut hierarchy = vec![entity];
        hierarchy.extend(self.model.base_types(entity));
        for id in hierarchy {
            let Some(ignored) = self.model.entity_type(id).and_then(|e| e.is_member_ignored(name))
            else {
                continue;
            };
            if ignored.overrides(Some(source)) {
                return false;
            }
            self.model.set_ignored_member(id, name, None);
        }
        true
    }

    /// Remove properties named `name` declared on types derived from `entity`.
    fn drop_derived_properties(&mut self, entity: EntityTypeId, name: &str) -> Result<()> {
        for derived in self.model.derived_types(entity) {
            if let Some(property) = self.model.find_declared_property(derived, name) {
                self.remove_property_unchecked(property)?;
            }
        }
        Ok(())
    }
}
