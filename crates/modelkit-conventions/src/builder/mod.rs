//! The event-raising model builder.
//!
//! Every structural edit made by user code or by a convention goes through
//! [`ModelBuilder`]. Each mutator checks configuration-source precedence, applies the
//! change to the [`Model`] and raises the matching event. A rejected change is not an
//! error: mutators return `Ok(None)` or `Ok(false)` and the caller decides what to do.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = ModelBuilder::new(Arc::new(catalog));
//! builder.entity("Blog", ConfigurationSource::Explicit)?;
//! let finalized = builder.finalize()?;
//! ```

mod detached;
mod events;
mod members;
mod relationship;

pub use detached::{DetachedEntityType, DetachedProperty, DetachedRelationship};

use crate::config::ConventionConfig;
use crate::conventions::default_convention_set;
use crate::diagnostics::Diagnostics;
use crate::dispatcher::{ConventionDispatcher, DispatchStats, ModelEvent, RemovedEntityType};
use crate::services::ConventionDependencies;
use crate::set::ConventionSet;
use modelkit_core::{
    ConfigurationSource, ConstructorBinding, EntityType, EntityTypeId, Error, Model,
    ModelSnapshot, NavigationEnd, PropertyId, Result, TypeCatalog, TypeMapping,
};
use std::rc::Rc;
use std::sync::Arc;

/// Mutable model plus the machinery that keeps conventions informed.
pub struct ModelBuilder {
    pub(crate) model: Model,
    pub(crate) dispatcher: ConventionDispatcher,
    pub(crate) conventions: Rc<ConventionSet>,
    pub(crate) catalog: Arc<TypeCatalog>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) config: ConventionConfig,
}

impl ModelBuilder {
    /// A builder with the default configuration and convention set.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self::with_config(catalog, ConventionConfig::default())
    }

    /// A builder with the default convention set built for `config`.
    pub fn with_config(catalog: Arc<TypeCatalog>, config: ConventionConfig) -> Self {
        let dependencies = ConventionDependencies::new(Arc::clone(&catalog), &config);
        let conventions = Rc::new(default_convention_set(&dependencies));
        Self::with_conventions(catalog, conventions, config)
    }

    /// A builder driven by a custom convention set.
    pub fn with_conventions(
        catalog: Arc<TypeCatalog>,
        conventions: Rc<ConventionSet>,
        config: ConventionConfig,
    ) -> Self {
        Self {
            model: Model::new(),
            dispatcher: ConventionDispatcher::new(),
            conventions,
            catalog,
            diagnostics: Diagnostics::new(),
            config,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ConventionConfig {
        &self.config
    }

    pub fn conventions(&self) -> &ConventionSet {
        &self.conventions
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Events waiting for the outermost delay scope to close.
    pub fn pending_events(&self) -> usize {
        self.dispatcher.pending()
    }

    // ==================== Entity types ====================

    /// Add or find the entity type `name`.
    ///
    /// The runtime type is looked up in the catalog; names the catalog does not know
    /// become shadow entity types. Rejected when the name is ignored with an equal
    /// or stronger source, or when the type is configured as owned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn entity(&mut self, name: &str, source: ConfigurationSource) -> Result<Option<EntityTypeId>> {
        if let Some(existing) = self.model.find_entity_type(name) {
            self.model.update_entity_type_source(existing, source);
            return Ok(Some(existing));
        }

        if let Some(ignored) = self.model.ignored_type_source(name) {
            if ignored.overrides(Some(source)) {
                tracing::trace!(entity_type = name, %ignored, "entity type is ignored");
                return Ok(None);
            }
            self.model.set_ignored_type(name, None);
        }

        if let Some(owned) = self.model.owned_type_source(name) {
            if owned == ConfigurationSource::Explicit && source == ConfigurationSource::Explicit {
                return Err(Error::ClashingNonOwnedEntityType {
                    name: name.to_string(),
                });
            }
            if !source.overrides_strictly(Some(owned)) {
                return Ok(None);
            }
            self.model.set_owned_type(name, None);
        }

        if self.model.has_weak_entity_types(name) {
            if source == ConfigurationSource::Explicit {
                return Err(Error::ClashingNonOwnedEntityType {
                    name: name.to_string(),
                });
            }
            return Ok(None);
        }

        let runtime_type = self.catalog.contains(name).then_some(name);
        let Some(id) = self.model.add_entity_type(name, runtime_type, source) else {
            return Ok(None);
        };
        tracing::debug!(entity_type = name, %id, shadow = runtime_type.is_none(), "entity type added");
        self.raise_entity_type_added(id)
    }

    /// Add or find the weak entity type for `runtime_type` owned through
    /// `owner.navigation`.
    pub fn owned_entity(
        &mut self,
        runtime_type: &str,
        owner: EntityTypeId,
        navigation: &str,
        source: ConfigurationSource,
    ) -> Result<Option<EntityTypeId>> {
        if let Some(existing) = self.model.find_weak_entity_type(runtime_type, owner, navigation) {
            self.model.update_entity_type_source(existing, source);
            return Ok(Some(existing));
        }
        let Some(id) = self
            .model
            .add_weak_entity_type(runtime_type, owner, navigation, source)
        else {
            return Ok(None);
        };
        tracing::debug!(
            entity_type = self.model.entity_type_name(id),
            %id,
            "weak entity type added"
        );
        self.raise_entity_type_added(id)
    }

    /// Mark the type `name` as owned. A regular entity type of that name is removed
    /// and every navigation that pointed at it becomes an ownership.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn owned(&mut self, name: &str, source: ConfigurationSource) -> Result<bool> {
        if self
            .model
            .ignored_type_source(name)
            .is_some_and(|ignored| ignored.overrides(Some(source)))
        {
            return Ok(false);
        }

        let Some(existing) = self.model.find_entity_type(name) else {
            self.model.set_owned_type(name, Some(source));
            return Ok(true);
        };
        if self.model.is_owned(existing) {
            self.model.set_owned_type(name, Some(source));
            return Ok(true);
        }

        let existing_source = self.entity_source(existing);
        if existing_source == ConfigurationSource::Explicit && source == ConfigurationSource::Explicit {
            return Err(Error::ClashingOwnedEntityType {
                name: name.to_string(),
            });
        }
        if !source.overrides(Some(existing_source)) {
            return Ok(false);
        }

        let incoming = self.incoming_navigations(existing);
        self.delay_conventions(|builder| {
            builder.model.set_owned_type(name, Some(source));
            builder.remove_entity_type_unchecked(existing)?;
            for (owner, navigation, collection) in incoming {
                if builder.model.contains_entity_type(owner) {
                    builder.owns(owner, &navigation, name, collection, source)?;
                }
            }
            Ok(true)
        })
    }

    /// Remove an entity type, its relationships and the weak types it owns. Derived
    /// types are re-parented to the removed type's base.
    pub fn remove_entity_type(&mut self, id: EntityTypeId, source: ConfigurationSource) -> Result<bool> {
        let Some(entity) = self.model.entity_type(id) else {
            return Ok(false);
        };
        if !source.overrides(Some(entity.source())) {
            return Ok(false);
        }
        self.remove_entity_type_unchecked(id)?;
        Ok(true)
    }

    /// Ignore the type `name` and remove any entity type using it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn ignore_entity_type(&mut self, name: &str, source: ConfigurationSource) -> Result<bool> {
        if let Some(existing) = self.model.find_entity_type(name) {
            if !source.overrides(Some(self.entity_source(existing))) {
                return Ok(false);
            }
        }
        self.model.set_ignored_type(name, Some(source));
        let mut doomed: Vec<EntityTypeId> = self.model.weak_entity_types(name);
        doomed.extend(self.model.find_entity_type(name));
        self.delay_conventions(|builder| {
            for id in doomed {
                if builder.model.contains_entity_type(id) {
                    builder.remove_entity_type_unchecked(id)?;
                }
            }
            Ok(true)
        })
    }

    /// Set or clear the base type of `entity`.
    ///
    /// Setting a base drops the entity's own keys and every declared member that the
    /// new base hierarchy already maps.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn has_base_type(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> Result<bool> {
        let Some(et) = self.model.entity_type(entity) else {
            return Ok(false);
        };
        let previous = et.base_type();
        if previous == base {
            let merged = source.max_with(et.base_type_source());
            self.model.set_base_type(entity, base, Some(merged));
            return Ok(true);
        }
        if !source.overrides(et.base_type_source()) {
            return Ok(false);
        }
        if let Some(base) = base {
            if !self.model.contains_entity_type(base) || self.model.is_same_or_derived(base, entity) {
                return Ok(false);
            }
            if et
                .primary_key_source()
                .is_some_and(|pk| !source.overrides(Some(pk)))
            {
                return Ok(false);
            }
        }

        self.delay_conventions(|builder| {
            if let Some(base) = base {
                builder.drop_own_keys(entity)?;
                builder.drop_members_mapped_by(entity, base)?;
            }
            builder.model.set_base_type(entity, base, Some(source));
            tracing::debug!(
                entity_type = builder.model.entity_type_name(entity),
                base = base.map(|b| builder.model.entity_type_name(b)),
                "base type changed"
            );
            builder.raise_base_type_changed(entity, previous)?;
            Ok(true)
        })
    }

    /// Record the constructor used to materialize `entity`.
    pub fn has_constructor_binding(
        &mut self,
        entity: EntityTypeId,
        binding: Option<ConstructorBinding>,
    ) -> bool {
        self.model.set_constructor_binding(entity, binding)
    }

    /// Record the store mapping resolved for `property`.
    pub fn has_type_mapping(&mut self, property: PropertyId, mapping: Option<TypeMapping>) -> bool {
        match self.model.property_mut(property) {
            Some(p) => {
                p.set_type_mapping(mapping);
                true
            }
            None => false,
        }
    }

    /// Run entity type discovery for `entity` again.
    pub fn rediscover(&mut self, entity: EntityTypeId) -> Result<Option<EntityTypeId>> {
        if !self.model.contains_entity_type(entity) {
            return Ok(None);
        }
        self.raise_entity_type_added(entity)
    }

    /// Run the model-built conventions and freeze the model.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn finalize(mut self) -> Result<FinalizedModel> {
        self.run_model_built()?;
        tracing::info!(
            entity_types = self.model.entity_type_count(),
            events = self.dispatcher.stats().events_dispatched,
            diagnostics = self.diagnostics.len(),
            "model finalized"
        );
        Ok(FinalizedModel {
            stats: self.dispatcher.stats(),
            model: self.model,
            diagnostics: self.diagnostics,
        })
    }

    // ==================== Internals ====================

    fn entity_source(&self, id: EntityTypeId) -> ConfigurationSource {
        self.model
            .entity_type(id)
            .map_or(ConfigurationSource::Convention, EntityType::source)
    }

    /// `(declaring type, navigation, is collection)` for every navigation pointing
    /// at `id` from another entity type.
    fn incoming_navigations(&self, id: EntityTypeId) -> Vec<(EntityTypeId, String, bool)> {
        let mut incoming = Vec::new();
        for (_, fk) in self.model.foreign_keys() {
            if fk.is_ownership() || fk.dependent() == fk.principal() {
                continue;
            }
            for end in [NavigationEnd::DependentToPrincipal, NavigationEnd::PrincipalToDependent] {
                let Some(navigation) = fk.navigation(end) else {
                    continue;
                };
                if fk.target_type(end) == id {
                    let collection = end == NavigationEnd::PrincipalToDependent && !fk.is_unique();
                    incoming.push((fk.declaring_type(end), navigation.name.clone(), collection));
                }
            }
        }
        incoming
    }

    /// Add a non-weak entity type without the ignored/owned checks of
    /// [`entity`](Self::entity).
    pub(crate) fn add_entity_type_unchecked(
        &mut self,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Option<EntityTypeId>> {
        let runtime_type = self.catalog.contains(name).then_some(name);
        let Some(id) = self.model.add_entity_type(name, runtime_type, source) else {
            return Ok(None);
        };
        self.raise_entity_type_added(id)
    }

    /// Remove without a precedence check.
    pub(crate) fn remove_entity_type_unchecked(&mut self, id: EntityTypeId) -> Result<()> {
        self.delay_conventions(|builder| {
            let Some(entity) = builder.model.entity_type(id) else {
                return Ok(());
            };
            let fks: Vec<_> = entity
                .declared_foreign_keys()
                .iter()
                .chain(entity.referencing_foreign_keys())
                .copied()
                .collect();
            let owned_weak: Vec<EntityTypeId> = builder
                .model
                .entity_types()
                .filter(|(_, e)| e.defining_navigation().is_some_and(|d| d.owner == id))
                .map(|(weak, _)| weak)
                .collect();
            let new_base = entity.base_type();
            let new_base_source = entity.base_type_source();

            for fk in fks {
                builder.remove_foreign_key_unchecked(fk)?;
            }
            for weak in owned_weak {
                builder.remove_entity_type_unchecked(weak)?;
            }
            for derived in builder.model.directly_derived_types(id) {
                builder.model.set_base_type(derived, new_base, new_base_source);
                builder.raise_base_type_changed(derived, Some(id))?;
            }

            let Some(removed) = builder.model.remove_entity_type(id) else {
                return Ok(());
            };
            tracing::debug!(entity_type = removed.name(), %id, "entity type removed");
            let event = RemovedEntityType {
                id,
                name: removed.name().to_string(),
                runtime_type: removed.runtime_type().map(str::to_string),
                owner: removed.defining_navigation().map(|d| d.owner),
                defining_navigation: removed.defining_navigation().map(|d| d.navigation.clone()),
            };
            builder.raise(ModelEvent::EntityTypeRemoved(event))?;
            Ok(())
        })
    }

    /// Drop the keys declared on `entity`, raising a primary key change if one of
    /// them was the primary key.
    fn drop_own_keys(&mut self, entity: EntityTypeId) -> Result<()> {
        let Some(et) = self.model.entity_type(entity) else {
            return Ok(());
        };
        let previous = et.declared_primary_key();
        let previous_properties = previous
            .and_then(|k| self.model.key(k))
            .map(|k| k.properties().to_vec())
            .unwrap_or_default();
        for key in et.declared_keys().to_vec() {
            self.model.remove_key(key);
        }
        if previous.is_some() {
            self.raise_primary_key_changed(entity, previous, previous_properties)?;
        }
        Ok(())
    }

    /// Remove members of `entity` and its derived types that `base`'s hierarchy
    /// already declares.
    fn drop_members_mapped_by(&mut self, entity: EntityTypeId, base: EntityTypeId) -> Result<()> {
        let mut affected = vec![entity];
        affected.extend(self.model.derived_types(entity));
        for id in affected {
            let properties: Vec<_> = self
                .model
                .entity_type(id)
                .map(|e| e.declared_properties().to_vec())
                .unwrap_or_default();
            for property in properties {
                let name = self.model.property_name(property).to_string();
                if self.model.find_member_declaration(base, &name).is_some() {
                    self.remove_property_unchecked(property)?;
                }
            }
            for navigation in self.model.declared_navigations(id) {
                let Some(name) = self.model.navigation(navigation).map(|n| n.name().to_string())
                else {
                    continue;
                };
                if self.model.find_member_declaration(base, &name).is_some() {
                    self.remove_navigation(navigation)?;
                }
            }
        }
        Ok(())
    }
}

/// A model whose conventions have all run. Read-only.
#[derive(Debug)]
pub struct FinalizedModel {
    model: Model,
    diagnostics: Diagnostics,
    stats: DispatchStats,
}

impl FinalizedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Name-keyed export for the provider layer.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::from_model(&self.model)
    }

    pub fn into_model(self) -> Model {
        self.model
    }
}

impl std::fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("entity_types", &self.model.entity_type_count())
            .field("pending_events", &self.dispatcher.pending())
            .field("conventions", &self.conventions)
            .finish_non_exhaustive()
    }
}
