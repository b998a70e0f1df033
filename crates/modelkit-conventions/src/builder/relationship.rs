//! Foreign keys, navigations and ownership.

use super::ModelBuilder;
use crate::dispatcher::{ModelEvent, RemovedForeignKey};
use modelkit_core::{
    ConfigurationSource, EntityTypeId, ForeignKey, ForeignKeyId, Navigation, NavigationEnd,
    NavigationRef, PropertyId, Result,
};

impl ModelBuilder {
    /// Create a relationship in which `dependent` refers to `principal`.
    ///
    /// `to_principal` is declared on the dependent, `to_dependent` on the principal. A
    /// unique relationship discovered by convention with both navigations leaves its
    /// principal end unresolved until a later rule decides it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn relationship(
        &mut self,
        principal: EntityTypeId,
        dependent: EntityTypeId,
        to_principal: Option<&str>,
        to_dependent: Option<&str>,
        unique: bool,
        source: ConfigurationSource,
    ) -> Result<Option<ForeignKeyId>> {
        if !self.model.contains_entity_type(principal) || !self.model.contains_entity_type(dependent) {
            return Ok(None);
        }
        if let Some(name) = to_principal {
            if !self.navigation_name_available(dependent, name, source) {
                return Ok(None);
            }
        }
        if let Some(name) = to_dependent {
            if !self.navigation_name_available(principal, name, source) {
                return Ok(None);
            }
        }

        let mut fk = ForeignKey::new(dependent, principal, source);
        fk.set_navigation(
            NavigationEnd::DependentToPrincipal,
            to_principal.map(|n| Navigation::new(n, source)),
        );
        fk.set_navigation(
            NavigationEnd::PrincipalToDependent,
            to_dependent.map(|n| Navigation::new(n, source)),
        );
        fk.set_unique(unique, source);
        let unresolved = source == ConfigurationSource::Convention
            && unique
            && to_principal.is_some()
            && to_dependent.is_some();
        if !unresolved {
            fk.set_principal_end_source(source);
        }
        self.add_relationship(fk)
    }

    /// Make `principal` the principal end of `fk`, inverting it if needed.
    pub fn has_principal_end(
        &mut self,
        fk: ForeignKeyId,
        principal: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<bool> {
        let Some(foreign_key) = self.model.foreign_key(fk) else {
            return Ok(false);
        };
        if foreign_key.principal() == principal {
            let unresolved = foreign_key.principal_end_source().is_none();
            if let Some(foreign_key) = self.model.foreign_key_mut(fk) {
                foreign_key.set_principal_end_source(source);
            }
            if unresolved {
                self.raise(ModelEvent::ForeignKeyPrincipalEndChanged(fk))?;
            }
            return Ok(true);
        }
        if foreign_key.dependent() != principal
            || foreign_key.is_ownership()
            || !source.overrides(foreign_key.principal_end_source())
            || !source.overrides(foreign_key.properties_source())
        {
            return Ok(false);
        }
        let old_properties = foreign_key.properties().to_vec();

        self.delay_conventions(|builder| {
            builder.model.invert_foreign_key(fk);
            if let Some(foreign_key) = builder.model.foreign_key_mut(fk) {
                foreign_key.set_principal_end_source(source);
            }
            builder.prune_foreign_key_properties(&old_properties)?;
            tracing::debug!(
                %fk,
                principal = builder.model.entity_type_name(principal),
                "relationship inverted"
            );
            builder.raise(ModelEvent::ForeignKeyPrincipalEndChanged(fk))?;
            Ok(true)
        })
    }

    /// Set requiredness; the dependent properties follow it.
    pub fn is_required(
        &mut self,
        fk: ForeignKeyId,
        required: bool,
        source: ConfigurationSource,
    ) -> Result<bool> {
        let Some(foreign_key) = self.model.foreign_key_mut(fk) else {
            return Ok(false);
        };
        if !foreign_key.set_required(required, source) {
            return Ok(false);
        }
        let properties = foreign_key.properties().to_vec();
        for property in properties {
            if let Some(p) = self.model.property_mut(property) {
                p.set_nullable(!required, source);
            }
        }
        Ok(true)
    }

    /// Mark or unmark `fk` as an ownership.
    pub fn is_ownership(
        &mut self,
        fk: ForeignKeyId,
        ownership: bool,
        source: ConfigurationSource,
    ) -> Result<bool> {
        let Some(foreign_key) = self.model.foreign_key_mut(fk) else {
            return Ok(false);
        };
        let changed = foreign_key.is_ownership() != ownership;
        if !foreign_key.set_ownership(ownership, source) {
            return Ok(false);
        }
        if changed {
            self.raise(ModelEvent::ForeignKeyOwnershipChanged(fk))?;
        }
        Ok(true)
    }

    /// Remove `fk` unless it was configured with a stronger source. Its dependent
    /// properties stay; conventions prune the ones they created.
    pub fn remove_foreign_key(&mut self, fk: ForeignKeyId, source: ConfigurationSource) -> Result<bool> {
        let Some(foreign_key) = self.model.foreign_key(fk) else {
            return Ok(false);
        };
        if !source.overrides(Some(foreign_key.source())) {
            return Ok(false);
        }
        self.remove_foreign_key_unchecked(fk)?;
        Ok(true)
    }

    /// Use `properties` as the dependent properties of `fk`.
    pub fn has_foreign_key_properties(
        &mut self,
        fk: ForeignKeyId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Result<bool> {
        let Some(foreign_key) = self.model.foreign_key(fk) else {
            return Ok(false);
        };
        if !source.overrides(foreign_key.properties_source()) {
            return Ok(false);
        }
        let dependent = foreign_key.dependent();
        let required = foreign_key.is_required();
        let visible = self.model.properties(dependent);
        if !properties.iter().all(|p| visible.contains(p)) {
            return Ok(false);
        }
        if let Some(foreign_key) = self.model.foreign_key_mut(fk) {
            foreign_key.set_properties(properties.clone(), Some(source));
        }
        if required {
            for property in properties {
                if let Some(p) = self.model.property_mut(property) {
                    p.set_nullable(false, ConfigurationSource::Convention);
                }
            }
        }
        Ok(true)
    }

    /// Make `target_type` owned by `owner` through `navigation`.
    ///
    /// The first owner gets a regular entity type of that name. When a second owner
    /// appears, the existing instance is turned into a weak type identified by its
    /// owner and navigation, and the new owner gets a weak type of its own.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn owns(
        &mut self,
        owner: EntityTypeId,
        navigation: &str,
        target_type: &str,
        collection: bool,
        source: ConfigurationSource,
    ) -> Result<Option<ForeignKeyId>> {
        if !self.model.contains_entity_type(owner) {
            return Ok(None);
        }
        if self
            .model
            .ignored_type_source(target_type)
            .is_some_and(|ignored| ignored.overrides(Some(source)))
        {
            return Ok(None);
        }
        if let Some(existing) = self.model.find_declared_navigation(owner, navigation) {
            let Some(view) = self.model.navigation(existing) else {
                return Ok(None);
            };
            let fk = view.foreign_key();
            let target = view.target_type();
            if fk.is_ownership()
                && self.model.entity_type(target).and_then(|e| e.runtime_type()) == Some(target_type)
            {
                return Ok(Some(existing.foreign_key));
            }
            if !source.overrides(Some(fk.source())) {
                return Ok(None);
            }
            self.remove_foreign_key_unchecked(existing.foreign_key)?;
        } else if !self.navigation_name_available(owner, navigation, source) {
            return Ok(None);
        }

        self.delay_conventions(|builder| {
            let Some(dependent) = builder.owned_dependent(owner, navigation, target_type, source)? else {
                return Ok(None);
            };
            let mut fk = ForeignKey::new(dependent, owner, source);
            fk.set_navigation(
                NavigationEnd::PrincipalToDependent,
                Some(Navigation::new(navigation, source)),
            );
            fk.set_unique(!collection, source);
            fk.set_required(true, source);
            fk.set_ownership(true, source);
            fk.set_principal_end_source(source);
            tracing::debug!(
                owner = builder.model.entity_type_name(owner),
                navigation,
                owned = builder.model.entity_type_name(dependent),
                "ownership added"
            );
            builder.add_relationship(fk)
        })
    }

    // ==================== Internals ====================

    /// Add `fk` and raise its events: the foreign key first, then each navigation.
    pub(crate) fn add_relationship(&mut self, fk: ForeignKey) -> Result<Option<ForeignKeyId>> {
        self.delay_conventions(|builder| {
            let Some(id) = builder.model.add_foreign_key(fk) else {
                return Ok(None);
            };
            tracing::trace!(%id, "foreign key added");
            builder.raise(ModelEvent::ForeignKeyAdded(id))?;
            for end in [NavigationEnd::DependentToPrincipal, NavigationEnd::PrincipalToDependent] {
                let reference = NavigationRef { foreign_key: id, end };
                if builder.model.navigation(reference).is_some() {
                    builder.raise_navigation_added(reference)?;
                }
            }
            Ok(Some(id))
        })
        .map(|id| id.filter(|id| self.model.contains_foreign_key(*id)))
    }

    pub(crate) fn remove_foreign_key_unchecked(&mut self, fk: ForeignKeyId) -> Result<()> {
        let Some(removed) = self.model.remove_foreign_key(fk) else {
            return Ok(());
        };
        tracing::trace!(%fk, "foreign key removed");
        let event = RemovedForeignKey {
            id: fk,
            dependent: removed.dependent(),
            principal: removed.principal(),
            properties: removed.properties().to_vec(),
            dependent_to_principal: removed.dependent_to_principal().map(|n| n.name.clone()),
            principal_to_dependent: removed.principal_to_dependent().map(|n| n.name.clone()),
            was_ownership: removed.is_ownership(),
        };
        self.raise(ModelEvent::ForeignKeyRemoved(event))?;
        Ok(())
    }

    /// Drop one navigation. A convention-created foreign key left with no navigation
    /// is removed.
    pub(crate) fn remove_navigation(&mut self, reference: NavigationRef) -> Result<()> {
        let Some(fk) = self.model.foreign_key_mut(reference.foreign_key) else {
            return Ok(());
        };
        fk.set_navigation(reference.end, None);
        if fk.has_no_navigations()
            && !fk.is_ownership()
            && fk.source() == ConfigurationSource::Convention
        {
            self.remove_foreign_key_unchecked(reference.foreign_key)?;
        }
        Ok(())
    }

    /// Remove convention-created shadow properties no key or foreign key uses.
    pub(crate) fn prune_foreign_key_properties(&mut self, properties: &[PropertyId]) -> Result<()> {
        for property in properties {
            let Some(p) = self.model.property(*property) else {
                continue;
            };
            if !p.is_shadow() || p.source() != ConfigurationSource::Convention {
                continue;
            }
            let declaring = p.declaring_type();
            let in_foreign_key = self
                .model
                .foreign_keys()
                .any(|(_, fk)| fk.properties().contains(property));
            let in_key = self
                .model
                .entity_type(declaring)
                .is_some_and(|e| {
                    e.declared_keys().iter().any(|k| {
                        self.model
                            .key(*k)
                            .is_some_and(|k| k.properties().contains(property))
                    })
                });
            if !in_foreign_key && !in_key {
                tracing::trace!(property = p.name(), "pruning orphaned shadow property");
                self.remove_property_unchecked(*property)?;
            }
        }
        Ok(())
    }

    /// Whether a navigation called `name` may be declared on `entity`.
    fn navigation_name_available(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> bool {
        self.model.find_navigation(entity, name).is_none()
            && self.model.find_property(entity, name).is_none()
            && self.clear_member_ignore(entity, name, source)
    }

    /// The entity type to use as the dependent of a new ownership.
    fn owned_dependent(
        &mut self,
        owner: EntityTypeId,
        navigation: &str,
        target_type: &str,
        source: ConfigurationSource,
    ) -> Result<Option<EntityTypeId>> {
        if self.model.has_weak_entity_types(target_type) {
            return self.owned_entity(target_type, owner, navigation, source);
        }
        let Some(existing) = self.model.find_entity_type(target_type) else {
            return self.add_entity_type_unchecked(target_type, source);
        };

        if self.model.find_ownership(existing).is_some() {
            self.convert_to_weak(existing)?;
            return self.owned_entity(target_type, owner, navigation, source);
        }

        let existing_source = self
            .model
            .entity_type(existing)
            .map_or(ConfigurationSource::Convention, |e| e.source());
        if existing_source == ConfigurationSource::Explicit && source == ConfigurationSource::Explicit {
            return Err(modelkit_core::Error::ClashingOwnedEntityType {
                name: target_type.to_string(),
            });
        }
        if !source.overrides(Some(existing_source)) {
            return Ok(None);
        }
        self.remove_entity_type_unchecked(existing)?;
        self.add_entity_type_unchecked(target_type, source)
    }

    /// Replace a regular owned entity type with a weak one under the same owner.
    fn convert_to_weak(&mut self, existing: EntityTypeId) -> Result<()> {
        let Some(ownership) = self.model.find_ownership(existing) else {
            return Ok(());
        };
        let Some(runtime_type) = self
            .model
            .entity_type(existing)
            .and_then(|e| e.runtime_type().or(Some(e.name())))
            .map(str::to_string)
        else {
            return Ok(());
        };
        let source = self
            .model
            .entity_type(existing)
            .map_or(ConfigurationSource::Convention, |e| e.source());
        self.delay_conventions(|builder| {
            let members = builder.detach_all_members(existing);
            let Some(relationship) = builder.detach_relationship(ownership)? else {
                return Ok(());
            };
            builder.remove_entity_type_unchecked(existing)?;
            let navigation = relationship.principal_to_dependent_name().unwrap_or_default();
            let Some(weak) =
                builder.owned_entity(&runtime_type, relationship.principal(), &navigation, source)?
            else {
                return Ok(());
            };
            if let Some(members) = members {
                members.attach(builder, weak)?;
            }
            relationship.attach_to(builder, relationship.principal(), weak)?;
            tracing::debug!(
                entity_type = builder.model.entity_type_name(weak),
                "owned type converted to weak"
            );
            Ok(())
        })
    }
}
