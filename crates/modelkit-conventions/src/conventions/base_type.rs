//! Base and derived type discovery.
//!
//! Both directions resolve to the same rule: an entity type's base is the nearest
//! runtime base type that is itself a mapped, non-owned entity type. Owned and weak
//! types never take part in a discovered hierarchy. Running the rule from both ends
//! makes the hierarchy independent of the order types were added in.

use super::runtime_type_of;
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{ConfigurationSource, EntityTypeId, ForeignKeyId, Model, Result, TypeCatalog};

/// Sets the base of a new entity type to its nearest mapped runtime base.
pub struct BaseTypeDiscoveryConvention;

/// Re-parents already mapped types under a newly added base.
pub struct DerivedTypeDiscoveryConvention;

/// Whether `entity` may take part in a discovered hierarchy.
fn participates(model: &Model, entity: EntityTypeId) -> bool {
    model
        .entity_type(entity)
        .is_some_and(|e| !e.is_weak() && e.runtime_type().is_some())
        && !model.is_owned(entity)
}

/// The nearest runtime base of `runtime_type` mapped as a participating entity type.
fn nearest_mapped_base(
    model: &Model,
    catalog: &TypeCatalog,
    runtime_type: &str,
) -> Option<EntityTypeId> {
    catalog
        .base_chain(runtime_type)
        .iter()
        .filter_map(|base| model.find_entity_type(&base.name))
        .find(|base| participates(model, *base))
}

impl Convention for BaseTypeDiscoveryConvention {
    fn name(&self) -> &'static str {
        "BaseTypeDiscoveryConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let model = builder.model();
        if !participates(model, entity) {
            return Ok(());
        }
        let Some(et) = model.entity_type(entity) else {
            return Ok(());
        };
        if !ConfigurationSource::Convention.overrides(et.base_type_source()) {
            return Ok(());
        }
        let Some(runtime_type) = runtime_type_of(model, entity) else {
            return Ok(());
        };
        let base = nearest_mapped_base(model, builder.catalog(), &runtime_type);
        if base == et.base_type() {
            return Ok(());
        }
        tracing::trace!(
            entity_type = model.entity_type_name(entity),
            base = base.map(|b| model.entity_type_name(b)),
            "discovered base type"
        );
        builder.has_base_type(entity, base, ConfigurationSource::Convention)?;
        if !builder.model().contains_entity_type(entity) {
            ctx.stop_processing_with(None);
        }
        Ok(())
    }

    /// A type that just became owned leaves any discovered hierarchy. The types
    /// derived from it move up to their next mapped base.
    fn on_foreign_key_ownership_changed(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        _ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        let model = builder.model();
        let Some(fk) = model.foreign_key(foreign_key) else {
            return Ok(());
        };
        if !fk.is_ownership() {
            return Ok(());
        }
        let owned = fk.dependent();
        let derived = model.directly_derived_types(owned);
        if model.entity_type(owned).is_some_and(|e| e.base_type().is_some()) {
            builder.has_base_type(owned, None, ConfigurationSource::Convention)?;
        }

        for entity in derived {
            let model = builder.model();
            let Some(et) = model.entity_type(entity) else {
                continue;
            };
            if !ConfigurationSource::Convention.overrides(et.base_type_source()) {
                continue;
            }
            let base = runtime_type_of(model, entity)
                .and_then(|runtime_type| nearest_mapped_base(model, builder.catalog(), &runtime_type));
            tracing::trace!(
                entity_type = model.entity_type_name(entity),
                base = base.map(|b| model.entity_type_name(b)),
                "derived type left an owned base"
            );
            builder.has_base_type(entity, base, ConfigurationSource::Convention)?;
        }
        Ok(())
    }
}

impl Convention for DerivedTypeDiscoveryConvention {
    fn name(&self) -> &'static str {
        "DerivedTypeDiscoveryConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let model = builder.model();
        if !participates(model, entity) {
            return Ok(());
        }
        let Some(runtime_type) = runtime_type_of(model, entity) else {
            return Ok(());
        };
        let catalog = builder.catalog();
        let derived: Vec<EntityTypeId> = model
            .entity_types()
            .filter(|(id, et)| {
                *id != entity
                    && et.base_type() != Some(entity)
                    && ConfigurationSource::Convention.overrides(et.base_type_source())
                    && et
                        .runtime_type()
                        .is_some_and(|r| r != runtime_type && catalog.derives_from(r, &runtime_type))
            })
            .map(|(id, _)| id)
            .filter(|id| participates(model, *id))
            .filter(|id| {
                runtime_type_of(model, *id)
                    .and_then(|r| nearest_mapped_base(model, catalog, &r))
                    == Some(entity)
            })
            .collect();

        for id in derived {
            tracing::trace!(
                entity_type = builder.model().entity_type_name(id),
                base = builder.model().entity_type_name(entity),
                "discovered derived type"
            );
            builder.has_base_type(id, Some(entity), ConfigurationSource::Convention)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConventionConfig;
    use crate::dispatcher::EventKind;
    use crate::set::ConventionSet;
    use modelkit_core::{TypeCatalog, TypeDescriptor};
    use std::rc::Rc;
    use std::sync::Arc;

    fn animals() -> TypeCatalog {
        TypeCatalog::new()
            .with(TypeDescriptor::new("Animal"))
            .with(TypeDescriptor::new("Dog").with_base("Animal"))
            .with(TypeDescriptor::new("Puppy").with_base("Dog"))
            .with(TypeDescriptor::new("Kennel"))
    }

    fn builder() -> ModelBuilder {
        let mut set = ConventionSet::new();
        set.push(EventKind::EntityTypeAdded, Rc::new(BaseTypeDiscoveryConvention))
            .push(EventKind::EntityTypeAdded, Rc::new(DerivedTypeDiscoveryConvention))
            .push(EventKind::ForeignKeyOwnershipChanged, Rc::new(BaseTypeDiscoveryConvention));
        ModelBuilder::with_conventions(Arc::new(animals()), Rc::new(set), ConventionConfig::new())
    }

    fn own_dog(builder: &mut ModelBuilder) {
        let model = builder.model();
        let kennel = model.find_entity_type("Kennel").unwrap();
        let dog = model.find_entity_type("Dog").unwrap();
        let fk = builder
            .relationship(kennel, dog, None, Some("Dog"), true, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();
        assert!(builder.is_ownership(fk, true, ConfigurationSource::Explicit).unwrap());
    }

    fn base_name(builder: &ModelBuilder, name: &str) -> Option<String> {
        let model = builder.model();
        let id = model.find_entity_type(name)?;
        let base = model.entity_type(id)?.base_type()?;
        Some(model.entity_type_name(base).to_string())
    }

    #[test]
    fn test_base_added_first() {
        let mut builder = builder();
        builder.entity("Animal", ConfigurationSource::Explicit).unwrap();
        builder.entity("Dog", ConfigurationSource::Explicit).unwrap();
        assert_eq!(base_name(&builder, "Dog").as_deref(), Some("Animal"));
    }

    #[test]
    fn test_derived_added_first() {
        let mut builder = builder();
        builder.entity("Dog", ConfigurationSource::Explicit).unwrap();
        builder.entity("Animal", ConfigurationSource::Explicit).unwrap();
        assert_eq!(base_name(&builder, "Dog").as_deref(), Some("Animal"));
    }

    #[test]
    fn test_intermediate_type_inserted_later() {
        let mut builder = builder();
        builder.entity("Puppy", ConfigurationSource::Explicit).unwrap();
        builder.entity("Animal", ConfigurationSource::Explicit).unwrap();
        assert_eq!(base_name(&builder, "Puppy").as_deref(), Some("Animal"));

        builder.entity("Dog", ConfigurationSource::Explicit).unwrap();
        assert_eq!(base_name(&builder, "Puppy").as_deref(), Some("Dog"));
        assert_eq!(base_name(&builder, "Dog").as_deref(), Some("Animal"));
    }

    #[test]
    fn test_explicit_base_is_kept() {
        let mut builder = builder();
        builder.entity("Animal", ConfigurationSource::Explicit).unwrap();
        let puppy = builder.entity("Puppy", ConfigurationSource::Explicit).unwrap().unwrap();
        assert!(builder.has_base_type(puppy, None, ConfigurationSource::Explicit).unwrap());
        builder.entity("Dog", ConfigurationSource::Explicit).unwrap();
        assert_eq!(base_name(&builder, "Puppy"), None);
        assert_eq!(
            builder.model().entity_type(puppy).unwrap().base_type_source(),
            Some(ConfigurationSource::Explicit)
        );
    }

    #[test]
    fn test_owned_intermediate_type_is_skipped_in_any_order() {
        let mut owned_last = builder();
        for name in ["Kennel", "Animal", "Dog", "Puppy"] {
            owned_last.entity(name, ConfigurationSource::Explicit).unwrap();
        }
        assert_eq!(base_name(&owned_last, "Puppy").as_deref(), Some("Dog"));
        own_dog(&mut owned_last);

        let mut owned_first = builder();
        for name in ["Kennel", "Animal", "Dog"] {
            owned_first.entity(name, ConfigurationSource::Explicit).unwrap();
        }
        own_dog(&mut owned_first);
        owned_first.entity("Puppy", ConfigurationSource::Explicit).unwrap();

        for built in [&owned_last, &owned_first] {
            assert_eq!(base_name(built, "Dog"), None);
            assert_eq!(base_name(built, "Puppy").as_deref(), Some("Animal"));
        }
    }
}
