//! Generic annotation adapters.
//!
//! An adapter pairs an annotation kind with a handler function. It looks the
//! annotation up on the event's subject through the injected [`AttributeReader`] and
//! calls the handler only when one is present.

use super::runtime_type_of;
use crate::attributes::{AttributeReader, AttributeTarget, find_attribute, has_attribute};
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{
    ConfigurationSource, DataAnnotation, EntityTypeId, NavigationRef, NotMappedAttribute,
    OwnedAttribute, PropertyId, Result,
};
use std::rc::Rc;

pub type EntityTypeAttributeHandler<A> = Box<
    dyn Fn(&mut ModelBuilder, EntityTypeId, &A, &mut ConventionContext<EntityTypeId>) -> Result<()>,
>;

pub type PropertyAttributeHandler<A> =
    Box<dyn Fn(&mut ModelBuilder, PropertyId, &A, &mut ConventionContext<PropertyId>) -> Result<()>>;

pub type NavigationAttributeHandler<A> = Box<
    dyn Fn(&mut ModelBuilder, NavigationRef, &A, &mut ConventionContext<NavigationRef>) -> Result<()>,
>;

// ==================== Entity types ====================

/// Runs a handler for entity types whose runtime type carries annotation `A`.
pub struct EntityTypeAttributeConvention<A> {
    name: &'static str,
    attributes: Rc<dyn AttributeReader>,
    handler: EntityTypeAttributeHandler<A>,
}

impl<A: DataAnnotation> EntityTypeAttributeConvention<A> {
    pub fn new(
        name: &'static str,
        attributes: Rc<dyn AttributeReader>,
        handler: impl Fn(&mut ModelBuilder, EntityTypeId, &A, &mut ConventionContext<EntityTypeId>) -> Result<()>
            + 'static,
    ) -> Self {
        Self {
            name,
            attributes,
            handler: Box::new(handler),
        }
    }
}

impl<A: DataAnnotation> Convention for EntityTypeAttributeConvention<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let Some(runtime_type) = runtime_type_of(builder.model(), entity) else {
            return Ok(());
        };
        let Some(attribute) =
            find_attribute::<A>(self.attributes.as_ref(), AttributeTarget::Type(&runtime_type))
        else {
            return Ok(());
        };
        (self.handler)(builder, entity, &attribute, ctx)
    }
}

/// Removes entity types whose runtime type is annotated not-mapped.
pub fn not_mapped_entity_type_convention(
    attributes: Rc<dyn AttributeReader>,
) -> EntityTypeAttributeConvention<NotMappedAttribute> {
    EntityTypeAttributeConvention::new(
        "NotMappedEntityTypeConvention",
        attributes,
        |builder, entity, _, ctx| {
            let Some(runtime_type) = runtime_type_of(builder.model(), entity) else {
                return Ok(());
            };
            builder.ignore_entity_type(&runtime_type, ConfigurationSource::DataAnnotation)?;
            if !builder.model().contains_entity_type(entity) {
                ctx.stop_processing_with(None);
            }
            Ok(())
        },
    )
}

/// Marks runtime types annotated owned, turning a regular entity type into an owned one.
pub fn owned_entity_type_convention(
    attributes: Rc<dyn AttributeReader>,
) -> EntityTypeAttributeConvention<OwnedAttribute> {
    EntityTypeAttributeConvention::new(
        "OwnedEntityTypeConvention",
        attributes,
        |builder, entity, _, ctx| {
            if builder.model().is_owned(entity) {
                return Ok(());
            }
            let Some(runtime_type) = runtime_type_of(builder.model(), entity) else {
                return Ok(());
            };
            builder.owned(&runtime_type, ConfigurationSource::DataAnnotation)?;
            if !builder.model().contains_entity_type(entity) {
                ctx.stop_processing_with(None);
            }
            Ok(())
        },
    )
}

/// Ignores every runtime member annotated not-mapped.
pub struct NotMappedMemberConvention {
    attributes: Rc<dyn AttributeReader>,
}

impl NotMappedMemberConvention {
    pub fn new(attributes: Rc<dyn AttributeReader>) -> Self {
        Self { attributes }
    }
}

impl Convention for NotMappedMemberConvention {
    fn name(&self) -> &'static str {
        "NotMappedMemberConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let Some(runtime_type) = runtime_type_of(builder.model(), entity) else {
            return Ok(());
        };
        let mut names: Vec<String> = builder
            .catalog()
            .runtime_members(&runtime_type, |_| false)
            .iter()
            .map(|m| m.member().name.clone())
            .collect();
        names.dedup();

        for name in names {
            let target = AttributeTarget::Member {
                type_name: &runtime_type,
                member: &name,
            };
            if !has_attribute::<NotMappedAttribute>(self.attributes.as_ref(), target) {
                continue;
            }
            builder.ignore_member(entity, &name, ConfigurationSource::DataAnnotation)?;
            if !builder.model().contains_entity_type(entity) {
                ctx.stop_processing_with(None);
                break;
            }
        }
        Ok(())
    }
}

// ==================== Properties ====================

/// Runs a handler for properties whose backing member carries annotation `A`.
pub struct PropertyAttributeConvention<A> {
    name: &'static str,
    attributes: Rc<dyn AttributeReader>,
    handler: PropertyAttributeHandler<A>,
}

impl<A: DataAnnotation> PropertyAttributeConvention<A> {
    pub fn new(
        name: &'static str,
        attributes: Rc<dyn AttributeReader>,
        handler: impl Fn(&mut ModelBuilder, PropertyId, &A, &mut ConventionContext<PropertyId>) -> Result<()>
            + 'static,
    ) -> Self {
        Self {
            name,
            attributes,
            handler: Box::new(handler),
        }
    }
}

impl<A: DataAnnotation> Convention for PropertyAttributeConvention<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_property_added(
        &self,
        builder: &mut ModelBuilder,
        property: PropertyId,
        ctx: &mut ConventionContext<PropertyId>,
    ) -> Result<()> {
        let model = builder.model();
        let Some(p) = model.property(property) else {
            return Ok(());
        };
        if p.is_shadow() {
            return Ok(());
        }
        let Some(runtime_type) = runtime_type_of(model, p.declaring_type()) else {
            return Ok(());
        };
        let target = AttributeTarget::Member {
            type_name: &runtime_type,
            member: p.name(),
        };
        let Some(attribute) = find_attribute::<A>(self.attributes.as_ref(), target) else {
            return Ok(());
        };
        (self.handler)(builder, property, &attribute, ctx)
    }
}

// ==================== Navigations ====================

/// Runs a handler for navigations whose backing member carries annotation `A`.
pub struct NavigationAttributeConvention<A> {
    name: &'static str,
    attributes: Rc<dyn AttributeReader>,
    handler: NavigationAttributeHandler<A>,
}

impl<A: DataAnnotation> NavigationAttributeConvention<A> {
    pub fn new(
        name: &'static str,
        attributes: Rc<dyn AttributeReader>,
        handler: impl Fn(&mut ModelBuilder, NavigationRef, &A, &mut ConventionContext<NavigationRef>) -> Result<()>
            + 'static,
    ) -> Self {
        Self {
            name,
            attributes,
            handler: Box::new(handler),
        }
    }
}

impl<A: DataAnnotation> Convention for NavigationAttributeConvention<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_navigation_added(
        &self,
        builder: &mut ModelBuilder,
        navigation: NavigationRef,
        ctx: &mut ConventionContext<NavigationRef>,
    ) -> Result<()> {
        let model = builder.model();
        let Some(view) = model.navigation(navigation) else {
            return Ok(());
        };
        let Some(runtime_type) = runtime_type_of(model, view.declaring_type()) else {
            return Ok(());
        };
        let target = AttributeTarget::Member {
            type_name: &runtime_type,
            member: view.name(),
        };
        let Some(attribute) = find_attribute::<A>(self.attributes.as_ref(), target) else {
            return Ok(());
        };
        (self.handler)(builder, navigation, &attribute, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::DescriptorAttributeReader;
    use crate::config::ConventionConfig;
    use crate::dispatcher::EventKind;
    use crate::set::ConventionSet;
    use modelkit_core::{
        AttributeData, MemberDescriptor, MemberType, ScalarKind, TypeCatalog, TypeDescriptor,
    };
    use std::sync::Arc;

    fn builder_with(catalog: TypeCatalog, kind: EventKind, convention: Rc<dyn Convention>) -> ModelBuilder {
        let mut set = ConventionSet::new();
        set.push(kind, convention);
        ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), ConventionConfig::new())
    }

    fn reader(catalog: &TypeCatalog) -> Rc<dyn AttributeReader> {
        Rc::new(DescriptorAttributeReader::new(Arc::new(catalog.clone())))
    }

    #[test]
    fn test_not_mapped_type_is_removed_and_ignored() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Audit").with_attribute(AttributeData::not_mapped()));
        let convention = Rc::new(not_mapped_entity_type_convention(reader(&catalog)));
        let mut builder = builder_with(catalog, EventKind::EntityTypeAdded, convention);

        let added = builder.entity("Audit", ConfigurationSource::Convention).unwrap();
        assert_eq!(added, None);
        assert!(builder.model().find_entity_type("Audit").is_none());
        assert_eq!(
            builder.model().ignored_type_source("Audit"),
            Some(ConfigurationSource::DataAnnotation)
        );
        assert_eq!(builder.stats().stopped_dispatches, 1);
    }

    #[test]
    fn test_explicit_entity_survives_not_mapped() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Audit").with_attribute(AttributeData::not_mapped()));
        let convention = Rc::new(not_mapped_entity_type_convention(reader(&catalog)));
        let mut builder = builder_with(catalog, EventKind::EntityTypeAdded, convention);

        let added = builder.entity("Audit", ConfigurationSource::Explicit).unwrap();
        assert!(added.is_some());
    }

    #[test]
    fn test_not_mapped_members_are_ignored() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Blog")
                .with_member(MemberDescriptor::property("Id", MemberType::scalar(ScalarKind::I32)))
                .with_member(
                    MemberDescriptor::property("Cache", MemberType::scalar(ScalarKind::String))
                        .with_attribute(AttributeData::not_mapped()),
                ),
        );
        let convention = Rc::new(NotMappedMemberConvention::new(reader(&catalog)));
        let mut builder = builder_with(catalog, EventKind::EntityTypeAdded, convention);

        let blog = builder.entity("Blog", ConfigurationSource::Explicit).unwrap().unwrap();
        let et = builder.model().entity_type(blog).unwrap();
        assert_eq!(et.is_member_ignored("Cache"), Some(ConfigurationSource::DataAnnotation));
        assert_eq!(et.is_member_ignored("Id"), None);
    }
}
