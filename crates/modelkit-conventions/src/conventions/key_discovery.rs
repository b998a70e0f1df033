//! Primary key discovery by name.

use super::short_type_name;
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{ConfigurationSource, EntityTypeId, PropertyId, Result};

/// Makes a property called `Id`, or `<Type>Id`, the primary key of a root entity type.
/// Names match case-insensitively; `Id` wins when both exist.
pub struct KeyDiscoveryConvention;

impl KeyDiscoveryConvention {
    fn candidate(builder: &ModelBuilder, entity: EntityTypeId) -> Option<PropertyId> {
        let model = builder.model();
        let type_key = format!("{}id", short_type_name(model, entity).to_lowercase());
        let properties = model.properties(entity);
        let named = |wanted: &str| {
            properties
                .iter()
                .copied()
                .find(|p| model.property_name(*p).to_lowercase() == wanted)
        };
        named("id").or_else(|| named(&type_key))
    }

    fn discover(builder: &mut ModelBuilder, entity: EntityTypeId) -> Result<()> {
        let model = builder.model();
        let Some(et) = model.entity_type(entity) else {
            return Ok(());
        };
        if et.base_type().is_some()
            || et.is_keyless()
            || model.is_owned(entity)
            || !ConfigurationSource::Convention.overrides(et.primary_key_source())
        {
            return Ok(());
        }
        let Some(property) = Self::candidate(builder, entity) else {
            return Ok(());
        };
        tracing::trace!(
            entity_type = builder.model().entity_type_name(entity),
            property = builder.model().property_name(property),
            "discovered primary key"
        );
        builder.set_primary_key(entity, vec![property], ConfigurationSource::Convention)?;
        Ok(())
    }
}

impl Convention for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "KeyDiscoveryConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Self::discover(builder, entity)
    }

    fn on_base_type_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _previous: Option<EntityTypeId>,
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Self::discover(builder, entity)
    }

    fn on_entity_type_member_ignored(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _name: &str,
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Self::discover(builder, entity)
    }

    fn on_property_added(
        &self,
        builder: &mut ModelBuilder,
        property: PropertyId,
        _ctx: &mut ConventionContext<PropertyId>,
    ) -> Result<()> {
        let Some(declaring) = builder.model().property(property).map(|p| p.declaring_type()) else {
            return Ok(());
        };
        Self::discover(builder, declaring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConventionConfig;
    use crate::dispatcher::EventKind;
    use crate::set::ConventionSet;
    use modelkit_core::{MemberDescriptor, MemberType, ScalarKind, TypeCatalog, TypeDescriptor};
    use std::rc::Rc;
    use std::sync::Arc;

    fn builder(catalog: TypeCatalog) -> ModelBuilder {
        let mut set = ConventionSet::new();
        set.push(EventKind::PropertyAdded, Rc::new(KeyDiscoveryConvention))
            .push(EventKind::EntityTypeMemberIgnored, Rc::new(KeyDiscoveryConvention));
        ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), ConventionConfig::new())
    }

    fn scalar(name: &str, scalar: ScalarKind) -> MemberDescriptor {
        MemberDescriptor::property(name, MemberType::scalar(scalar))
    }

    #[test]
    fn test_type_prefixed_id_is_found() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("shop.Order")
                .with_member(scalar("Total", ScalarKind::Decimal))
                .with_member(scalar("ORDERID", ScalarKind::I64)),
        );
        let mut builder = builder(catalog);
        let order = builder.entity("shop.Order", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(order, "Total", ConfigurationSource::Explicit).unwrap();
        builder.property(order, "ORDERID", ConfigurationSource::Explicit).unwrap();
        assert_eq!(builder.model().primary_key_names(order), vec!["ORDERID"]);
    }

    #[test]
    fn test_id_is_preferred_and_falls_back_when_ignored() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Order")
                .with_member(scalar("OrderId", ScalarKind::I32))
                .with_member(scalar("Id", ScalarKind::I32)),
        );
        let mut builder = builder(catalog);
        let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(order, "OrderId", ConfigurationSource::Convention).unwrap();
        builder.property(order, "Id", ConfigurationSource::Convention).unwrap();
        assert_eq!(builder.model().primary_key_names(order), vec!["Id"]);

        builder.ignore_member(order, "Id", ConfigurationSource::Explicit).unwrap();
        assert_eq!(builder.model().primary_key_names(order), vec!["OrderId"]);
    }

    #[test]
    fn test_explicit_key_is_not_replaced() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Order")
                .with_member(scalar("Code", ScalarKind::String))
                .with_member(scalar("Id", ScalarKind::I32)),
        );
        let mut builder = builder(catalog);
        let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(order, "Code", ConfigurationSource::Explicit).unwrap();
        builder.primary_key(order, &["Code"], ConfigurationSource::Explicit).unwrap();
        builder.property(order, "Id", ConfigurationSource::Explicit).unwrap();
        assert_eq!(builder.model().primary_key_names(order), vec!["Code"]);
    }
}
