//! Collapsing weak owned types back into a regular one.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::dispatcher::RemovedEntityType;
use modelkit_core::{ConfigurationSource, Result};

/// When removing a weak owned type leaves a single weak instance of its runtime type,
/// that instance is replaced by a regular owned entity type named after the runtime
/// type. Members and the ownership carry over with their configuration sources.
pub struct OwnedTypesConvention;

impl Convention for OwnedTypesConvention {
    fn name(&self) -> &'static str {
        "OwnedTypesConvention"
    }

    fn on_entity_type_removed(
        &self,
        builder: &mut ModelBuilder,
        removed: &RemovedEntityType,
        _ctx: &mut ConventionContext<RemovedEntityType>,
    ) -> Result<()> {
        if !removed.was_weak() {
            return Ok(());
        }
        let Some(runtime_type) = removed.runtime_type.as_deref() else {
            return Ok(());
        };
        let model = builder.model();
        let survivors = model.weak_entity_types(runtime_type);
        let [survivor] = survivors.as_slice() else {
            return Ok(());
        };
        let survivor = *survivor;
        let Some(ownership) = model.find_ownership(survivor) else {
            return Ok(());
        };
        let source = model
            .entity_type(survivor)
            .map_or(ConfigurationSource::Convention, |e| e.source());

        builder.delay_conventions(|builder| {
            let members = builder.detach_all_members(survivor);
            let Some(relationship) = builder.detach_relationship(ownership)? else {
                return Ok(());
            };
            builder.remove_entity_type_unchecked(survivor)?;
            let Some(replacement) = builder.add_entity_type_unchecked(runtime_type, source)? else {
                return Ok(());
            };
            if let Some(members) = members {
                members.attach(builder, replacement)?;
            }
            relationship.attach_to(builder, relationship.principal(), replacement)?;
            tracing::debug!(
                entity_type = builder.model().entity_type_name(replacement),
                owner = builder.model().entity_type_name(relationship.principal()),
                "weak owned type collapsed"
            );
            Ok(())
        })
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

    fn builder() -> ModelBuilder {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Customer"))
            .with(TypeDescriptor::new("Supplier"))
            .with(
                TypeDescriptor::new("Address").with_member(MemberDescriptor::property(
                    "Street",
                    MemberType::scalar(ScalarKind::String),
                )),
            );
        let mut set = ConventionSet::new();
        set.push(EventKind::EntityTypeRemoved, Rc::new(OwnedTypesConvention));
        ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), ConventionConfig::new())
    }

    #[test]
    fn test_last_weak_instance_becomes_regular() {
        let mut builder = builder();
        let customer = builder.entity("Customer", ConfigurationSource::Explicit).unwrap().unwrap();
        let supplier = builder.entity("Supplier", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .owns(customer, "Home", "Address", false, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();
        builder
            .owns(supplier, "Office", "Address", false, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();
        assert_eq!(builder.model().weak_entity_types("Address").len(), 2);
        let weak = builder
            .model()
            .find_weak_entity_type("Address", customer, "Home")
            .unwrap();
        let street = builder.property(weak, "Street", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.has_max_length(street, Some(80), ConfigurationSource::Explicit);

        assert!(builder.remove_entity_type(supplier, ConfigurationSource::Explicit).unwrap());

        let model = builder.model();
        assert!(!model.has_weak_entity_types("Address"));
        let address = model.find_entity_type("Address").unwrap();
        assert!(!model.entity_type(address).unwrap().is_weak());
        let ownership = model.find_ownership(address).unwrap();
        let fk = model.foreign_key(ownership).unwrap();
        assert_eq!(fk.principal(), customer);
        assert_eq!(fk.principal_to_dependent().unwrap().name, "Home");

        let street = model.property(model.find_property(address, "Street").unwrap()).unwrap();
        assert_eq!(street.max_length(), Some(80));
        assert_eq!(street.max_length_source(), Some(ConfigurationSource::Explicit));
    }

    #[test]
    fn test_regular_removal_is_ignored() {
        let mut builder = builder();
        let customer = builder.entity("Customer", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .owns(customer, "Home", "Address", false, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();
        let address = builder.model().find_entity_type("Address").unwrap();
        assert!(builder.remove_entity_type(address, ConfigurationSource::Explicit).unwrap());
        assert!(builder.model().find_entity_type("Address").is_none());
    }
}
