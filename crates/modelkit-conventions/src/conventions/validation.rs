//! Model-built checks that turn unresolved configuration into errors.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{Error, NavigationEnd, NavigationRef, Result};

/// Fails on one-to-one relationships whose principal end no rule could decide.
pub struct RelationshipValidationConvention;

/// Fails when a member ignored on an entity type is mapped by one of its base types.
pub struct IgnoredMembersValidationConvention;

impl Convention for RelationshipValidationConvention {
    fn name(&self) -> &'static str {
        "RelationshipValidationConvention"
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        let model = builder.model();
        for (id, fk) in model.foreign_keys() {
            let ambiguous = fk.is_unique()
                && fk.principal_end_source().is_none()
                && fk.dependent_to_principal().is_some()
                && fk.principal_to_dependent().is_some();
            if !ambiguous {
                continue;
            }
            let path = |end| model.navigation_path(NavigationRef { foreign_key: id, end });
            return Err(Error::AmbiguousOneToOne {
                dependent_path: path(NavigationEnd::DependentToPrincipal),
                principal_path: path(NavigationEnd::PrincipalToDependent),
            });
        }
        Ok(())
    }
}

impl Convention for IgnoredMembersValidationConvention {
    fn name(&self) -> &'static str {
        "IgnoredMembersValidationConvention"
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        let model = builder.model();
        for (id, et) in model.entity_types() {
            for name in et.ignored_members().keys() {
                let Some(declaring) = model.find_member_declaration(id, name) else {
                    continue;
                };
                if declaring != id {
                    return Err(Error::InheritedMemberIgnored {
                        member: name.clone(),
                        entity_type: et.name().to_string(),
                        declaring_type: model.entity_type_name(declaring).to_string(),
                    });
                }
            }
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
    use modelkit_core::{
        ConfigurationSource, MemberDescriptor, MemberType, ScalarKind, TypeCatalog, TypeDescriptor,
    };
    use std::rc::Rc;
    use std::sync::Arc;

    fn builder(catalog: TypeCatalog, convention: Rc<dyn Convention>) -> ModelBuilder {
        let mut set = ConventionSet::new();
        set.push(EventKind::ModelBuilt, convention);
        let config = ConventionConfig::new().remove_unreachable_types(false);
        ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), config)
    }

    #[test]
    fn test_unresolved_one_to_one_fails() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Husband"))
            .with(TypeDescriptor::new("Wife"));
        let mut builder = builder(catalog, Rc::new(RelationshipValidationConvention));
        let husband = builder.entity("Husband", ConfigurationSource::Explicit).unwrap().unwrap();
        let wife = builder.entity("Wife", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .relationship(husband, wife, Some("Husband"), Some("Wife"), true, ConfigurationSource::Convention)
            .unwrap()
            .unwrap();

        match builder.finalize().unwrap_err() {
            Error::AmbiguousOneToOne {
                dependent_path,
                principal_path,
            } => {
                assert_eq!(dependent_path, "Wife.Husband");
                assert_eq!(principal_path, "Husband.Wife");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolved_one_to_one_passes() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Husband"))
            .with(TypeDescriptor::new("Wife"));
        let mut builder = builder(catalog, Rc::new(RelationshipValidationConvention));
        let husband = builder.entity("Husband", ConfigurationSource::Explicit).unwrap().unwrap();
        let wife = builder.entity("Wife", ConfigurationSource::Explicit).unwrap().unwrap();
        let fk = builder
            .relationship(husband, wife, Some("Husband"), Some("Wife"), true, ConfigurationSource::Convention)
            .unwrap()
            .unwrap();
        builder.has_principal_end(fk, wife, ConfigurationSource::Explicit).unwrap();
        builder.finalize().unwrap();
    }

    #[test]
    fn test_ignoring_inherited_member_fails() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Animal").with_member(MemberDescriptor::property(
                "Name",
                MemberType::scalar(ScalarKind::String),
            )))
            .with(TypeDescriptor::new("Cat").with_base("Animal"));
        let mut builder = builder(catalog, Rc::new(IgnoredMembersValidationConvention));
        let animal = builder.entity("Animal", ConfigurationSource::Explicit).unwrap().unwrap();
        let cat = builder.entity("Cat", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .has_base_type(cat, Some(animal), ConfigurationSource::Explicit)
            .unwrap();
        builder.property(animal, "Name", ConfigurationSource::Explicit).unwrap();
        builder.ignore_member(cat, "Name", ConfigurationSource::Explicit).unwrap();

        match builder.finalize().unwrap_err() {
            Error::InheritedMemberIgnored {
                member,
                entity_type,
                declaring_type,
            } => {
                assert_eq!(member, "Name");
                assert_eq!(entity_type, "Cat");
                assert_eq!(declaring_type, "Animal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
