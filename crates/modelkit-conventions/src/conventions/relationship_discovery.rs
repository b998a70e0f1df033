//! Navigation and relationship discovery.
//!
//! Reference and collection members of a runtime type become navigations. For each
//! one the target type is searched for members pointing back; a single candidate is
//! paired as the inverse navigation, several are reported and left unpaired.
//! Reference-to-reference pairs become one-to-one relationships whose principal end
//! stays unresolved until a foreign key property or a required marker settles it.

use super::{mapped_base_runtime_types, runtime_type_of};
use crate::attributes::{AttributeReader, AttributeTarget, has_attribute};
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::diagnostics::DiagnosticKind;
use modelkit_core::{ConfigurationSource, EntityTypeId, Model, OwnedAttribute, Result, TypeCatalog};
use std::rc::Rc;

/// A navigation member found on a runtime type.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NavigationCandidate {
    name: String,
    target: String,
    collection: bool,
}

/// Turns navigation members into relationships and ownerships.
pub struct RelationshipDiscoveryConvention {
    attributes: Rc<dyn AttributeReader>,
}

impl RelationshipDiscoveryConvention {
    pub fn new(attributes: Rc<dyn AttributeReader>) -> Self {
        Self { attributes }
    }

    /// Navigation members of `entity`'s runtime type not yet mapped.
    fn candidates(model: &Model, catalog: &TypeCatalog, entity: EntityTypeId) -> Vec<NavigationCandidate> {
        let Some(runtime_type) = runtime_type_of(model, entity) else {
            return Vec::new();
        };
        let mapped_bases = mapped_base_runtime_types(model, entity);
        let mut candidates: Vec<NavigationCandidate> = Vec::new();
        for found in catalog.runtime_members(&runtime_type, |base| mapped_bases.contains(base)) {
            let member = found.member();
            let Some(target) = member.ty.navigation_target() else {
                continue;
            };
            if member.is_static
                || candidates.iter().any(|c| c.name == member.name)
                || !Self::is_unmapped(model, entity, &member.name)
            {
                continue;
            }
            candidates.push(NavigationCandidate {
                name: member.name.clone(),
                target: target.to_string(),
                collection: member.ty.is_collection(),
            });
        }
        candidates
    }

    fn is_unmapped(model: &Model, entity: EntityTypeId, name: &str) -> bool {
        !model.is_member_ignored_in_hierarchy(entity, name)
            && model.find_navigation(entity, name).is_none()
            && model.find_property(entity, name).is_none()
    }

    fn is_owned_target(&self, model: &Model, target: &str) -> bool {
        has_attribute::<OwnedAttribute>(self.attributes.as_ref(), AttributeTarget::Type(target))
            || model.owned_type_source(target).is_some()
            || model.has_weak_entity_types(target)
            || model
                .find_entity_type(target)
                .is_some_and(|t| model.find_ownership(t).is_some())
    }

    fn discover(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let candidates = Self::candidates(builder.model(), builder.catalog(), entity);
        for candidate in candidates {
            if !builder.model().contains_entity_type(entity) {
                ctx.stop_processing_with(None);
                return Ok(());
            }
            self.discover_navigation(builder, entity, &candidate)?;
        }
        Ok(())
    }

    fn discover_navigation(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        candidate: &NavigationCandidate,
    ) -> Result<()> {
        let model = builder.model();
        if !Self::is_unmapped(model, entity, &candidate.name)
            || !builder.catalog().contains(&candidate.target)
            || model.ignored_type_source(&candidate.target).is_some()
        {
            return Ok(());
        }
        let Some(runtime_type) = runtime_type_of(model, entity) else {
            return Ok(());
        };

        if self.is_owned_target(model, &candidate.target) {
            if candidate.target != runtime_type {
                builder.owns(
                    entity,
                    &candidate.name,
                    &candidate.target,
                    candidate.collection,
                    ConfigurationSource::Convention,
                )?;
            }
            return Ok(());
        }

        let Some(target) = builder.entity(&candidate.target, ConfigurationSource::Convention)? else {
            return Ok(());
        };
        let inverses = Self::inverse_candidates(builder, entity, &runtime_type, target, candidate);
        let name = candidate.name.as_str();
        match inverses.as_slice() {
            [] => Self::unidirectional(builder, entity, target, candidate),
            [inverse] => match (candidate.collection, inverse.collection) {
                (true, true) => {
                    let model = builder.model();
                    let mut paths = [
                        format!("{}.{}", model.entity_type_name(entity), name),
                        format!("{}.{}", model.entity_type_name(target), inverse.name),
                    ];
                    paths.sort();
                    let message = format!(
                        "navigations '{}' and '{}' are both collections; \
                         many-to-many relationships are not mapped by convention",
                        paths[0], paths[1]
                    );
                    builder
                        .diagnostics_mut()
                        .record_once(DiagnosticKind::ManyToManyNotSupported, message);
                    Ok(())
                }
                (true, false) => builder
                    .relationship(
                        entity,
                        target,
                        Some(inverse.name.as_str()),
                        Some(name),
                        false,
                        ConfigurationSource::Convention,
                    )
                    .map(drop),
                (false, true) => builder
                    .relationship(
                        target,
                        entity,
                        Some(name),
                        Some(inverse.name.as_str()),
                        false,
                        ConfigurationSource::Convention,
                    )
                    .map(drop),
                (false, false) => builder
                    .relationship(
                        target,
                        entity,
                        Some(name),
                        Some(inverse.name.as_str()),
                        true,
                        ConfigurationSource::Convention,
                    )
                    .map(drop),
            },
            several => {
                let names: Vec<&str> = several.iter().map(|c| c.name.as_str()).collect();
                let message = format!(
                    "navigation '{}.{}' has several inverse candidates on '{}': {}",
                    builder.model().entity_type_name(entity),
                    name,
                    builder.model().entity_type_name(target),
                    names.join(", ")
                );
                builder
                    .diagnostics_mut()
                    .record_once(DiagnosticKind::MultipleInverseCandidates, message);
                Self::unidirectional(builder, entity, target, candidate)
            }
        }
    }

    /// Members of the target's runtime type pointing back at `runtime_type`.
    fn inverse_candidates(
        builder: &ModelBuilder,
        entity: EntityTypeId,
        runtime_type: &str,
        target: EntityTypeId,
        candidate: &NavigationCandidate,
    ) -> Vec<NavigationCandidate> {
        let model = builder.model();
        Self::candidates(model, builder.catalog(), target)
            .into_iter()
            .filter(|c| c.target == runtime_type)
            .filter(|c| !(target == entity && c.name == candidate.name))
            .collect()
    }

    fn unidirectional(
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        target: EntityTypeId,
        candidate: &NavigationCandidate,
    ) -> Result<()> {
        let name = Some(candidate.name.as_str());
        if candidate.collection {
            builder.relationship(entity, target, None, name, false, ConfigurationSource::Convention)?;
        } else {
            builder.relationship(target, entity, name, None, false, ConfigurationSource::Convention)?;
        }
        Ok(())
    }
}

impl Convention for RelationshipDiscoveryConvention {
    fn name(&self) -> &'static str {
        "RelationshipDiscoveryConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        self.discover(builder, entity, ctx)
    }

    fn on_base_type_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _previous: Option<EntityTypeId>,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        self.discover(builder, entity, ctx)
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
        AttributeData, MemberDescriptor, MemberType, NavigationEnd, TypeDescriptor,
    };
    use std::sync::Arc;

    fn builder(catalog: TypeCatalog) -> ModelBuilder {
        let catalog = Arc::new(catalog);
        let attributes: Rc<dyn AttributeReader> =
            Rc::new(DescriptorAttributeReader::new(Arc::clone(&catalog)));
        let convention: Rc<dyn Convention> =
            Rc::new(RelationshipDiscoveryConvention::new(attributes));
        let mut set = ConventionSet::new();
        set.push(EventKind::EntityTypeAdded, convention);
        ModelBuilder::with_conventions(catalog, Rc::new(set), ConventionConfig::new())
    }

    fn nav(name: &str, ty: MemberType) -> MemberDescriptor {
        MemberDescriptor::property(name, ty)
    }

    fn blogging() -> TypeCatalog {
        TypeCatalog::new()
            .with(TypeDescriptor::new("Blog").with_member(nav("Posts", MemberType::collection("Post"))))
            .with(TypeDescriptor::new("Post").with_member(nav("Blog", MemberType::reference("Blog"))))
    }

    #[test]
    fn test_collection_and_reference_pair_up() {
        let mut builder = builder(blogging());
        let blog = builder.entity("Blog", ConfigurationSource::Explicit).unwrap().unwrap();
        let model = builder.model();
        let post = model.find_entity_type("Post").unwrap();
        assert_eq!(model.foreign_key_ids().len(), 1);

        let posts = model.find_navigation(blog, "Posts").unwrap();
        let view = model.navigation(posts).unwrap();
        assert!(view.is_collection());
        assert_eq!(view.target_type(), post);
        let inverse = model.navigation(view.inverse().unwrap()).unwrap();
        assert_eq!(inverse.name(), "Blog");
        assert!(inverse.is_dependent_to_principal());
        assert_eq!(view.foreign_key().principal_end_source(), Some(ConfigurationSource::Convention));
    }

    #[test]
    fn test_discovery_from_either_end_gives_one_relationship() {
        let mut builder = builder(blogging());
        builder.entity("Post", ConfigurationSource::Explicit).unwrap();
        let model = builder.model();
        assert_eq!(model.foreign_key_ids().len(), 1);
        let (_, fk) = model.foreign_keys().next().unwrap();
        assert_eq!(model.entity_type_name(fk.principal()), "Blog");
        assert_eq!(model.entity_type_name(fk.dependent()), "Post");
    }

    #[test]
    fn test_reference_pair_leaves_principal_unresolved() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Person").with_member(nav("Passport", MemberType::reference("Passport"))))
            .with(TypeDescriptor::new("Passport").with_member(nav("Holder", MemberType::reference("Person"))));
        let mut builder = builder(catalog);
        builder.entity("Person", ConfigurationSource::Explicit).unwrap();
        let (_, fk) = builder.model().foreign_keys().next().unwrap();
        assert!(fk.is_unique());
        assert_eq!(fk.principal_end_source(), None);
    }

    #[test]
    fn test_self_reference_is_unidirectional() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Employee").with_member(nav("Manager", MemberType::reference("Employee"))),
        );
        let mut builder = builder(catalog);
        let employee = builder.entity("Employee", ConfigurationSource::Explicit).unwrap().unwrap();
        let reference = builder.model().find_navigation(employee, "Manager").unwrap();
        assert_eq!(reference.end, NavigationEnd::DependentToPrincipal);
        let view = builder.model().navigation(reference).unwrap();
        assert_eq!(view.target_type(), employee);
        assert_eq!(view.inverse(), None);
    }

    #[test]
    fn test_many_to_many_is_reported_once() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Student").with_member(nav("Courses", MemberType::collection("Course"))))
            .with(TypeDescriptor::new("Course").with_member(nav("Students", MemberType::collection("Student"))));
        let mut builder = builder(catalog);
        builder.entity("Student", ConfigurationSource::Explicit).unwrap();
        assert!(builder.model().find_entity_type("Course").is_some());
        assert_eq!(builder.model().foreign_key_ids().len(), 0);
        assert_eq!(builder.diagnostics().count(DiagnosticKind::ManyToManyNotSupported), 1);
    }

    #[test]
    fn test_several_inverse_candidates_stay_unpaired() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("User").with_member(nav("Messages", MemberType::collection("Message"))))
            .with(
                TypeDescriptor::new("Message")
                    .with_member(nav("Sender", MemberType::reference("User")))
                    .with_member(nav("Recipient", MemberType::reference("User"))),
            );
        let mut builder = builder(catalog);
        builder.entity("User", ConfigurationSource::Explicit).unwrap();
        assert_eq!(builder.diagnostics().count(DiagnosticKind::MultipleInverseCandidates), 1);
        let model = builder.model();
        assert_eq!(model.foreign_key_ids().len(), 3);
        for (_, fk) in model.foreign_keys() {
            let ends = [fk.dependent_to_principal(), fk.principal_to_dependent()];
            assert_eq!(ends.iter().flatten().count(), 1);
        }
    }

    #[test]
    fn test_owned_target_becomes_ownership() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Customer").with_member(nav("Address", MemberType::reference("Address"))))
            .with(TypeDescriptor::new("Address").with_attribute(AttributeData::owned()));
        let mut builder = builder(catalog);
        let customer = builder.entity("Customer", ConfigurationSource::Explicit).unwrap().unwrap();
        let reference = builder.model().find_navigation(customer, "Address").unwrap();
        assert_eq!(reference.end, NavigationEnd::PrincipalToDependent);
        let fk = builder.model().foreign_key(reference.foreign_key).unwrap();
        assert!(fk.is_ownership());
        assert!(fk.is_unique());
        assert!(builder.model().is_owned(fk.dependent()));
    }
}
