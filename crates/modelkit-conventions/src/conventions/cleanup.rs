//! Final pruning of the model.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{ConfigurationSource, EntityTypeId, ForeignKeyId, Model, Result};
use std::collections::{BTreeSet, VecDeque};

/// Removes foreign keys left without navigations, then entity types discovered by
/// convention that cannot be reached from any explicitly or annotation-configured
/// type. Both steps can be switched off in the configuration.
pub struct ModelCleanupConvention;

/// Entity types reachable from the configured roots through navigations, the type
/// hierarchy and ownership.
fn reachable(model: &Model) -> BTreeSet<EntityTypeId> {
    let mut seen: BTreeSet<EntityTypeId> = BTreeSet::new();
    let mut queue: VecDeque<EntityTypeId> = model
        .entity_types()
        .filter(|(_, e)| e.source() >= ConfigurationSource::DataAnnotation)
        .map(|(id, _)| id)
        .collect();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let mut next = model.navigation_neighbors(id);
        next.extend(model.base_types(id));
        next.extend(model.derived_types(id));
        if let Some(owner) = model
            .entity_type(id)
            .and_then(|e| e.defining_navigation())
            .map(|d| d.owner)
        {
            next.push(owner);
        }
        queue.extend(next.into_iter().filter(|n| !seen.contains(n)));
    }
    seen
}

impl ModelCleanupConvention {
    fn prune_navigationless_foreign_keys(builder: &mut ModelBuilder) -> Result<()> {
        let orphaned: Vec<ForeignKeyId> = builder
            .model()
            .foreign_keys()
            .filter(|(_, fk)| fk.has_no_navigations() && !fk.is_ownership())
            .map(|(id, _)| id)
            .collect();
        for fk in orphaned {
            tracing::debug!(%fk, "removing foreign key without navigations");
            builder.remove_foreign_key(fk, ConfigurationSource::Explicit)?;
        }
        Ok(())
    }

    fn remove_unreachable_types(builder: &mut ModelBuilder) -> Result<()> {
        let model = builder.model();
        let reachable = reachable(model);
        let unreachable: Vec<EntityTypeId> = model
            .entity_types()
            .filter(|(id, e)| !reachable.contains(id) && e.source() == ConfigurationSource::Convention)
            .map(|(id, _)| id)
            .collect();
        for entity in unreachable {
            if !builder.model().contains_entity_type(entity) {
                continue;
            }
            tracing::debug!(
                entity_type = builder.model().entity_type_name(entity),
                "removing unreachable entity type"
            );
            builder.remove_entity_type(entity, ConfigurationSource::Convention)?;
        }
        Ok(())
    }
}

impl Convention for ModelCleanupConvention {
    fn name(&self) -> &'static str {
        "ModelCleanupConvention"
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        if builder.config().prune_navigationless_foreign_keys {
            Self::prune_navigationless_foreign_keys(builder)?;
        }
        if builder.config().remove_unreachable_types {
            Self::remove_unreachable_types(builder)?;
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

    fn builder(config: ConventionConfig) -> ModelBuilder {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Order"))
            .with(TypeDescriptor::new("Line"))
            .with(TypeDescriptor::new("Audit"))
            .with(TypeDescriptor::new("Tag"));
        let mut set = ConventionSet::new();
        set.push(EventKind::ModelBuilt, Rc::new(ModelCleanupConvention));
        ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), config)
    }

    #[test]
    fn test_unreachable_convention_types_are_removed() {
        let mut builder = builder(ConventionConfig::new());
        let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
        let line = builder.entity("Line", ConfigurationSource::Convention).unwrap().unwrap();
        builder.entity("Audit", ConfigurationSource::Convention).unwrap();
        builder.entity("Tag", ConfigurationSource::DataAnnotation).unwrap();
        builder
            .relationship(order, line, None, Some("Lines"), false, ConfigurationSource::Convention)
            .unwrap();

        let model = builder.finalize().unwrap().into_model();
        assert!(model.find_entity_type("Order").is_some());
        assert!(model.find_entity_type("Line").is_some());
        assert!(model.find_entity_type("Tag").is_some());
        assert!(model.find_entity_type("Audit").is_none());
    }

    #[test]
    fn test_navigationless_foreign_keys_are_pruned() {
        let mut builder = builder(ConventionConfig::new());
        let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
        let line = builder.entity("Line", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .relationship(order, line, None, None, false, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();
        builder
            .relationship(order, line, Some("Order"), None, false, ConfigurationSource::Explicit)
            .unwrap()
            .unwrap();

        let model = builder.finalize().unwrap().into_model();
        assert_eq!(model.foreign_key_ids().len(), 1);
    }

    #[test]
    fn test_cleanup_can_be_disabled() {
        let config = ConventionConfig::new()
            .remove_unreachable_types(false)
            .prune_navigationless_foreign_keys(false);
        let mut builder = builder(config);
        let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
        let line = builder.entity("Line", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.entity("Audit", ConfigurationSource::Convention).unwrap();
        builder
            .relationship(order, line, None, None, false, ConfigurationSource::Explicit)
            .unwrap();

        let model = builder.finalize().unwrap().into_model();
        assert!(model.find_entity_type("Audit").is_some());
        assert_eq!(model.foreign_key_ids().len(), 1);
    }
}
