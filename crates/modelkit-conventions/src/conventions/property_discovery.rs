//! Scalar property discovery.

use super::{mapped_base_runtime_types, runtime_type_of};
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{ConfigurationSource, EntityTypeId, Result};

/// Maps every non-static scalar member of the runtime type, and of runtime bases no
/// mapped base type covers, as a property.
pub struct PropertyDiscoveryConvention;

impl PropertyDiscoveryConvention {
    fn discover(
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let model = builder.model();
        let Some(runtime_type) = runtime_type_of(model, entity) else {
            return Ok(());
        };
        let mapped_bases = mapped_base_runtime_types(model, entity);
        let mut candidates: Vec<String> = Vec::new();
        for found in builder
            .catalog()
            .runtime_members(&runtime_type, |base| mapped_bases.contains(base))
        {
            let member = found.member();
            if member.is_static || member.ty.as_scalar().is_none() {
                continue;
            }
            if candidates.contains(&member.name)
                || model.is_member_ignored_in_hierarchy(entity, &member.name)
                || model.find_property(entity, &member.name).is_some()
            {
                continue;
            }
            candidates.push(member.name.clone());
        }

        for name in candidates {
            builder.property(entity, &name, ConfigurationSource::Convention)?;
            if !builder.model().contains_entity_type(entity) {
                ctx.stop_processing_with(None);
                break;
            }
        }
        Ok(())
    }
}

impl Convention for PropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "PropertyDiscoveryConvention"
    }

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Self::discover(builder, entity, ctx)
    }

    fn on_base_type_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _previous: Option<EntityTypeId>,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Self::discover(builder, entity, ctx)
    }
}
