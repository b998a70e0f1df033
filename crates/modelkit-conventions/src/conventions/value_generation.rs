//! Store-generated key values.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{
    ConfigurationSource, EntityTypeId, KeyId, Model, PropertyId, Result, ScalarKind, ValueGenerated,
};

/// Marks a single integer or UUID primary key property as generated on add, unless
/// it also takes part in a foreign key. Properties that stop being the key lose the
/// setting again.
pub struct ValueGenerationConvention;

fn generates_on_add(model: &Model, entity: EntityTypeId, property: PropertyId) -> bool {
    let Some(p) = model.property(property) else {
        return false;
    };
    let kind_fits = p
        .scalar()
        .is_some_and(|s| s.is_integer() || s == ScalarKind::Uuid);
    let in_foreign_key = model
        .foreign_keys()
        .any(|(_, fk)| fk.dependent() == entity && fk.properties().contains(&property));
    kind_fits && !in_foreign_key
}

impl Convention for ValueGenerationConvention {
    fn name(&self) -> &'static str {
        "ValueGenerationConvention"
    }

    fn on_primary_key_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _previous: Option<KeyId>,
        previous_properties: &[PropertyId],
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        for property in previous_properties {
            let convention_set = builder
                .model()
                .property(*property)
                .is_some_and(|p| p.value_generated_source() == Some(ConfigurationSource::Convention));
            if convention_set {
                builder.value_generated(*property, ValueGenerated::Never, ConfigurationSource::Convention);
            }
        }

        let model = builder.model();
        let Some(key) = model.find_primary_key(entity).and_then(|k| model.key(k)) else {
            return Ok(());
        };
        let [property] = key.properties() else {
            return Ok(());
        };
        let property = *property;
        if !generates_on_add(model, entity, property) {
            return Ok(());
        }
        tracing::trace!(
            entity_type = model.entity_type_name(entity),
            property = model.property_name(property),
            "value generated on add"
        );
        builder.value_generated(property, ValueGenerated::OnAdd, ConfigurationSource::Convention);
        Ok(())
    }
}
