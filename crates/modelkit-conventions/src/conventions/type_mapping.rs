//! Store type resolution for every property.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::type_mapping::{MappingRequest, TypeMappingSource};
use modelkit_core::{Error, Model, PropertyId, Result, ScalarKind};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Resolves a store mapping for each property through the injected source.
///
/// String properties that take part in a key or foreign key and have no configured
/// maximum length are mapped with `string_key_max_length`, so they stay indexable.
pub struct TypeMappingConvention {
    source: Rc<dyn TypeMappingSource>,
}

impl TypeMappingConvention {
    pub fn new(source: Rc<dyn TypeMappingSource>) -> Self {
        Self { source }
    }
}

fn key_properties(model: &Model) -> BTreeSet<PropertyId> {
    let mut properties = BTreeSet::new();
    for (_, et) in model.entity_types() {
        for key in et.declared_keys() {
            if let Some(key) = model.key(*key) {
                properties.extend(key.properties().iter().copied());
            }
        }
    }
    for (_, fk) in model.foreign_keys() {
        properties.extend(fk.properties().iter().copied());
    }
    properties
}

impl Convention for TypeMappingConvention {
    fn name(&self) -> &'static str {
        "TypeMappingConvention"
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        let model = builder.model();
        let in_keys = key_properties(model);
        let key_length = builder.config().string_key_max_length;

        let mut resolved = Vec::new();
        for (entity, et) in model.entity_types() {
            for &id in et.declared_properties() {
                let Some(property) = model.property(id) else {
                    continue;
                };
                let path = format!("{}.{}", model.entity_type_name(entity), property.name());
                let max_length = match property.max_length_source() {
                    Some(_) => property.max_length(),
                    None if property.scalar() == Some(ScalarKind::String) && in_keys.contains(&id) => {
                        key_length
                    }
                    None => None,
                };
                let request = MappingRequest {
                    property: &path,
                    scalar: property.scalar(),
                    column_type: property.column_type(),
                    max_length,
                };
                let Some(mapping) = self.source.find_mapping(&request)? else {
                    return Err(Error::PropertyNotMapped {
                        entity_type: et.name().to_string(),
                        property: property.name().to_string(),
                        type_name: property.runtime_type_name().to_string(),
                    });
                };
                tracing::trace!(property = %path, store_type = %mapping.store_type, "type mapped");
                resolved.push((id, mapping));
            }
        }

        for (id, mapping) in resolved {
            builder.has_type_mapping(id, Some(mapping));
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
    use crate::type_mapping::DefaultTypeMappingSource;
    use modelkit_core::{
        ConfigurationSource, EntityTypeId, MemberDescriptor, MemberType, TypeCatalog,
        TypeDescriptor,
    };
    use std::sync::Arc;

    fn builder(config: ConventionConfig) -> (ModelBuilder, EntityTypeId) {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Tag")
                .with_member(MemberDescriptor::property("Code", MemberType::scalar(ScalarKind::String)))
                .with_member(MemberDescriptor::property("Label", MemberType::scalar(ScalarKind::String)))
                .with_member(MemberDescriptor::property("Weight", MemberType::scalar(ScalarKind::Decimal)))
                .with_member(MemberDescriptor::property("Shape", MemberType::other("Polygon"))),
        );
        let source: Rc<dyn TypeMappingSource> = Rc::new(DefaultTypeMappingSource::new());
        let mut set = ConventionSet::new();
        set.push(EventKind::ModelBuilt, Rc::new(TypeMappingConvention::new(source)));
        let mut builder = ModelBuilder::with_conventions(Arc::new(catalog), Rc::new(set), config);
        let tag = builder.entity("Tag", ConfigurationSource::Explicit).unwrap().unwrap();
        let code = builder.property(tag, "Code", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(tag, "Label", ConfigurationSource::Explicit).unwrap();
        builder.property(tag, "Weight", ConfigurationSource::Explicit).unwrap();
        builder
            .set_primary_key(tag, vec![code], ConfigurationSource::Explicit)
            .unwrap();
        (builder, tag)
    }

    fn store_type(model: &Model, tag: EntityTypeId, name: &str) -> String {
        let property = model.property(model.find_property(tag, name).unwrap()).unwrap();
        property.type_mapping().unwrap().store_type.clone()
    }

    #[test]
    fn test_properties_are_mapped() {
        let (builder, tag) = builder(ConventionConfig::new().string_key_max_length(Some(255)));
        let model = builder.finalize().unwrap().into_model();
        assert_eq!(store_type(&model, tag, "Code"), "varchar(255)");
        assert_eq!(store_type(&model, tag, "Label"), "text");
        assert_eq!(store_type(&model, tag, "Weight"), "decimal(18,2)");
    }

    #[test]
    fn test_configured_facets_win() {
        let (mut builder, tag) = builder(ConventionConfig::new().string_key_max_length(None));
        let label = builder.model().find_property(tag, "Label").unwrap();
        builder.has_max_length(label, Some(40), ConfigurationSource::Explicit);
        let weight = builder.model().find_property(tag, "Weight").unwrap();
        builder.has_column_type(weight, Some("numeric(8,3)"), ConfigurationSource::Explicit);

        let model = builder.finalize().unwrap().into_model();
        assert_eq!(store_type(&model, tag, "Code"), "text");
        assert_eq!(store_type(&model, tag, "Label"), "varchar(40)");
        assert_eq!(store_type(&model, tag, "Weight"), "numeric(8,3)");
    }

    #[test]
    fn test_unmappable_property_fails() {
        let (mut builder, tag) = builder(ConventionConfig::new());
        builder.property(tag, "Shape", ConfigurationSource::Explicit).unwrap();
        match builder.finalize().unwrap_err() {
            Error::PropertyNotMapped {
                entity_type,
                property,
                type_name,
            } => {
                assert_eq!(entity_type, "Tag");
                assert_eq!(property, "Shape");
                assert_eq!(type_name, "Polygon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
