//! Primary keys from key annotations.

use super::runtime_type_of;
use crate::attributes::{AttributeReader, AttributeTarget, has_attribute};
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use modelkit_core::{
    ConfigurationSource, EntityTypeId, Error, KeyAttribute, Model, PropertyId, Result,
};
use std::rc::Rc;

/// Builds the primary key from key-annotated properties.
///
/// A single annotated property on a root type becomes the key. Further annotated
/// properties merge into it, ordered by name case-insensitively. At model-built time
/// an annotation on a derived type, or a composite key made purely of annotations,
/// is a configuration error.
pub struct KeyAttributeConvention {
    attributes: Rc<dyn AttributeReader>,
}

impl KeyAttributeConvention {
    pub fn new(attributes: Rc<dyn AttributeReader>) -> Self {
        Self { attributes }
    }

    fn is_annotated(&self, model: &Model, property: PropertyId) -> bool {
        let Some(p) = model.property(property) else {
            return false;
        };
        if p.is_shadow() {
            return false;
        }
        let Some(runtime_type) = runtime_type_of(model, p.declaring_type()) else {
            return false;
        };
        has_attribute::<KeyAttribute>(
            self.attributes.as_ref(),
            AttributeTarget::Member {
                type_name: &runtime_type,
                member: p.name(),
            },
        )
    }
}

/// Sorts key property names case-insensitively, dropping duplicates.
fn merge_key_names(mut names: Vec<String>) -> Vec<String> {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names.dedup();
    names
}

impl Convention for KeyAttributeConvention {
    fn name(&self) -> &'static str {
        "KeyAttributeConvention"
    }

    fn on_property_added(
        &self,
        builder: &mut ModelBuilder,
        property: PropertyId,
        _ctx: &mut ConventionContext<PropertyId>,
    ) -> Result<()> {
        let model = builder.model();
        if !self.is_annotated(model, property) {
            return Ok(());
        }
        let Some(p) = model.property(property) else {
            return Ok(());
        };
        let entity = p.declaring_type();
        let Some(et) = model.entity_type(entity) else {
            return Ok(());
        };
        // Derived types are reported at model-built time.
        if et.base_type().is_some() {
            return Ok(());
        }

        let properties = match et.primary_key_source() {
            Some(ConfigurationSource::Explicit) => return Ok(()),
            Some(ConfigurationSource::DataAnnotation) => {
                let mut names = model.primary_key_names(entity);
                names.push(p.name().to_string());
                let merged = merge_key_names(names);
                let resolved: Option<Vec<PropertyId>> = merged
                    .iter()
                    .map(|name| model.find_property(entity, name))
                    .collect();
                match resolved {
                    Some(resolved) => resolved,
                    None => return Ok(()),
                }
            }
            _ => vec![property],
        };
        tracing::debug!(
            entity_type = model.entity_type_name(entity),
            properties = properties.len(),
            "primary key from key annotation"
        );
        builder.set_primary_key(entity, properties, ConfigurationSource::DataAnnotation)?;
        Ok(())
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        let model = builder.model();
        for (id, et) in model.entity_types() {
            if let Some(base) = et.base_type() {
                let annotated = et
                    .declared_properties()
                    .iter()
                    .copied()
                    .find(|p| self.is_annotated(model, *p));
                if let Some(property) = annotated {
                    return Err(Error::KeyAttributeOnDerivedEntity {
                        entity_type: et.name().to_string(),
                        property: model.property_name(property).to_string(),
                        root: model.entity_type_name(model.root_type(base)).to_string(),
                    });
                }
                continue;
            }

            if et.primary_key_source() != Some(ConfigurationSource::DataAnnotation) {
                continue;
            }
            let Some(key) = et.declared_primary_key().and_then(|k| model.key(k)) else {
                continue;
            };
            if key.properties().len() > 1
                && key.properties().iter().all(|p| self.is_annotated(model, *p))
            {
                return Err(Error::CompositeKeyWithDataAnnotation {
                    entity_type: model.entity_type_name(id).to_string(),
                    properties: model.primary_key_names(id),
                });
            }
        }
        Ok(())
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

    fn key_member(name: &str) -> MemberDescriptor {
        MemberDescriptor::property(name, MemberType::scalar(ScalarKind::String))
            .with_attribute(AttributeData::key())
    }

    fn convention(catalog: &Arc<TypeCatalog>) -> KeyAttributeConvention {
        let attributes: Rc<dyn AttributeReader> =
            Rc::new(DescriptorAttributeReader::new(Arc::clone(catalog)));
        KeyAttributeConvention::new(attributes)
    }

    fn builder(catalog: TypeCatalog) -> ModelBuilder {
        let catalog = Arc::new(catalog);
        let convention: Rc<dyn Convention> = Rc::new(convention(&catalog));
        let mut set = ConventionSet::new();
        set.push(EventKind::PropertyAdded, Rc::clone(&convention))
            .push(EventKind::ModelBuilt, convention);
        ModelBuilder::with_conventions(catalog, Rc::new(set), ConventionConfig::new())
    }

    #[test]
    fn test_merge_sorts_case_insensitively() {
        let merged = merge_key_names(vec!["b".into(), "A".into(), "c".into(), "A".into()]);
        assert_eq!(merged, vec!["A", "b", "c"]);
    }

    #[test]
    fn test_single_key_attribute_sets_primary_key() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Tag")
                .with_member(key_member("Name"))
                .with_member(MemberDescriptor::property("Id", MemberType::scalar(ScalarKind::I32))),
        );
        let mut builder = builder(catalog);
        let tag = builder.entity("Tag", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(tag, "Id", ConfigurationSource::Convention).unwrap();
        builder.property(tag, "Name", ConfigurationSource::Convention).unwrap();
        assert_eq!(builder.model().primary_key_names(tag), vec!["Name"]);
        assert_eq!(
            builder.model().entity_type(tag).unwrap().primary_key_source(),
            Some(ConfigurationSource::DataAnnotation)
        );

        builder.rediscover(tag).unwrap();
        builder.property(tag, "Name", ConfigurationSource::Convention).unwrap();
        assert_eq!(builder.model().primary_key_names(tag), vec!["Name"]);
        builder.finalize().unwrap();
    }

    #[test]
    fn test_composite_key_from_annotations_fails_at_model_built() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Line")
                .with_member(key_member("order"))
                .with_member(key_member("Number")),
        );
        let mut builder = builder(catalog);
        let line = builder.entity("Line", ConfigurationSource::Explicit).unwrap().unwrap();
        builder.property(line, "order", ConfigurationSource::Convention).unwrap();
        builder.property(line, "Number", ConfigurationSource::Convention).unwrap();
        assert_eq!(builder.model().primary_key_names(line), vec!["Number", "order"]);

        let err = builder.finalize().unwrap_err();
        assert!(matches!(err, Error::CompositeKeyWithDataAnnotation { .. }));
        assert!(err.to_string().contains("Line"));
    }

    #[test]
    fn test_key_attribute_on_derived_type_fails() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("Base").with_member(MemberDescriptor::property(
                "Id",
                MemberType::scalar(ScalarKind::I32),
            )))
            .with(TypeDescriptor::new("Derived").with_base("Base").with_member(key_member("Code")));
        let mut builder = builder(catalog);
        let base = builder.entity("Base", ConfigurationSource::Explicit).unwrap().unwrap();
        let derived = builder.entity("Derived", ConfigurationSource::Explicit).unwrap().unwrap();
        builder
            .has_base_type(derived, Some(base), ConfigurationSource::Explicit)
            .unwrap();
        builder.property(derived, "Code", ConfigurationSource::Convention).unwrap();
        assert!(builder.model().primary_key_names(base).is_empty());

        match builder.finalize().unwrap_err() {
            Error::KeyAttributeOnDerivedEntity {
                entity_type,
                property,
                root,
            } => {
                assert_eq!(entity_type, "Derived");
                assert_eq!(property, "Code");
                assert_eq!(root, "Base");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_composite_key_merge_is_idempotent() {
        let catalog = TypeCatalog::new().with(
            TypeDescriptor::new("Line")
                .with_member(key_member("order"))
                .with_member(key_member("Number"))
                .with_member(key_member("batch")),
        );
        let rerun = convention(&Arc::new(catalog.clone()));
        let mut builder = builder(catalog);
        let line = builder.entity("Line", ConfigurationSource::Explicit).unwrap().unwrap();
        for name in ["order", "Number", "batch"] {
            builder.property(line, name, ConfigurationSource::Convention).unwrap();
        }
        let expected = vec!["batch", "Number", "order"];
        assert_eq!(builder.model().primary_key_names(line), expected);

        builder.rediscover(line).unwrap();
        for name in ["batch", "order", "Number"] {
            builder.property(line, name, ConfigurationSource::Convention).unwrap();
        }
        assert_eq!(builder.model().primary_key_names(line), expected);

        for name in ["Number", "order", "batch"] {
            let property = builder.model().find_property(line, name).unwrap();
            let mut ctx = ConventionContext::new(property);
            rerun.on_property_added(&mut builder, property, &mut ctx).unwrap();
            assert_eq!(builder.model().primary_key_names(line), expected);
        }
        assert_eq!(
            builder.model().entity_type(line).unwrap().primary_key_source(),
            Some(ConfigurationSource::DataAnnotation)
        );

        match builder.finalize().unwrap_err() {
            Error::CompositeKeyWithDataAnnotation { entity_type, properties } => {
                assert_eq!(entity_type, "Line");
                assert_eq!(properties, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
