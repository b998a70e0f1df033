//! Property facets from annotations and nullability markers.

use super::attribute::PropertyAttributeConvention;
use super::runtime_type_of;
use crate::attributes::AttributeReader;
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::nullability::NullabilityReader;
use modelkit_core::{
    ColumnAttribute, ConfigurationSource, MaxLengthAttribute, PropertyId, RequiredAttribute, Result,
};
use std::rc::Rc;

pub fn required_property_attribute_convention(
    attributes: Rc<dyn AttributeReader>,
) -> PropertyAttributeConvention<RequiredAttribute> {
    PropertyAttributeConvention::new(
        "RequiredPropertyAttributeConvention",
        attributes,
        |builder, property, _, _| {
            builder.is_property_required(property, true, ConfigurationSource::DataAnnotation);
            Ok(())
        },
    )
}

/// `None` in the annotation means unbounded.
pub fn max_length_attribute_convention(
    attributes: Rc<dyn AttributeReader>,
) -> PropertyAttributeConvention<MaxLengthAttribute> {
    PropertyAttributeConvention::new(
        "MaxLengthAttributeConvention",
        attributes,
        |builder, property, attribute: &MaxLengthAttribute, _| {
            builder.has_max_length(property, attribute.length, ConfigurationSource::DataAnnotation);
            Ok(())
        },
    )
}

/// Applies the store type override. Column names are left to the provider.
pub fn column_attribute_convention(
    attributes: Rc<dyn AttributeReader>,
) -> PropertyAttributeConvention<ColumnAttribute> {
    PropertyAttributeConvention::new(
        "ColumnAttributeConvention",
        attributes,
        |builder, property, attribute: &ColumnAttribute, _| {
            if let Some(store_type) = attribute.type_name.as_deref() {
                builder.has_column_type(property, Some(store_type), ConfigurationSource::DataAnnotation);
            }
            Ok(())
        },
    )
}

/// Makes reference-like scalar properties required when nullability markers declare
/// their member non-nullable.
pub struct NonNullablePropertyConvention {
    nullability: Rc<dyn NullabilityReader>,
}

impl NonNullablePropertyConvention {
    pub fn new(nullability: Rc<dyn NullabilityReader>) -> Self {
        Self { nullability }
    }
}

impl Convention for NonNullablePropertyConvention {
    fn name(&self) -> &'static str {
        "NonNullablePropertyConvention"
    }

    fn on_property_added(
        &self,
        builder: &mut ModelBuilder,
        property: PropertyId,
        _ctx: &mut ConventionContext<PropertyId>,
    ) -> Result<()> {
        if !builder.config().honor_nullable_markers {
            return Ok(());
        }
        let model = builder.model();
        let Some(p) = model.property(property) else {
            return Ok(());
        };
        if p.is_shadow() || !p.scalar().is_some_and(|s| s.is_reference()) {
            return Ok(());
        }
        let Some(runtime_type) = runtime_type_of(model, p.declaring_type()) else {
            return Ok(());
        };
        if self.nullability.is_non_nullable(&runtime_type, p.name()) {
            builder.is_property_required(property, true, ConfigurationSource::Convention);
        }
        Ok(())
    }
}
