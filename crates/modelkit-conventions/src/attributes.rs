//! Attribute reader capability.
//!
//! Conventions never look at the type catalog's annotation lists directly. They ask
//! an [`AttributeReader`] for the annotations on a type or member, so the source of
//! annotations can be swapped without touching any rule.

use modelkit_core::{AttributeData, DataAnnotation, TypeCatalog};
use std::sync::Arc;

/// What to read annotations from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget<'a> {
    /// The type itself.
    Type(&'a str),
    /// A member of the type, searched through its runtime base types.
    Member { type_name: &'a str, member: &'a str },
}

/// Returns the annotations declared on a type or member.
pub trait AttributeReader {
    fn attributes(&self, target: AttributeTarget<'_>) -> Vec<AttributeData>;
}

/// Find and decode the first annotation of kind `A` on `target`.
pub fn find_attribute<A: DataAnnotation>(
    reader: &dyn AttributeReader,
    target: AttributeTarget<'_>,
) -> Option<A> {
    A::find_in(&reader.attributes(target))
}

/// Whether `target` carries an annotation of kind `A`.
pub fn has_attribute<A: DataAnnotation>(
    reader: &dyn AttributeReader,
    target: AttributeTarget<'_>,
) -> bool {
    find_attribute::<A>(reader, target).is_some()
}

/// Reads annotations from a [`TypeCatalog`].
#[derive(Debug, Clone)]
pub struct DescriptorAttributeReader {
    catalog: Arc<TypeCatalog>,
}

impl DescriptorAttributeReader {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }
}

impl AttributeReader for DescriptorAttributeReader {
    fn attributes(&self, target: AttributeTarget<'_>) -> Vec<AttributeData> {
        match target {
            AttributeTarget::Type(name) => self
                .catalog
                .get(name)
                .map(|t| t.attributes.clone())
                .unwrap_or_default(),
            AttributeTarget::Member { type_name, member } => self
                .catalog
                .find_member(type_name, member)
                .map(|m| m.member().attributes.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_core::{
        KeyAttribute, MaxLengthAttribute, MemberDescriptor, MemberType, NotMappedAttribute,
        ScalarKind, TypeDescriptor,
    };

    fn reader() -> DescriptorAttributeReader {
        let catalog = TypeCatalog::new()
            .with(
                TypeDescriptor::new("Base").with_member(
                    MemberDescriptor::property("Code", MemberType::scalar(ScalarKind::String))
                        .with_attribute(AttributeData::max_length(Some(8))),
                ),
            )
            .with(
                TypeDescriptor::new("Audit")
                    .with_base("Base")
                    .with_attribute(AttributeData::not_mapped())
                    .with_member(
                        MemberDescriptor::property("Id", MemberType::scalar(ScalarKind::I32))
                            .with_attribute(AttributeData::key()),
                    ),
            );
        DescriptorAttributeReader::new(Arc::new(catalog))
    }

    #[test]
    fn test_type_and_member_targets() {
        let reader = reader();
        assert!(has_attribute::<NotMappedAttribute>(&reader, AttributeTarget::Type("Audit")));
        assert!(has_attribute::<KeyAttribute>(
            &reader,
            AttributeTarget::Member { type_name: "Audit", member: "Id" }
        ));
        assert!(!has_attribute::<KeyAttribute>(&reader, AttributeTarget::Type("Missing")));
    }

    #[test]
    fn test_member_lookup_walks_base_types() {
        let reader = reader();
        let max = find_attribute::<MaxLengthAttribute>(
            &reader,
            AttributeTarget::Member { type_name: "Audit", member: "Code" },
        );
        assert_eq!(max, Some(MaxLengthAttribute { length: Some(8) }));
    }
}
