//! Built-in conventions and the default convention set.
//!
//! Each convention is a stateless struct holding the capabilities it reads from. The
//! default set registers them per event kind in the order below; plugins may reshape
//! it before it is frozen.
//!
//! | event | conventions |
//! |---|---|
//! | entity type added | not-mapped type, owned type, not-mapped member, base type discovery, property discovery, key discovery, relationship discovery, derived type discovery |
//! | entity type removed | owned types |
//! | base type changed | property discovery, key discovery, relationship discovery |
//! | member ignored | key discovery |
//! | property added | key attribute, required, max length, column, non-nullable property, key discovery |
//! | primary key changed | value generation, foreign key property discovery |
//! | foreign key added / removed / principal end changed | foreign key property discovery |
//! | ownership changed | foreign key property discovery, base type discovery |
//! | navigation added | required navigation, non-nullable navigation |
//! | model built | cleanup, relationship validation, ignored member validation, constructor binding, type mapping, key attribute |

mod attribute;
mod base_type;
mod cleanup;
mod constructor_binding;
mod foreign_key_property;
mod key_attribute;
mod key_discovery;
mod navigation_requirement;
mod owned_types;
mod property_attributes;
mod property_discovery;
mod relationship_discovery;
mod type_mapping;
mod validation;
mod value_generation;

pub use attribute::{
    EntityTypeAttributeConvention, EntityTypeAttributeHandler, NavigationAttributeConvention,
    NavigationAttributeHandler, NotMappedMemberConvention, PropertyAttributeConvention,
    PropertyAttributeHandler, not_mapped_entity_type_convention, owned_entity_type_convention,
};
pub use base_type::{BaseTypeDiscoveryConvention, DerivedTypeDiscoveryConvention};
pub use cleanup::ModelCleanupConvention;
pub use constructor_binding::ConstructorBindingConvention;
pub use foreign_key_property::ForeignKeyPropertyDiscoveryConvention;
pub use key_attribute::KeyAttributeConvention;
pub use key_discovery::KeyDiscoveryConvention;
pub use navigation_requirement::{
    NonNullableNavigationConvention, required_navigation_attribute_convention,
};
pub use owned_types::OwnedTypesConvention;
pub use property_attributes::{
    NonNullablePropertyConvention, column_attribute_convention, max_length_attribute_convention,
    required_property_attribute_convention,
};
pub use property_discovery::PropertyDiscoveryConvention;
pub use relationship_discovery::RelationshipDiscoveryConvention;
pub use type_mapping::TypeMappingConvention;
pub use validation::{IgnoredMembersValidationConvention, RelationshipValidationConvention};
pub use value_generation::ValueGenerationConvention;

use crate::convention::Convention;
use crate::dispatcher::EventKind;
use crate::services::ConventionDependencies;
use crate::set::ConventionSet;
use modelkit_core::{EntityTypeId, Model};
use std::collections::BTreeSet;
use std::rc::Rc;

/// The built-in conventions wired to `deps`.
pub fn default_convention_set(deps: &ConventionDependencies) -> ConventionSet {
    let attributes = &deps.attributes;

    let not_mapped_entity_type: Rc<dyn Convention> =
        Rc::new(not_mapped_entity_type_convention(Rc::clone(attributes)));
    let owned_entity_type: Rc<dyn Convention> =
        Rc::new(owned_entity_type_convention(Rc::clone(attributes)));
    let not_mapped_member: Rc<dyn Convention> =
        Rc::new(NotMappedMemberConvention::new(Rc::clone(attributes)));
    let base_type_discovery: Rc<dyn Convention> = Rc::new(BaseTypeDiscoveryConvention);
    let derived_type_discovery: Rc<dyn Convention> = Rc::new(DerivedTypeDiscoveryConvention);
    let property_discovery: Rc<dyn Convention> = Rc::new(PropertyDiscoveryConvention);
    let key_discovery: Rc<dyn Convention> = Rc::new(KeyDiscoveryConvention);
    let key_attribute: Rc<dyn Convention> =
        Rc::new(KeyAttributeConvention::new(Rc::clone(attributes)));
    let relationship_discovery: Rc<dyn Convention> =
        Rc::new(RelationshipDiscoveryConvention::new(Rc::clone(attributes)));
    let foreign_key_property: Rc<dyn Convention> = Rc::new(ForeignKeyPropertyDiscoveryConvention);
    let value_generation: Rc<dyn Convention> = Rc::new(ValueGenerationConvention);
    let required_property: Rc<dyn Convention> =
        Rc::new(required_property_attribute_convention(Rc::clone(attributes)));
    let max_length: Rc<dyn Convention> =
        Rc::new(max_length_attribute_convention(Rc::clone(attributes)));
    let column: Rc<dyn Convention> = Rc::new(column_attribute_convention(Rc::clone(attributes)));
    let non_nullable_property: Rc<dyn Convention> =
        Rc::new(NonNullablePropertyConvention::new(Rc::clone(&deps.nullability)));
    let required_navigation: Rc<dyn Convention> =
        Rc::new(required_navigation_attribute_convention(Rc::clone(attributes)));
    let non_nullable_navigation: Rc<dyn Convention> =
        Rc::new(NonNullableNavigationConvention::new(Rc::clone(&deps.nullability)));
    let owned_types: Rc<dyn Convention> = Rc::new(OwnedTypesConvention);

    let mut set = ConventionSet::new();
    set.push(EventKind::EntityTypeAdded, not_mapped_entity_type)
        .push(EventKind::EntityTypeAdded, owned_entity_type)
        .push(EventKind::EntityTypeAdded, not_mapped_member)
        .push(EventKind::EntityTypeAdded, Rc::clone(&base_type_discovery))
        .push(EventKind::EntityTypeAdded, Rc::clone(&property_discovery))
        .push(EventKind::EntityTypeAdded, Rc::clone(&key_discovery))
        .push(EventKind::EntityTypeAdded, Rc::clone(&relationship_discovery))
        .push(EventKind::EntityTypeAdded, derived_type_discovery);

    set.push(EventKind::EntityTypeRemoved, owned_types);

    set.push(EventKind::BaseTypeChanged, property_discovery)
        .push(EventKind::BaseTypeChanged, Rc::clone(&key_discovery))
        .push(EventKind::BaseTypeChanged, relationship_discovery);

    set.push(EventKind::EntityTypeMemberIgnored, Rc::clone(&key_discovery));

    set.push(EventKind::PropertyAdded, Rc::clone(&key_attribute))
        .push(EventKind::PropertyAdded, required_property)
        .push(EventKind::PropertyAdded, max_length)
        .push(EventKind::PropertyAdded, column)
        .push(EventKind::PropertyAdded, non_nullable_property)
        .push(EventKind::PropertyAdded, key_discovery);

    set.push(EventKind::PrimaryKeyChanged, value_generation)
        .push(EventKind::PrimaryKeyChanged, Rc::clone(&foreign_key_property));

    set.push(EventKind::ForeignKeyAdded, Rc::clone(&foreign_key_property))
        .push(EventKind::ForeignKeyRemoved, Rc::clone(&foreign_key_property))
        .push(EventKind::ForeignKeyPrincipalEndChanged, Rc::clone(&foreign_key_property));

    set.push(EventKind::ForeignKeyOwnershipChanged, foreign_key_property)
        .push(EventKind::ForeignKeyOwnershipChanged, base_type_discovery);

    set.push(EventKind::NavigationAdded, required_navigation)
        .push(EventKind::NavigationAdded, non_nullable_navigation);

    set.push(EventKind::ModelBuilt, Rc::new(ModelCleanupConvention))
        .push(EventKind::ModelBuilt, Rc::new(RelationshipValidationConvention))
        .push(EventKind::ModelBuilt, Rc::new(IgnoredMembersValidationConvention))
        .push(
            EventKind::ModelBuilt,
            Rc::new(ConstructorBindingConvention::new(Rc::clone(&deps.services))),
        )
        .push(
            EventKind::ModelBuilt,
            Rc::new(TypeMappingConvention::new(Rc::clone(&deps.type_mappings))),
        )
        .push(EventKind::ModelBuilt, key_attribute);

    set
}

// ==================== Shared helpers ====================

/// Runtime type name of a live entity type.
pub(crate) fn runtime_type_of(model: &Model, entity: EntityTypeId) -> Option<String> {
    model
        .entity_type(entity)?
        .runtime_type()
        .map(str::to_string)
}

/// Runtime type names already mapped by `entity`'s base types. Member discovery stops
/// walking the runtime base chain at the first of these.
pub(crate) fn mapped_base_runtime_types(model: &Model, entity: EntityTypeId) -> BTreeSet<String> {
    model
        .base_types(entity)
        .into_iter()
        .filter_map(|base| runtime_type_of(model, base))
        .collect()
}

/// Short display name used to build conventional member names.
pub(crate) fn short_type_name(model: &Model, entity: EntityTypeId) -> String {
    let Some(et) = model.entity_type(entity) else {
        return String::new();
    };
    let name = et.runtime_type().unwrap_or(et.name());
    name.rsplit(|c| c == '.' || c == ':').next().unwrap_or(name).to_string()
}
