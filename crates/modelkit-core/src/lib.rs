//! Core types for Modelkit.
//!
//! `modelkit-core` is the **foundation layer** of the model-building pipeline. It owns
//! the mutable metadata graph and the plain data types every other crate shares.
//!
//! # Role In The Architecture
//!
//! - **Metadata graph**: `Model` stores entity types, properties, keys and foreign keys
//!   in append-only arenas addressed by copyable handles (`EntityTypeId`, `PropertyId`,
//!   `KeyId`, `ForeignKeyId`). Cross-entity edges are handles, never owning links.
//! - **Precedence**: `ConfigurationSource` orders who set a fact
//!   (`Convention < DataAnnotation < Explicit`).
//! - **Runtime shapes**: `TypeCatalog` and `TypeDescriptor` describe the annotated
//!   types that conventions inspect; `AttributeData` is the raw annotation payload.
//! - **Outbound annotations**: `TypeMapping` and `ConstructorBinding` are attached to
//!   properties and entity types for the provider layer.
//!
//! The graph's mutators are *raw*: they never raise events. `modelkit-conventions`
//! wraps them in an event-raising builder.

pub mod arena;
pub mod attribute;
pub mod descriptor;
pub mod error;
pub mod metadata;
pub mod snapshot;
pub mod source;

pub use arena::{Arena, ArenaId};
pub use attribute::{
    AttributeData, AttributeField, AttributeValue, ColumnAttribute, DataAnnotation,
    KeyAttribute, MaxLengthAttribute, NotMappedAttribute, OwnedAttribute, RequiredAttribute,
};
pub use descriptor::{
    ConstructorDescriptor, MemberDescriptor, MemberKind, MemberRef, MemberType,
    ParameterDescriptor, ScalarKind, TypeCatalog, TypeDescriptor,
};
pub use error::{Error, Result};
pub use metadata::{
    ConstructorBinding, DefiningNavigation, EntityType, EntityTypeId, ForeignKey, ForeignKeyId,
    Key, KeyId, Model, Navigation, NavigationEnd, NavigationRef, NavigationView,
    ParameterBinding, Property, PropertyId, TypeMapping, ValueGenerated,
};
pub use snapshot::ModelSnapshot;
pub use source::ConfigurationSource;
