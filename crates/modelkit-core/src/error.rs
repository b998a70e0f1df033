//! Error types for model building.
//!
//! Rejected mutations are not errors: graph and builder mutators report them as
//! `None`/`false`. Everything here is a fatal configuration problem that aborts the
//! build and must be fixed in the annotated types or the builder calls.

use std::error::Error as StdError;
use std::fmt;

/// Fatal model configuration error.
#[derive(Debug)]
pub enum Error {
    /// No constructor of an entity type could be bound.
    ConstructorNotBound {
        entity_type: String,
        /// One line per constructor describing the parameters that failed to bind.
        failures: Vec<String>,
    },
    /// Two or more constructors tie after the service/property tie-break.
    AmbiguousConstructor {
        entity_type: String,
        first: String,
        second: String,
    },
    /// A composite primary key was assembled purely from key annotations.
    CompositeKeyWithDataAnnotation {
        entity_type: String,
        properties: Vec<String>,
    },
    /// A key annotation was found on a type that has a base type.
    KeyAttributeOnDerivedEntity {
        entity_type: String,
        property: String,
        root: String,
    },
    /// A one-to-one relationship whose principal end was never resolved.
    AmbiguousOneToOne {
        dependent_path: String,
        principal_path: String,
    },
    /// A derived type ignores a member that its base type maps.
    InheritedMemberIgnored {
        member: String,
        entity_type: String,
        declaring_type: String,
    },
    /// A property whose runtime type has no store mapping.
    PropertyNotMapped {
        entity_type: String,
        property: String,
        type_name: String,
    },
    /// A type is used as an owned type but is already mapped as a regular entity type.
    ClashingOwnedEntityType { name: String },
    /// A type is mapped as a regular entity type but is already marked owned.
    ClashingNonOwnedEntityType { name: String },
    /// A name that is neither in the model nor in the type catalog.
    UnknownEntityType { name: String },
    /// An explicit column store type that cannot be parsed.
    InvalidStoreType { property: String, store_type: String },
    /// Catalog or snapshot (de)serialization failure.
    Json(serde_json::Error),
    /// Error raised by a user-supplied convention.
    Custom(String),
}

impl Error {
    /// Create a custom error from any message.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstructorNotBound {
                entity_type,
                failures,
            } => {
                write!(
                    f,
                    "no suitable constructor was found for entity type '{}'. \
                     The following constructors had parameters that could not be bound: {}",
                    entity_type,
                    failures.join("; ")
                )
            }
            Error::AmbiguousConstructor {
                entity_type,
                first,
                second,
            } => write!(
                f,
                "the constructors '{}' and '{}' of entity type '{}' have the same number of \
                 parameters that can be bound, configure the binding explicitly",
                first, second, entity_type
            ),
            Error::CompositeKeyWithDataAnnotation {
                entity_type,
                properties,
            } => write!(
                f,
                "entity type '{}' has a composite primary key defined with key annotations \
                 ({}); composite keys must be configured explicitly",
                entity_type,
                properties.join(", ")
            ),
            Error::KeyAttributeOnDerivedEntity {
                entity_type,
                property,
                root,
            } => write!(
                f,
                "the derived type '{}' cannot have a key annotation on property '{}'; \
                 keys may only be declared on the root type '{}'",
                entity_type, property, root
            ),
            Error::AmbiguousOneToOne {
                dependent_path,
                principal_path,
            } => write!(
                f,
                "the principal and dependent sides of the one-to-one relationship between \
                 '{}' and '{}' could not be determined",
                dependent_path, principal_path
            ),
            Error::InheritedMemberIgnored {
                member,
                entity_type,
                declaring_type,
            } => write!(
                f,
                "member '{}' is ignored on derived type '{}' but is mapped on its base type '{}'",
                member, entity_type, declaring_type
            ),
            Error::PropertyNotMapped {
                entity_type,
                property,
                type_name,
            } => write!(
                f,
                "property '{}.{}' of type '{}' could not be mapped to a store type",
                entity_type, property, type_name
            ),
            Error::ClashingOwnedEntityType { name } => write!(
                f,
                "type '{}' cannot be configured as owned because it is already mapped as a \
                 regular entity type",
                name
            ),
            Error::ClashingNonOwnedEntityType { name } => write!(
                f,
                "type '{}' cannot be mapped as a regular entity type because it is configured \
                 as owned",
                name
            ),
            Error::UnknownEntityType { name } => write!(f, "unknown entity type '{}'", name),
            Error::InvalidStoreType {
                property,
                store_type,
            } => write!(
                f,
                "store type '{}' configured for property '{}' is not valid",
                store_type, property
            ),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// Result alias used across Modelkit crates.
pub type Result<T> = std::result::Result<T, Error>;
