//! Raw annotation data and typed data annotations.
//!
//! Annotations are attached to types and members in the [`TypeCatalog`](crate::TypeCatalog).
//! They are identified by their qualified type name, never by a fixed Rust type, because
//! several physically distinct definitions of the same marker may coexist across
//! separately compiled components. `defined_in` records which component a particular
//! definition came from.

use serde::{Deserialize, Serialize};

/// Qualified name of the key annotation.
pub const KEY: &str = "modelkit.annotations.KeyAttribute";
/// Qualified name of the "exclude from mapping" annotation.
pub const NOT_MAPPED: &str = "modelkit.annotations.NotMappedAttribute";
/// Qualified name of the owned-type annotation.
pub const OWNED: &str = "modelkit.annotations.OwnedAttribute";
/// Qualified name of the required annotation.
pub const REQUIRED: &str = "modelkit.annotations.RequiredAttribute";
/// Qualified name of the max-length annotation.
pub const MAX_LENGTH: &str = "modelkit.annotations.MaxLengthAttribute";
/// Qualified name of the column annotation.
pub const COLUMN: &str = "modelkit.annotations.ColumnAttribute";
/// Compiler-synthesized per-member nullability marker. Its last field is a byte array.
pub const NULLABLE: &str = "runtime.compiler.NullableAttribute";
/// Compiler-synthesized per-type default nullability marker.
pub const NULLABLE_CONTEXT: &str = "runtime.compiler.NullableContextAttribute";

/// A single annotation field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// A named field of an annotation instance. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeField {
    pub name: String,
    pub value: AttributeValue,
}

/// One annotation instance on a type or member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeData {
    /// Fully-qualified annotation type name.
    pub type_name: String,
    /// Component that defines this copy of the annotation type.
    #[serde(default)]
    pub defined_in: Option<String>,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<AttributeField>,
}

impl AttributeData {
    /// Create an annotation with no fields.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            defined_in: None,
            fields: Vec::new(),
        }
    }

    /// Set the defining component.
    #[must_use]
    pub fn defined_in(mut self, component: impl Into<String>) -> Self {
        self.defined_in = Some(component.into());
        self
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.fields.push(AttributeField {
            name: name.into(),
            value,
        });
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// Whether this annotation has the given qualified name.
    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    pub fn key() -> Self {
        Self::new(KEY)
    }

    pub fn not_mapped() -> Self {
        Self::new(NOT_MAPPED)
    }

    pub fn owned() -> Self {
        Self::new(OWNED)
    }

    pub fn required() -> Self {
        Self::new(REQUIRED)
    }

    /// Max-length annotation; `None` means "max".
    pub fn max_length(length: Option<u32>) -> Self {
        let data = Self::new(MAX_LENGTH);
        match length {
            Some(length) => data.field("Length", AttributeValue::Int(i64::from(length))),
            None => data,
        }
    }

    /// Column annotation carrying an explicit store type.
    pub fn column_type(store_type: impl Into<String>) -> Self {
        Self::new(COLUMN).field("TypeName", AttributeValue::Str(store_type.into()))
    }

    /// Column annotation carrying an explicit column name.
    pub fn column_name(name: impl Into<String>) -> Self {
        Self::new(COLUMN).field("Name", AttributeValue::Str(name.into()))
    }

    /// Per-member nullability marker with its byte flags.
    pub fn nullable(flags: impl Into<Vec<u8>>) -> Self {
        Self::new(NULLABLE).field("NullableFlags", AttributeValue::Bytes(flags.into()))
    }

    /// Per-type nullability context marker.
    pub fn nullable_context(flag: u8) -> Self {
        Self::new(NULLABLE_CONTEXT).field("Flag", AttributeValue::Int(i64::from(flag)))
    }
}

/// A typed view over a raw annotation.
pub trait DataAnnotation: Sized + 'static {
    /// Qualified name of the annotation type.
    const TYPE_NAME: &'static str;

    /// Decode the payload. Called only with data whose `type_name` matches.
    fn from_attribute(data: &AttributeData) -> Option<Self>;

    /// Find and decode the first matching annotation in `attributes`.
    fn find_in(attributes: &[AttributeData]) -> Option<Self> {
        attributes
            .iter()
            .filter(|a| a.is(Self::TYPE_NAME))
            .find_map(Self::from_attribute)
    }
}

macro_rules! marker_annotation {
    ($(#[$meta:meta])* $name:ident, $type_name:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl DataAnnotation for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn from_attribute(_data: &AttributeData) -> Option<Self> {
                Some($name)
            }
        }
    };
}

marker_annotation!(
    /// Marks a member as (part of) the primary key.
    KeyAttribute,
    KEY
);
marker_annotation!(
    /// Excludes a type or member from the model.
    NotMappedAttribute,
    NOT_MAPPED
);
marker_annotation!(
    /// Marks a type as owned.
    OwnedAttribute,
    OWNED
);
marker_annotation!(
    /// Marks a member as required.
    RequiredAttribute,
    REQUIRED
);

/// Maximum length of a string or binary member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLengthAttribute {
    /// `None` means unbounded ("max").
    pub length: Option<u32>,
}

impl DataAnnotation for MaxLengthAttribute {
    const TYPE_NAME: &'static str = MAX_LENGTH;

    fn from_attribute(data: &AttributeData) -> Option<Self> {
        let length = match data.get("Length") {
            Some(value) => Some(u32::try_from(value.as_int()?).ok()?),
            None => None,
        };
        Some(Self { length })
    }
}

/// Column name and store type overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAttribute {
    pub name: Option<String>,
    pub type_name: Option<String>,
}

impl DataAnnotation for ColumnAttribute {
    const TYPE_NAME: &'static str = COLUMN;

    fn from_attribute(data: &AttributeData) -> Option<Self> {
        Some(Self {
            name: data.get("Name").and_then(|v| v.as_str()).map(str::to_string),
            type_name: data
                .get("TypeName")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
