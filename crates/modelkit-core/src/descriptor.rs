//! Runtime type descriptors.
//!
//! A [`TypeCatalog`] is the reflected view of the user's annotated types: their
//! members, constructors, base types and annotations. Conventions read it through
//! the attribute/nullability reader capabilities; the metadata graph only stores
//! type names.

use crate::attribute::AttributeData;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Scalar runtime types that map to store columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
}

impl ScalarKind {
    /// Reference-like types are nullable unless annotated otherwise.
    pub const fn is_reference(self) -> bool {
        matches!(self, ScalarKind::String | ScalarKind::Bytes)
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Uuid => "uuid",
            ScalarKind::Date => "date",
            ScalarKind::Time => "time",
            ScalarKind::DateTime => "datetime",
        }
    }
}

/// The declared type of a member or constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberType {
    /// A scalar; `optional` marks a nullable value type (`Option<i32>`).
    Scalar {
        scalar: ScalarKind,
        #[serde(default)]
        optional: bool,
    },
    /// A single reference to another type.
    Reference { target: String },
    /// A collection of another type.
    Collection { target: String },
    /// Anything else (services, unmappable types).
    Other { name: String },
}

impl MemberType {
    pub fn scalar(scalar: ScalarKind) -> Self {
        MemberType::Scalar {
            scalar,
            optional: false,
        }
    }

    pub fn optional(scalar: ScalarKind) -> Self {
        MemberType::Scalar {
            scalar,
            optional: true,
        }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        MemberType::Reference {
            target: target.into(),
        }
    }

    pub fn collection(target: impl Into<String>) -> Self {
        MemberType::Collection {
            target: target.into(),
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        MemberType::Other { name: name.into() }
    }

    /// The scalar kind, if this is a scalar.
    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            MemberType::Scalar { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// The navigation target, if this is a reference or collection.
    pub fn navigation_target(&self) -> Option<&str> {
        match self {
            MemberType::Reference { target } | MemberType::Collection { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, MemberType::Collection { .. })
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::Scalar {
                scalar,
                optional: false,
            } => f.write_str(scalar.name()),
            MemberType::Scalar {
                scalar,
                optional: true,
            } => write!(f, "{}?", scalar.name()),
            MemberType::Reference { target } => f.write_str(target),
            MemberType::Collection { target } => write!(f, "[{}]", target),
            MemberType::Other { name } => f.write_str(name),
        }
    }
}

/// Whether a member is a property or a plain field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    #[default]
    Property,
    Field,
}

/// A declared member of a runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(rename = "type")]
    pub ty: MemberType,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
}

impl MemberDescriptor {
    /// A property member.
    pub fn property(name: impl Into<String>, ty: MemberType) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property,
            ty,
            is_static: false,
            attributes: Vec::new(),
        }
    }

    /// A field member.
    pub fn field(name: impl Into<String>, ty: MemberType) -> Self {
        Self {
            kind: MemberKind::Field,
            ..Self::property(name, ty)
        }
    }

    #[must_use]
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// A constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: MemberType,
}

/// A declared constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDescriptor {
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub is_static: bool,
}

impl ConstructorDescriptor {
    /// A parameterless constructor.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: MemberType) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            ty,
        });
        self
    }

    #[must_use]
    pub fn static_constructor(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Human-readable signature, e.g. `(name: string, loader: LazyLoader)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        format!("({})", params.join(", "))
    }
}

/// The reflected shape of one runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub members: Vec<MemberDescriptor>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDescriptor>,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            is_abstract: false,
            members: Vec::new(),
            constructors: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.constructors.push(constructor);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// A member declared directly on this type.
    pub fn declared_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Non-static constructors; a type that declares none gets an implicit
    /// parameterless one.
    pub fn instance_constructors(&self) -> Cow<'_, [ConstructorDescriptor]> {
        if self.constructors.is_empty() {
            return Cow::Owned(vec![ConstructorDescriptor::new()]);
        }
        let instance: Vec<ConstructorDescriptor> = self
            .constructors
            .iter()
            .filter(|c| !c.is_static)
            .cloned()
            .collect();
        if instance.len() == self.constructors.len() {
            Cow::Borrowed(&self.constructors)
        } else {
            Cow::Owned(instance)
        }
    }
}

/// A member together with the type that declares it.
#[derive(Debug, Clone)]
pub struct MemberRef {
    declaring: Arc<TypeDescriptor>,
    index: usize,
}

impl MemberRef {
    pub fn declaring_type(&self) -> &TypeDescriptor {
        &self.declaring
    }

    pub fn member(&self) -> &MemberDescriptor {
        &self.declaring.members[self.index]
    }
}

/// All known runtime types, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<String, Arc<TypeDescriptor>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON array of type descriptors.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptors: Vec<TypeDescriptor> = serde_json::from_str(json)?;
        Ok(descriptors.into_iter().collect())
    }

    /// Register a type, replacing any previous one with the same name.
    pub fn add(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    /// Chained form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Base types of `name`, nearest first. Stops at unknown names and cycles.
    pub fn base_chain(&self, name: &str) -> Vec<Arc<TypeDescriptor>> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([name.to_string()]);
        let mut current = self.get(name).and_then(|t| t.base.clone());
        while let Some(base_name) = current {
            if !seen.insert(base_name.clone()) {
                break;
            }
            let Some(base) = self.get(&base_name) else {
                break;
            };
            current = base.base.clone();
            chain.push(Arc::clone(base));
        }
        chain
    }

    /// Whether `name` is `ancestor` or derives from it.
    pub fn derives_from(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.base_chain(name).iter().any(|t| t.name == ancestor)
    }

    /// Find a member on `type_name` or any of its runtime base types.
    pub fn find_member(&self, type_name: &str, member: &str) -> Option<MemberRef> {
        let own = self.get(type_name).cloned();
        own.into_iter()
            .chain(self.base_chain(type_name))
            .find_map(|declaring| {
                let index = declaring.members.iter().position(|m| m.name == member)?;
                Some(MemberRef { declaring, index })
            })
    }

    /// Members declared on `type_name`, followed by those of each runtime base type,
    /// nearest first. Walking stops before the first base for which `stop_at` is true.
    pub fn runtime_members(
        &self,
        type_name: &str,
        stop_at: impl Fn(&str) -> bool,
    ) -> Vec<MemberRef> {
        let own = self.get(type_name).cloned();
        let mut members = Vec::new();
        let bases = self.base_chain(type_name);
        let declaring_types = own
            .into_iter()
            .chain(bases.into_iter().take_while(|b| !stop_at(&b.name)));
        for declaring in declaring_types {
            for index in 0..declaring.members.len() {
                members.push(MemberRef {
                    declaring: Arc::clone(&declaring),
                    index,
                });
            }
        }
        members
    }
}

impl FromIterator<TypeDescriptor> for TypeCatalog {
    fn from_iter<T: IntoIterator<Item = TypeDescriptor>>(iter: T) -> Self {
        let mut catalog = TypeCatalog::new();
        for descriptor in iter {
            catalog.add(descriptor);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animals() -> TypeCatalog {
        TypeCatalog::new()
            .with(
                TypeDescriptor::new("Animal")
                    .with_member(MemberDescriptor::property("Id", MemberType::scalar(ScalarKind::I32))),
            )
            .with(
                TypeDescriptor::new("Dog")
                    .with_base("Animal")
                    .with_member(MemberDescriptor::property("Breed", MemberType::scalar(ScalarKind::String))),
            )
            .with(TypeDescriptor::new("Puppy").with_base("Dog"))
    }

    #[test]
    fn test_base_chain_nearest_first() {
        let names: Vec<String> = animals()
            .base_chain("Puppy")
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["Dog", "Animal"]);
    }

    #[test]
    fn test_base_chain_stops_on_cycle() {
        let catalog = TypeCatalog::new()
            .with(TypeDescriptor::new("A").with_base("B"))
            .with(TypeDescriptor::new("B").with_base("A"));
        assert_eq!(catalog.base_chain("A").len(), 1);
    }

    #[test]
    fn test_find_member_walks_bases() {
        let catalog = animals();
        let found = catalog.find_member("Puppy", "Id").unwrap();
        assert_eq!(found.declaring_type().name, "Animal");
        assert_eq!(found.member().name, "Id");
        assert!(catalog.find_member("Animal", "Breed").is_none());
    }

    #[test]
    fn test_runtime_members_stops_at_mapped_base() {
        let catalog = animals();
        let members = catalog.runtime_members("Puppy", |name| name == "Animal");
        let names: Vec<&str> = members.iter().map(|m| m.member().name.as_str()).collect();
        assert_eq!(names, vec!["Breed"]);
    }

    #[test]
    fn test_implicit_parameterless_constructor() {
        let ty = TypeDescriptor::new("Blog");
        let ctors = ty.instance_constructors();
        assert_eq!(ctors.len(), 1);
        assert!(ctors[0].parameters.is_empty());

        let ty = TypeDescriptor::new("Blog")
            .with_constructor(ConstructorDescriptor::new().static_constructor())
            .with_constructor(
                ConstructorDescriptor::new().param("name", MemberType::scalar(ScalarKind::String)),
            );
        let ctors = ty.instance_constructors();
        assert_eq!(ctors.len(), 1);
        assert_eq!(ctors[0].signature(), "(name: string)");
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"[
            {"name": "Post",
             "members": [
                {"name": "Id", "type": {"kind": "scalar", "scalar": "i32"}},
                {"name": "Blog", "type": {"kind": "reference", "target": "Blog"}},
                {"name": "Rating", "kind": "field", "type": {"kind": "scalar", "scalar": "i32", "optional": true}}
             ]},
            {"name": "Blog"}
        ]"#;
        let catalog = TypeCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        let post = catalog.get("Post").unwrap();
        assert_eq!(post.members[1].ty.navigation_target(), Some("Blog"));
        assert_eq!(post.members[2].kind, MemberKind::Field);
        assert_eq!(post.members[2].ty, MemberType::optional(ScalarKind::I32));
    }
}
