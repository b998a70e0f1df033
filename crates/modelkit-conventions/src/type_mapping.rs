//! Store type mapping capability.
//!
//! The type mapping convention resolves every scalar property through an injected
//! [`TypeMappingSource`]. The default source maps scalar kinds to portable SQL type
//! names and parses explicit column store types such as `varchar(255)`,
//! `decimal(18,2)` or `nvarchar(max)`.

use modelkit_core::{Error, Result, ScalarKind, TypeMapping};
use regex::Regex;
use std::sync::OnceLock;

/// Facets of one property to be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRequest<'a> {
    /// `Entity.Property`, used in error messages.
    pub property: &'a str,
    pub scalar: Option<ScalarKind>,
    pub column_type: Option<&'a str>,
    pub max_length: Option<u32>,
}

/// Resolves store types.
pub trait TypeMappingSource {
    /// `Ok(None)` when the property cannot be mapped at all.
    fn find_mapping(&self, request: &MappingRequest<'_>) -> Result<Option<TypeMapping>>;
}

const STORE_TYPE_PATTERN: &str =
    r"^\s*([A-Za-z][A-Za-z0-9_ ]*?)\s*(?:\(\s*(\d+|max)\s*(?:,\s*(\d+)\s*)?\))?\s*$";

fn store_type_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(STORE_TYPE_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(error = %e, "store type pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// Parse an explicit store type into a mapping.
pub fn parse_store_type(property: &str, store_type: &str) -> Result<TypeMapping> {
    let invalid = || Error::InvalidStoreType {
        property: property.to_string(),
        store_type: store_type.to_string(),
    };
    let captures = store_type_regex()
        .and_then(|re| re.captures(store_type))
        .ok_or_else(invalid)?;
    let base = captures
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .ok_or_else(invalid)?;
    let first = captures.get(2).map(|m| m.as_str());
    let second = captures.get(3).map(|m| m.as_str());
    let mapping = match (first, second) {
        (None, _) => TypeMapping::new(base),
        (Some("max"), None) => {
            let mut mapping = TypeMapping::new(base);
            mapping.store_type = format!("{}(max)", mapping.base);
            mapping
        }
        (Some("max"), Some(_)) => return Err(invalid()),
        (Some(size), None) => TypeMapping::new(base).with_size(size.parse().map_err(|_| invalid())?),
        (Some(precision), Some(scale)) => TypeMapping::new(base).with_precision(
            precision.parse().map_err(|_| invalid())?,
            scale.parse().map_err(|_| invalid())?,
        ),
    };
    Ok(mapping)
}

/// Portable default mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeMappingSource;

impl DefaultTypeMappingSource {
    pub fn new() -> Self {
        Self
    }

    fn scalar_mapping(scalar: ScalarKind, max_length: Option<u32>) -> TypeMapping {
        match scalar {
            ScalarKind::Bool => TypeMapping::new("boolean"),
            ScalarKind::I16 => TypeMapping::new("smallint"),
            ScalarKind::I32 => TypeMapping::new("integer"),
            ScalarKind::I64 => TypeMapping::new("bigint"),
            ScalarKind::F32 => TypeMapping::new("real"),
            ScalarKind::F64 => TypeMapping::new("double precision"),
            ScalarKind::Decimal => TypeMapping::new("decimal").with_precision(18, 2),
            ScalarKind::String => match max_length {
                Some(length) => TypeMapping::new("varchar").with_size(length),
                None => TypeMapping::new("text"),
            },
            ScalarKind::Bytes => match max_length {
                Some(length) => TypeMapping::new("varbinary").with_size(length),
                None => TypeMapping::new("blob"),
            },
            ScalarKind::Uuid => TypeMapping::new("uuid"),
            ScalarKind::Date => TypeMapping::new("date"),
            ScalarKind::Time => TypeMapping::new("time"),
            ScalarKind::DateTime => TypeMapping::new("timestamp"),
        }
    }
}

impl TypeMappingSource for DefaultTypeMappingSource {
    fn find_mapping(&self, request: &MappingRequest<'_>) -> Result<Option<TypeMapping>> {
        if let Some(store_type) = request.column_type {
            return parse_store_type(request.property, store_type).map(Some);
        }
        Ok(request
            .scalar
            .map(|scalar| Self::scalar_mapping(scalar, request.max_length)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(scalar: Option<ScalarKind>, column_type: Option<&str>, max: Option<u32>) -> MappingRequest<'_> {
        MappingRequest {
            property: "Blog.Title",
            scalar,
            column_type,
            max_length: max,
        }
    }

    #[test]
    fn test_parse_store_types() {
        let m = parse_store_type("p", "varchar(255)").unwrap();
        assert_eq!((m.base.as_str(), m.size), ("varchar", Some(255)));

        let m = parse_store_type("p", " DECIMAL ( 10 , 4 ) ").unwrap();
        assert_eq!(m.store_type, "decimal(10,4)");
        assert_eq!((m.precision, m.scale), (Some(10), Some(4)));

        let m = parse_store_type("p", "nvarchar(max)").unwrap();
        assert_eq!(m.store_type, "nvarchar(max)");
        assert_eq!(m.size, None);

        let m = parse_store_type("p", "double precision").unwrap();
        assert_eq!(m.store_type, "double precision");
    }

    #[test]
    fn test_invalid_store_types() {
        for bad in ["", "(12)", "varchar(", "varchar(max, 2)", "int(abc)"] {
            let err = parse_store_type("Blog.Title", bad).unwrap_err();
            assert!(matches!(err, Error::InvalidStoreType { .. }), "{bad}");
        }
    }

    #[test]
    fn test_default_scalar_mappings() {
        let source = DefaultTypeMappingSource::new();
        let m = source.find_mapping(&request(Some(ScalarKind::String), None, Some(100))).unwrap();
        assert_eq!(m.unwrap().store_type, "varchar(100)");
        let m = source.find_mapping(&request(Some(ScalarKind::String), None, None)).unwrap();
        assert_eq!(m.unwrap().store_type, "text");
        let m = source.find_mapping(&request(Some(ScalarKind::I64), None, None)).unwrap();
        assert_eq!(m.unwrap().store_type, "bigint");
        assert!(source.find_mapping(&request(None, None, None)).unwrap().is_none());
    }

    #[test]
    fn test_column_type_wins() {
        let source = DefaultTypeMappingSource::new();
        let m = source
            .find_mapping(&request(Some(ScalarKind::String), Some("char(2)"), Some(100)))
            .unwrap()
            .unwrap();
        assert_eq!(m.store_type, "char(2)");
    }

    proptest! {
        #[test]
        fn test_sized_store_types_keep_their_facets(
            base in "[a-z][a-z_]{0,11}",
            size in 1u32..100_000,
            scale in proptest::option::of(0u32..38),
            pad in " {0,2}",
        ) {
            let store_type = match scale {
                Some(scale) => format!("{pad}{base}{pad}({pad}{size}{pad},{pad}{scale}{pad}){pad}"),
                None => format!("{pad}{base}{pad}({pad}{size}{pad}){pad}"),
            };
            let m = parse_store_type("Blog.Title", &store_type).unwrap();
            prop_assert_eq!(&m.base, &base);
            match scale {
                Some(scale) => {
                    prop_assert_eq!((m.precision, m.scale, m.size), (Some(size), Some(scale), None));
                    prop_assert_eq!(m.store_type, format!("{base}({size},{scale})"));
                }
                None => {
                    prop_assert_eq!((m.size, m.precision), (Some(size), None));
                    prop_assert_eq!(m.store_type, format!("{base}({size})"));
                }
            }
        }
    }
}
