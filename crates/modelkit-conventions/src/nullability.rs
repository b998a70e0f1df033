//! Nullability marker decoding.
//!
//! Compilers that track reference nullability synthesize two marker annotations:
//! a per-member `NullableAttribute` whose last field is a byte array of flags, and a
//! per-type `NullableContextAttribute` carrying the default flag for members without
//! their own marker. Several copies of these markers can exist side by side (one per
//! separately compiled component), so they are matched by qualified name only and the
//! flags field is located by shape, not by a fixed field name.
//!
//! Flag values: `0` oblivious, `1` non-nullable, `2` nullable. The first flag
//! describes the member's outermost type.

use modelkit_core::attribute::{NULLABLE, NULLABLE_CONTEXT};
use modelkit_core::{AttributeData, AttributeValue, TypeCatalog};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

const NON_NULLABLE: u8 = 1;

/// Answers whether a member is declared non-nullable.
pub trait NullabilityReader {
    fn is_non_nullable(&self, type_name: &str, member: &str) -> bool;
}

/// Identity of one marker definition: its defining component and field layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MarkerShape {
    defined_in: Option<String>,
    fields: Vec<String>,
}

impl MarkerShape {
    fn of(data: &AttributeData) -> Self {
        Self {
            defined_in: data.defined_in.clone(),
            fields: data.fields.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

/// Decodes compiler nullability markers from the type catalog.
#[derive(Debug)]
pub struct NullableMarkerReader {
    catalog: Arc<TypeCatalog>,
    /// Index of the flags field per marker shape; `None` when the shape has none.
    flag_fields: RefCell<HashMap<MarkerShape, Option<usize>>>,
}

impl NullableMarkerReader {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            flag_fields: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct marker shapes decoded so far.
    pub fn cached_shapes(&self) -> usize {
        self.flag_fields.borrow().len()
    }

    fn flags_field_index(&self, data: &AttributeData) -> Option<usize> {
        let shape = MarkerShape::of(data);
        if let Some(index) = self.flag_fields.borrow().get(&shape) {
            return *index;
        }
        let index = data
            .fields
            .len()
            .checked_sub(1)
            .filter(|last| matches!(data.fields[*last].value, AttributeValue::Bytes(_)));
        tracing::trace!(defined_in = ?shape.defined_in, ?index, "decoded nullable marker shape");
        self.flag_fields.borrow_mut().insert(shape, index);
        index
    }

    /// First flag of a member marker; `None` when the marker is absent or carries an
    /// empty flag array.
    fn member_flag(&self, attributes: &[AttributeData]) -> Option<u8> {
        let marker = attributes.iter().find(|a| a.is(NULLABLE))?;
        let index = self.flags_field_index(marker)?;
        marker.fields[index].value.as_bytes()?.first().copied()
    }

    fn context_flag(attributes: &[AttributeData]) -> Option<u8> {
        let marker = attributes.iter().find(|a| a.is(NULLABLE_CONTEXT))?;
        let flag = marker.fields.last()?.value.as_int()?;
        u8::try_from(flag).ok()
    }
}

impl NullabilityReader for NullableMarkerReader {
    fn is_non_nullable(&self, type_name: &str, member: &str) -> bool {
        let Some(found) = self.catalog.find_member(type_name, member) else {
            return false;
        };
        let flag = self
            .member_flag(&found.member().attributes)
            .or_else(|| Self::context_flag(&found.declaring_type().attributes));
        flag == Some(NON_NULLABLE)
    }
}
