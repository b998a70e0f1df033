use super::{EntityTypeId, PropertyId};
use crate::source::ConfigurationSource;

/// An ordered, unique set of properties on one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) source: ConfigurationSource,
}

impl Key {
    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn source(&self) -> ConfigurationSource {
        self.source
    }
}
