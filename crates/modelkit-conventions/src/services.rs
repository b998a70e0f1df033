//! Injected capabilities shared by the built-in conventions.

use crate::attributes::{AttributeReader, DescriptorAttributeReader};
use crate::config::ConventionConfig;
use crate::nullability::{NullabilityReader, NullableMarkerReader};
use crate::type_mapping::{DefaultTypeMappingSource, TypeMappingSource};
use modelkit_core::{MemberType, ParameterDescriptor, TypeCatalog};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Decides which constructor parameters are supplied by services.
pub trait ServiceParameterResolver {
    /// The service type name bound to `parameter`, if any.
    fn resolve(&self, parameter: &ParameterDescriptor) -> Option<String>;
}

/// Binds parameters whose declared type is one of a fixed set of service names.
#[derive(Debug, Clone, Default)]
pub struct NamedServiceResolver {
    services: BTreeSet<String>,
}

impl NamedServiceResolver {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ServiceParameterResolver for NamedServiceResolver {
    fn resolve(&self, parameter: &ParameterDescriptor) -> Option<String> {
        match &parameter.ty {
            MemberType::Other { name } if self.services.contains(name) => Some(name.clone()),
            _ => None,
        }
    }
}

/// The capabilities conventions are built with.
#[derive(Clone)]
pub struct ConventionDependencies {
    pub catalog: Arc<TypeCatalog>,
    pub attributes: Rc<dyn AttributeReader>,
    pub nullability: Rc<dyn NullabilityReader>,
    pub type_mappings: Rc<dyn TypeMappingSource>,
    pub services: Rc<dyn ServiceParameterResolver>,
}

impl ConventionDependencies {
    /// Default capabilities over `catalog`.
    pub fn new(catalog: Arc<TypeCatalog>, config: &ConventionConfig) -> Self {
        Self {
            attributes: Rc::new(DescriptorAttributeReader::new(Arc::clone(&catalog))),
            nullability: Rc::new(NullableMarkerReader::new(Arc::clone(&catalog))),
            type_mappings: Rc::new(DefaultTypeMappingSource::new()),
            services: Rc::new(NamedServiceResolver::new(
                config.service_type_names.iter().cloned(),
            )),
            catalog,
        }
    }

    #[must_use]
    pub fn attribute_reader(mut self, reader: Rc<dyn AttributeReader>) -> Self {
        self.attributes = reader;
        self
    }

    #[must_use]
    pub fn nullability_reader(mut self, reader: Rc<dyn NullabilityReader>) -> Self {
        self.nullability = reader;
        self
    }

    #[must_use]
    pub fn type_mapping_source(mut self, source: Rc<dyn TypeMappingSource>) -> Self {
        self.type_mappings = source;
        self
    }

    #[must_use]
    pub fn service_resolver(mut self, resolver: Rc<dyn ServiceParameterResolver>) -> Self {
        self.services = resolver;
        self
    }
}

impl fmt::Debug for ConventionDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConventionDependencies")
            .field("catalog_types", &self.catalog.len())
            .finish_non_exhaustive()
    }
}
