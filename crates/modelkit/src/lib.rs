//! Modelkit: convention-driven persistence model building.
//!
//! Modelkit discovers a relational model from annotated runtime type shapes. Roots
//! are added explicitly; conventions then find properties, keys, relationships,
//! inheritance and owned types, reconcile annotations against conventional guesses,
//! and validate the result once the model is built.
//!
//! # Crates
//!
//! - [`modelkit_core`]: the metadata graph, configuration sources, type catalog,
//!   errors and the serializable snapshot.
//! - [`modelkit_conventions`]: the event-raising builder, the dispatcher and the
//!   built-in conventions.
//!
//! # Example
//!
//! ```ignore
//! use modelkit::prelude::*;
//!
//! let catalog = Arc::new(TypeCatalog::from_json(CATALOG_JSON)?);
//! let model = build_model(catalog, &["Blog"], ConventionConfig::default())?;
//! println!("{}", model.snapshot().to_json()?);
//! ```

pub use modelkit_conventions::{
    Convention, ConventionConfig, ConventionContext, ConventionDependencies, ConventionSet,
    ConventionSetBuilder, ConventionSetPlugin, DiagnosticKind, Diagnostics, EventKind,
    FinalizedModel, ModelBuilder, default_convention_set,
};
pub use modelkit_core::{
    ConfigurationSource, EntityTypeId, Error, ForeignKeyId, Model, ModelSnapshot, PropertyId,
    Result, TypeCatalog, TypeDescriptor,
};

use std::sync::Arc;

/// Commonly used items.
pub mod prelude {
    pub use crate::build_model;
    pub use modelkit_conventions::{
        Convention, ConventionConfig, ConventionContext, ConventionSet, DiagnosticKind,
        EventKind, FinalizedModel, ModelBuilder,
    };
    pub use modelkit_core::{
        AttributeData, ConfigurationSource, ConstructorDescriptor, EntityTypeId, Error,
        MemberDescriptor, MemberType, Model, ModelSnapshot, Result, ScalarKind, TypeCatalog,
        TypeDescriptor,
    };
    pub use std::sync::Arc;
}

/// Build and finalize a model with the default conventions.
///
/// Each root is added as an explicitly configured entity type, in order. A root the
/// catalog does not describe is an error rather than a shadow entity type.
#[tracing::instrument(level = "info", skip(catalog, config))]
pub fn build_model(
    catalog: Arc<TypeCatalog>,
    roots: &[&str],
    config: ConventionConfig,
) -> Result<FinalizedModel> {
    if let Some(missing) = roots.iter().find(|root| !catalog.contains(root)) {
        return Err(Error::UnknownEntityType {
            name: (*missing).to_string(),
        });
    }
    let mut builder = ModelBuilder::with_config(catalog, config);
    for root in roots {
        builder.entity(root, ConfigurationSource::Explicit)?;
    }
    builder.finalize()
}
