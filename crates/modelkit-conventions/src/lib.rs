//! Convention pipeline for Modelkit.
//!
//! `modelkit-conventions` turns a [`TypeCatalog`](modelkit_core::TypeCatalog) into a
//! persistence model by reacting to every edit of the metadata graph.
//!
//! # Role In The Architecture
//!
//! - **Builder**: [`ModelBuilder`] is the only way to mutate the model. Every mutator
//!   takes a [`ConfigurationSource`](modelkit_core::ConfigurationSource), refuses edits
//!   a stronger source already made, and raises a [`ModelEvent`].
//! - **Dispatcher**: events run the conventions registered for their [`EventKind`] in
//!   order. Events raised while another is dispatching, or inside a [`DelayScope`], are
//!   queued and drained FIFO.
//! - **Conventions**: the [`conventions`] module holds the built-in rules and
//!   [`default_convention_set`]. [`ConventionSetPlugin`]s reshape a set before it is
//!   frozen.
//! - **Capabilities**: attribute reading, nullability markers, store type mapping and
//!   service parameters are injected through [`ConventionDependencies`].
//!
//! # Example
//!
//! ```ignore
//! use modelkit_conventions::ModelBuilder;
//! use modelkit_core::{ConfigurationSource, TypeCatalog};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(TypeCatalog::from_json(CATALOG_JSON)?);
//! let mut builder = ModelBuilder::new(catalog);
//! builder.entity("Blog", ConfigurationSource::Explicit)?;
//! let model = builder.finalize()?;
//! ```

pub mod attributes;
pub mod builder;
pub mod config;
pub mod context;
pub mod convention;
pub mod conventions;
pub mod diagnostics;
pub mod dispatcher;
pub mod nullability;
pub mod services;
pub mod set;
pub mod type_mapping;

pub use attributes::{AttributeReader, AttributeTarget, DescriptorAttributeReader};
pub use builder::{
    DetachedEntityType, DetachedProperty, DetachedRelationship, FinalizedModel, ModelBuilder,
};
pub use config::ConventionConfig;
pub use context::{ContextState, ConventionContext};
pub use convention::Convention;
pub use conventions::default_convention_set;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use dispatcher::{
    DelayScope, DispatchOutcome, DispatchStats, EventKind, EventSubject, ModelEvent,
    RemovedEntityType, RemovedForeignKey,
};
pub use nullability::{NullabilityReader, NullableMarkerReader};
pub use services::{ConventionDependencies, NamedServiceResolver, ServiceParameterResolver};
pub use set::{ConventionSet, ConventionSetBuilder, ConventionSetPlugin};
pub use type_mapping::{DefaultTypeMappingSource, MappingRequest, TypeMappingSource};
