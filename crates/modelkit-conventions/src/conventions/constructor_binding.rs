//! Constructor selection for materialization.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::services::ServiceParameterResolver;
use modelkit_core::{
    ConstructorBinding, ConstructorDescriptor, EntityTypeId, Error, MemberType, Model,
    ParameterBinding, ParameterDescriptor, Result,
};
use std::rc::Rc;

/// Picks the constructor each entity type is materialized with.
///
/// A parameter binds to a service when the resolver recognizes it, otherwise to a
/// mapped property of the same name (case-insensitive) and type. Among constructors
/// whose parameters all bind, the one using the most services wins, then the one
/// using the fewest properties; a remaining tie is an error, as is having no
/// bindable constructor at all. Abstract and shadow types are skipped.
pub struct ConstructorBindingConvention {
    services: Rc<dyn ServiceParameterResolver>,
}

impl ConstructorBindingConvention {
    pub fn new(services: Rc<dyn ServiceParameterResolver>) -> Self {
        Self { services }
    }

    fn bind_parameter(
        &self,
        model: &Model,
        entity: EntityTypeId,
        parameter: &ParameterDescriptor,
    ) -> Option<ParameterBinding> {
        if let Some(service) = self.services.resolve(parameter) {
            return Some(ParameterBinding::Service(service));
        }
        let wanted = parameter.name.to_lowercase();
        model
            .properties(entity)
            .into_iter()
            .filter_map(|p| model.property(p))
            .find(|p| {
                p.name().to_lowercase() == wanted
                    && match &parameter.ty {
                        MemberType::Scalar { scalar, .. } => p.scalar() == Some(*scalar),
                        MemberType::Other { name } => {
                            p.scalar().is_none() && p.runtime_type_name() == name
                        }
                        MemberType::Reference { .. } | MemberType::Collection { .. } => false,
                    }
            })
            .map(|p| ParameterBinding::Property(p.name().to_string()))
    }

    /// The binding for `constructor`, or the names of the parameters that failed.
    fn bind_constructor(
        &self,
        model: &Model,
        entity: EntityTypeId,
        constructor: &ConstructorDescriptor,
    ) -> std::result::Result<ConstructorBinding, Vec<String>> {
        let mut parameters = Vec::with_capacity(constructor.parameters.len());
        let mut unbound = Vec::new();
        for parameter in &constructor.parameters {
            match self.bind_parameter(model, entity, parameter) {
                Some(binding) => parameters.push(binding),
                None => unbound.push(parameter.name.clone()),
            }
        }
        if !unbound.is_empty() {
            return Err(unbound);
        }
        Ok(ConstructorBinding {
            signature: constructor.signature(),
            parameters,
        })
    }

    fn bind(&self, builder: &ModelBuilder, entity: EntityTypeId) -> Result<Option<ConstructorBinding>> {
        let model = builder.model();
        let Some(et) = model.entity_type(entity) else {
            return Ok(None);
        };
        let Some(descriptor) = et.runtime_type().and_then(|r| builder.catalog().get(r)) else {
            return Ok(None);
        };
        if descriptor.is_abstract {
            return Ok(None);
        }

        let mut bound = Vec::new();
        let mut failures = Vec::new();
        for constructor in descriptor.instance_constructors().iter() {
            match self.bind_constructor(model, entity, constructor) {
                Ok(binding) => bound.push(binding),
                Err(unbound) => {
                    let names: Vec<String> = unbound.iter().map(|n| format!("'{n}'")).collect();
                    failures.push(format!(
                        "{} cannot bind {}",
                        constructor.signature(),
                        names.join(", ")
                    ));
                }
            }
        }
        if bound.is_empty() {
            return Err(Error::ConstructorNotBound {
                entity_type: et.name().to_string(),
                failures,
            });
        }

        let most_services = bound.iter().map(ConstructorBinding::service_count).max().unwrap_or(0);
        bound.retain(|b| b.service_count() == most_services);
        let fewest_properties = bound.iter().map(ConstructorBinding::property_count).min().unwrap_or(0);
        bound.retain(|b| b.property_count() == fewest_properties);

        let mut best = bound.into_iter();
        let (Some(first), second) = (best.next(), best.next()) else {
            return Ok(None);
        };
        if let Some(second) = second {
            return Err(Error::AmbiguousConstructor {
                entity_type: et.name().to_string(),
                first: first.signature,
                second: second.signature,
            });
        }
        Ok(Some(first))
    }
}

impl Convention for ConstructorBindingConvention {
    fn name(&self) -> &'static str {
        "ConstructorBindingConvention"
    }

    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        _ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        if !builder.config().bind_constructors {
            return Ok(());
        }
        for entity in builder.model().entity_type_ids() {
            let Some(binding) = self.bind(builder, entity)? else {
                continue;
            };
            tracing::trace!(
                entity_type = builder.model().entity_type_name(entity),
                signature = %binding.signature,
                "constructor bound"
            );
            builder.has_constructor_binding(entity, Some(binding));
        }
        Ok(())
    }
}
