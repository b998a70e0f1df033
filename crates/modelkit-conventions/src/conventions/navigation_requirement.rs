//! Required reference navigations.
//!
//! A reference navigation that must always be set makes its relationship required.
//! Declared on the dependent, that is all it does. Declared on the principal side of
//! a one-to-one, it means the declaring type depends on the target, so the
//! relationship is inverted first. When both navigations of a one-to-one are marked,
//! neither end can be inferred and the relationship is left alone.

use super::attribute::NavigationAttributeConvention;
use super::runtime_type_of;
use crate::attributes::{AttributeReader, AttributeTarget, has_attribute};
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::diagnostics::DiagnosticKind;
use crate::nullability::NullabilityReader;
use modelkit_core::{ConfigurationSource, NavigationRef, RequiredAttribute, Result};
use std::rc::Rc;

/// Diagnostics reported by one flavor of the rule.
#[derive(Clone, Copy)]
struct Reporting {
    both_ends: DiagnosticKind,
    inverted: DiagnosticKind,
    not_inverted: DiagnosticKind,
}

/// Runtime type and member name backing a navigation.
fn backing_member(builder: &ModelBuilder, navigation: NavigationRef) -> Option<(String, String)> {
    let model = builder.model();
    let view = model.navigation(navigation)?;
    let runtime_type = runtime_type_of(model, view.declaring_type())?;
    Some((runtime_type, view.name().to_string()))
}

fn require_navigation(
    builder: &mut ModelBuilder,
    navigation: NavigationRef,
    source: ConfigurationSource,
    is_marked: &dyn Fn(&ModelBuilder, NavigationRef) -> bool,
    reporting: Reporting,
) -> Result<()> {
    let model = builder.model();
    let Some(view) = model.navigation(navigation) else {
        return Ok(());
    };
    let foreign_key = view.foreign_key();
    if view.is_collection() || foreign_key.is_ownership() {
        return Ok(());
    }
    let fk = navigation.foreign_key;
    let target = view.target_type();
    let on_dependent = view.is_dependent_to_principal();
    let resolved = foreign_key.principal_end_source().is_some();
    let path = model.navigation_path(navigation);

    if let Some(inverse) = view.inverse() {
        let inverse_is_reference = model.navigation(inverse).is_some_and(|n| !n.is_collection());
        if inverse_is_reference && is_marked(&*builder, inverse) {
            let mut paths = [path, model.navigation_path(inverse)];
            paths.sort();
            builder.diagnostics_mut().record_once(
                reporting.both_ends,
                format!(
                    "{} and {} are both required; the principal end cannot be inferred from them",
                    paths[0], paths[1]
                ),
            );
            return Ok(());
        }
    }

    if !on_dependent {
        if !builder.has_principal_end(fk, target, source)? {
            builder.diagnostics_mut().record_once(
                reporting.not_inverted,
                format!(
                    "{path} is required, but the principal end of its relationship was configured \
                     with a stronger source; the navigation is not made required"
                ),
            );
            return Ok(());
        }
        if resolved {
            builder.diagnostics_mut().record(
                reporting.inverted,
                format!("{path} is required, so its declaring type became the dependent"),
            );
        }
    } else if !resolved {
        builder.has_principal_end(fk, target, source)?;
    }
    tracing::trace!(navigation = %path, %source, "relationship required by navigation");
    builder.is_required(fk, true, source)?;
    Ok(())
}

/// Makes relationships required through navigations annotated required.
pub fn required_navigation_attribute_convention(
    attributes: Rc<dyn AttributeReader>,
) -> NavigationAttributeConvention<RequiredAttribute> {
    let reader = Rc::clone(&attributes);
    let is_marked = move |builder: &ModelBuilder, navigation: NavigationRef| {
        backing_member(builder, navigation).is_some_and(|(type_name, member)| {
            has_attribute::<RequiredAttribute>(
                reader.as_ref(),
                AttributeTarget::Member {
                    type_name: &type_name,
                    member: &member,
                },
            )
        })
    };
    NavigationAttributeConvention::new(
        "RequiredNavigationAttributeConvention",
        attributes,
        move |builder, navigation, _, _| {
            require_navigation(
                builder,
                navigation,
                ConfigurationSource::DataAnnotation,
                &is_marked,
                Reporting {
                    both_ends: DiagnosticKind::RequiredAttributeOnBothNavigations,
                    inverted: DiagnosticKind::RequiredAttributeInverted,
                    not_inverted: DiagnosticKind::RequiredAttributeOnDependent,
                },
            )
        },
    )
}

/// Makes relationships required through reference navigations declared
/// non-nullable by nullability markers.
pub struct NonNullableNavigationConvention {
    nullability: Rc<dyn NullabilityReader>,
}

impl NonNullableNavigationConvention {
    pub fn new(nullability: Rc<dyn NullabilityReader>) -> Self {
        Self { nullability }
    }

    fn is_non_nullable(&self, builder: &ModelBuilder, navigation: NavigationRef) -> bool {
        backing_member(builder, navigation)
            .is_some_and(|(type_name, member)| self.nullability.is_non_nullable(&type_name, &member))
    }
}

impl Convention for NonNullableNavigationConvention {
    fn name(&self) -> &'static str {
        "NonNullableNavigationConvention"
    }

    fn on_navigation_added(
        &self,
        builder: &mut ModelBuilder,
        navigation: NavigationRef,
        _ctx: &mut ConventionContext<NavigationRef>,
    ) -> Result<()> {
        if !builder.config().honor_nullable_markers || !self.is_non_nullable(builder, navigation) {
            return Ok(());
        }
        require_navigation(
            builder,
            navigation,
            ConfigurationSource::Convention,
            &|builder: &ModelBuilder, navigation| self.is_non_nullable(builder, navigation),
            Reporting {
                both_ends: DiagnosticKind::NonNullableReferenceOnBothNavigations,
                inverted: DiagnosticKind::NonNullableInverted,
                not_inverted: DiagnosticKind::NonNullableReferenceOnDependent,
            },
        )
    }
}
