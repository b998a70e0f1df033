//! Foreign key property discovery.
//!
//! Dependent properties are matched by name against the principal key, in this order:
//! `<navigation><key>`, `<PrincipalType><key>`, then the key name itself when it
//! already starts with the principal type name. Matching is case-insensitive and
//! requires the same scalar kind. When nothing matches, shadow properties with the
//! first candidate name are created on the dependent.

use super::short_type_name;
use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::dispatcher::RemovedForeignKey;
use modelkit_core::{
    ConfigurationSource, EntityTypeId, ForeignKeyId, KeyId, Model, PropertyId, Result, ScalarKind,
};

/// Finds or creates the dependent properties of each foreign key, decides the
/// principal end of ambiguous one-to-one relationships from them, and keys owned
/// types by their ownership.
pub struct ForeignKeyPropertyDiscoveryConvention;

/// Which end to treat as principal while matching names.
#[derive(Clone, Copy)]
struct Ends<'a> {
    dependent: EntityTypeId,
    principal: EntityTypeId,
    /// Navigation on the dependent pointing at the principal.
    navigation: Option<&'a str>,
    unique: bool,
}

/// The principal key as `(name, scalar)` pairs.
fn principal_key(model: &Model, principal: EntityTypeId) -> Option<Vec<(String, ScalarKind)>> {
    let key = model.find_primary_key(principal).and_then(|k| model.key(k))?;
    key.properties()
        .iter()
        .map(|p| {
            let property = model.property(*p)?;
            Some((property.name().to_string(), property.scalar()?))
        })
        .collect()
}

/// Name prefixes tried in order.
fn prefixes(model: &Model, ends: Ends<'_>) -> Vec<String> {
    let mut prefixes = Vec::new();
    if let Some(navigation) = ends.navigation {
        prefixes.push(navigation.to_string());
    }
    prefixes.push(short_type_name(model, ends.principal));
    prefixes
}

/// Dependent properties matching the principal key, if all of them are found.
fn match_properties(model: &Model, ends: Ends<'_>) -> Option<Vec<PropertyId>> {
    let key = principal_key(model, ends.principal)?;
    let candidates = model.properties(ends.dependent);
    let dependent_key: Vec<PropertyId> = model
        .find_primary_key(ends.dependent)
        .and_then(|k| model.key(k))
        .map(|k| k.properties().to_vec())
        .unwrap_or_default();

    let find = |wanted: &str, scalar: ScalarKind| {
        let wanted = wanted.to_lowercase();
        candidates.iter().copied().find(|p| {
            model.property(*p).is_some_and(|property| {
                property.name().to_lowercase() == wanted
                    && property.scalar() == Some(scalar)
                    && (ends.unique || !dependent_key.contains(p))
            })
        })
    };

    for prefix in prefixes(model, ends) {
        let matched: Option<Vec<PropertyId>> = key
            .iter()
            .map(|(name, scalar)| find(&format!("{prefix}{name}"), *scalar))
            .collect();
        if matched.is_some() {
            return matched;
        }
    }

    let principal_name = short_type_name(model, ends.principal).to_lowercase();
    if let [(name, scalar)] = key.as_slice() {
        if name.to_lowercase().starts_with(&principal_name) && name.len() > principal_name.len() {
            return find(name, *scalar).map(|p| vec![p]);
        }
    }
    None
}

/// Whether `properties` can stay as the dependent properties for `key`.
fn compatible(model: &Model, properties: &[PropertyId], key: &[(String, ScalarKind)]) -> bool {
    !properties.is_empty()
        && properties.len() == key.len()
        && properties
            .iter()
            .zip(key)
            .all(|(p, (_, scalar))| model.property(*p).is_some_and(|p| p.scalar() == Some(*scalar)))
}

impl ForeignKeyPropertyDiscoveryConvention {
    #[tracing::instrument(level = "trace", skip(builder))]
    fn configure(builder: &mut ModelBuilder, fk: ForeignKeyId) -> Result<()> {
        let model = builder.model();
        let Some(foreign_key) = model.foreign_key(fk) else {
            return Ok(());
        };
        if !ConfigurationSource::Convention.overrides(foreign_key.properties_source()) {
            return Self::key_ownership(builder, fk);
        }
        let dependent = foreign_key.dependent();
        let principal = foreign_key.principal();
        let to_principal = foreign_key.dependent_to_principal().map(|n| n.name.clone());
        let to_dependent = foreign_key.principal_to_dependent().map(|n| n.name.clone());

        if foreign_key.is_unique() && foreign_key.principal_end_source().is_none() {
            let as_is = Ends {
                dependent,
                principal,
                navigation: to_principal.as_deref(),
                unique: true,
            };
            let inverted = Ends {
                dependent: principal,
                principal: dependent,
                navigation: to_dependent.as_deref(),
                unique: true,
            };
            if match_properties(model, as_is).is_some() {
                builder.has_principal_end(fk, principal, ConfigurationSource::Convention)?;
            } else if match_properties(model, inverted).is_some() {
                builder.has_principal_end(fk, dependent, ConfigurationSource::Convention)?;
            }
            return Ok(());
        }

        let Some(key) = principal_key(model, principal) else {
            return Ok(());
        };
        let current = foreign_key.properties().to_vec();
        if compatible(model, &current, &key) {
            return Self::key_ownership(builder, fk);
        }

        let ends = Ends {
            dependent,
            principal,
            navigation: to_principal.as_deref(),
            unique: foreign_key.is_unique(),
        };
        let optional = !foreign_key.is_required();
        let required_source = foreign_key.is_required_source();
        let properties = match match_properties(model, ends) {
            Some(matched) => matched,
            None => {
                let prefix = prefixes(model, ends).remove(0);
                let principal_name = short_type_name(model, principal).to_lowercase();
                let mut created = Vec::with_capacity(key.len());
                for (name, scalar) in &key {
                    let base = if to_principal.is_none()
                        && name.to_lowercase().starts_with(&principal_name)
                        && name.len() > principal_name.len()
                    {
                        name.clone()
                    } else {
                        format!("{prefix}{name}")
                    };
                    let name = Self::free_name(builder, dependent, &base);
                    let Some(property) = builder.shadow_property(
                        dependent,
                        &name,
                        *scalar,
                        optional,
                        ConfigurationSource::Convention,
                    )?
                    else {
                        return Ok(());
                    };
                    created.push(property);
                }
                created
            }
        };

        let names: Vec<&str> = properties
            .iter()
            .map(|p| builder.model().property_name(*p))
            .collect();
        tracing::trace!(
            %fk,
            dependent = builder.model().entity_type_name(dependent),
            properties = ?names,
            "foreign key properties discovered"
        );
        if !builder.has_foreign_key_properties(fk, properties.clone(), ConfigurationSource::Convention)? {
            return Ok(());
        }
        let stale: Vec<PropertyId> = current.into_iter().filter(|p| !properties.contains(p)).collect();
        builder.prune_foreign_key_properties(&stale)?;

        let all_non_nullable = properties
            .iter()
            .all(|p| builder.model().property(*p).is_some_and(|p| !p.is_nullable()));
        if required_source.is_none() && all_non_nullable {
            builder.is_required(fk, true, ConfigurationSource::Convention)?;
        }
        Self::key_ownership(builder, fk)
    }

    /// A name not yet taken by a property, navigation or runtime member of `entity`.
    fn free_name(builder: &ModelBuilder, entity: EntityTypeId, base: &str) -> String {
        let model = builder.model();
        let runtime_type = model.entity_type(entity).and_then(|e| e.runtime_type());
        let taken = |name: &str| {
            model.find_property(entity, name).is_some()
                || model.find_navigation(entity, name).is_some()
                || runtime_type.is_some_and(|r| builder.catalog().find_member(r, name).is_some())
        };
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Key an owned dependent by its ownership: a reference ownership shares the
    /// foreign key, a collection ownership adds a shadow ordinal.
    fn key_ownership(builder: &mut ModelBuilder, fk: ForeignKeyId) -> Result<()> {
        let model = builder.model();
        let Some(foreign_key) = model.foreign_key(fk) else {
            return Ok(());
        };
        if !foreign_key.is_ownership() || foreign_key.properties().is_empty() {
            return Ok(());
        }
        let dependent = foreign_key.dependent();
        let mut properties = foreign_key.properties().to_vec();
        let unique = foreign_key.is_unique();
        if !model
            .entity_type(dependent)
            .is_some_and(|e| ConfigurationSource::Convention.overrides(e.primary_key_source()))
        {
            return Ok(());
        }
        if !unique {
            let Some(ordinal) = builder.shadow_property(
                dependent,
                "Id",
                ScalarKind::I32,
                false,
                ConfigurationSource::Convention,
            )?
            else {
                return Ok(());
            };
            if !properties.contains(&ordinal) {
                properties.push(ordinal);
            }
        }
        builder.set_primary_key(dependent, properties, ConfigurationSource::Convention)?;
        Ok(())
    }
}

impl Convention for ForeignKeyPropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "ForeignKeyPropertyDiscoveryConvention"
    }

    fn on_foreign_key_added(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        _ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Self::configure(builder, foreign_key)
    }

    fn on_foreign_key_principal_end_changed(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        _ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Self::configure(builder, foreign_key)
    }

    fn on_foreign_key_ownership_changed(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        _ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Self::configure(builder, foreign_key)
    }

    fn on_foreign_key_removed(
        &self,
        builder: &mut ModelBuilder,
        removed: &RemovedForeignKey,
        _ctx: &mut ConventionContext<RemovedForeignKey>,
    ) -> Result<()> {
        builder.prune_foreign_key_properties(&removed.properties)
    }

    /// Foreign keys touching the hierarchy may now match, or need new properties.
    fn on_primary_key_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        _previous: Option<KeyId>,
        _previous_properties: &[PropertyId],
        _ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        let model = builder.model();
        let mut hierarchy = vec![entity];
        hierarchy.extend(model.derived_types(entity));
        let affected: Vec<ForeignKeyId> = model
            .foreign_keys()
            .filter(|(_, fk)| hierarchy.contains(&fk.principal()) || hierarchy.contains(&fk.dependent()))
            .map(|(id, _)| id)
            .collect();
        for fk in affected {
            Self::configure(builder, fk)?;
        }
        Ok(())
    }
}
