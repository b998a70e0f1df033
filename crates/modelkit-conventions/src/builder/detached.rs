//! Detached snapshots of entity type members and relationships.
//!
//! Composite edits such as converting an owned type into a weak one remove an entity
//! type and build a replacement. The members and the ownership are captured first and
//! re-attached to the replacement with their original configuration sources.

use super::ModelBuilder;
use modelkit_core::{
    ConfigurationSource, EntityTypeId, ForeignKey, ForeignKeyId, MemberKind, Navigation,
    NavigationEnd, PropertyId, Result, ScalarKind, ValueGenerated,
};

/// One property with its configured facets.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedProperty {
    pub name: String,
    pub member: Option<MemberKind>,
    pub scalar: Option<ScalarKind>,
    pub source: ConfigurationSource,
    pub nullable: (bool, Option<ConfigurationSource>),
    pub max_length: (Option<u32>, Option<ConfigurationSource>),
    pub column_type: (Option<String>, Option<ConfigurationSource>),
    pub value_generated: (ValueGenerated, Option<ConfigurationSource>),
}

/// Members and key configuration of an entity type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetachedEntityType {
    pub properties: Vec<DetachedProperty>,
    pub ignored_members: Vec<(String, ConfigurationSource)>,
    pub primary_key: Option<(Vec<String>, ConfigurationSource)>,
    pub keyless: Option<ConfigurationSource>,
}

impl DetachedEntityType {
    /// Re-create the captured members on `entity`.
    pub fn attach(&self, builder: &mut ModelBuilder, entity: EntityTypeId) -> Result<()> {
        builder.delay_conventions(|builder| {
            for (name, source) in &self.ignored_members {
                builder.ignore_member(entity, name, *source)?;
            }
            for detached in &self.properties {
                let added = match (detached.member, detached.scalar) {
                    (Some(_), _) => builder.property(entity, &detached.name, detached.source)?,
                    (None, Some(scalar)) => builder.shadow_property(
                        entity,
                        &detached.name,
                        scalar,
                        detached.nullable.0,
                        detached.source,
                    )?,
                    (None, None) => None,
                };
                let Some(property) = added else {
                    continue;
                };
                if let Some(source) = detached.nullable.1 {
                    builder.is_property_required(property, !detached.nullable.0, source);
                }
                if let Some(source) = detached.max_length.1 {
                    builder.has_max_length(property, detached.max_length.0, source);
                }
                if let Some(source) = detached.column_type.1 {
                    builder.has_column_type(property, detached.column_type.0.as_deref(), source);
                }
                if let Some(source) = detached.value_generated.1 {
                    builder.value_generated(property, detached.value_generated.0, source);
                }
            }
            if let Some((names, source)) = &self.primary_key {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                builder.primary_key(entity, &names, *source)?;
            }
            if let Some(source) = self.keyless {
                builder.has_no_key(entity, source)?;
            }
            Ok(())
        })
    }
}

/// A relationship removed from the model, ready to be re-created.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedRelationship {
    principal: EntityTypeId,
    dependent: EntityTypeId,
    dependent_to_principal: Option<Navigation>,
    principal_to_dependent: Option<Navigation>,
    unique: (bool, Option<ConfigurationSource>),
    required: (bool, Option<ConfigurationSource>),
    ownership: (bool, Option<ConfigurationSource>),
    principal_end_source: Option<ConfigurationSource>,
    property_names: Vec<String>,
    properties_source: Option<ConfigurationSource>,
    source: ConfigurationSource,
}

impl DetachedRelationship {
    pub fn principal(&self) -> EntityTypeId {
        self.principal
    }

    pub fn dependent(&self) -> EntityTypeId {
        self.dependent
    }

    pub fn principal_to_dependent_name(&self) -> Option<String> {
        self.principal_to_dependent.as_ref().map(|n| n.name.clone())
    }

    pub fn is_ownership(&self) -> bool {
        self.ownership.0
    }

    /// Re-create the relationship between its original ends.
    pub fn attach(&self, builder: &mut ModelBuilder) -> Result<Option<ForeignKeyId>> {
        self.attach_to(builder, self.principal, self.dependent)
    }

    /// Re-create the relationship with replacement ends.
    pub fn attach_to(
        &self,
        builder: &mut ModelBuilder,
        principal: EntityTypeId,
        dependent: EntityTypeId,
    ) -> Result<Option<ForeignKeyId>> {
        let model = builder.model();
        if !model.contains_entity_type(principal) || !model.contains_entity_type(dependent) {
            return Ok(None);
        }
        let properties: Option<Vec<PropertyId>> = self
            .property_names
            .iter()
            .map(|name| model.find_property(dependent, name))
            .collect();

        let mut fk = ForeignKey::new(dependent, principal, self.source);
        fk.set_navigation(NavigationEnd::DependentToPrincipal, self.dependent_to_principal.clone());
        fk.set_navigation(NavigationEnd::PrincipalToDependent, self.principal_to_dependent.clone());
        if let Some(source) = self.unique.1 {
            fk.set_unique(self.unique.0, source);
        }
        if let Some(source) = self.required.1 {
            fk.set_required(self.required.0, source);
        }
        if let Some(source) = self.ownership.1 {
            fk.set_ownership(self.ownership.0, source);
        }
        if let Some(source) = self.principal_end_source {
            fk.set_principal_end_source(source);
        }
        match properties {
            Some(properties) if !properties.is_empty() => {
                fk.set_properties(properties, self.properties_source);
            }
            _ => {}
        }
        builder.add_relationship(fk)
    }
}

impl ModelBuilder {
    /// Capture the declared members and key configuration of `entity`.
    pub fn detach_all_members(&self, entity: EntityTypeId) -> Option<DetachedEntityType> {
        let et = self.model.entity_type(entity)?;
        let properties = et
            .declared_properties()
            .iter()
            .filter_map(|p| self.model.property(*p))
            .map(|p| DetachedProperty {
                name: p.name().to_string(),
                member: p.member(),
                scalar: p.scalar(),
                source: p.source(),
                nullable: (p.is_nullable(), p.is_nullable_source()),
                max_length: (p.max_length(), p.max_length_source()),
                column_type: (p.column_type().map(str::to_string), p.column_type_source()),
                value_generated: (p.value_generated(), p.value_generated_source()),
            })
            .collect();
        let primary_key = et.declared_primary_key().and_then(|k| {
            let names = self.model.primary_key_names(entity);
            let source = et.primary_key_source()?;
            self.model.key(k).map(|_| (names, source))
        });
        Some(DetachedEntityType {
            properties,
            ignored_members: et
                .ignored_members()
                .iter()
                .map(|(name, source)| (name.clone(), *source))
                .collect(),
            primary_key,
            keyless: et.keyless_source(),
        })
    }

    /// Capture `fk` and remove it from the model.
    pub fn detach_relationship(&mut self, fk: ForeignKeyId) -> Result<Option<DetachedRelationship>> {
        let Some(foreign_key) = self.model.foreign_key(fk) else {
            return Ok(None);
        };
        let detached = DetachedRelationship {
            principal: foreign_key.principal(),
            dependent: foreign_key.dependent(),
            dependent_to_principal: foreign_key.dependent_to_principal().cloned(),
            principal_to_dependent: foreign_key.principal_to_dependent().cloned(),
            unique: (foreign_key.is_unique(), foreign_key.is_unique_source()),
            required: (foreign_key.is_required(), foreign_key.is_required_source()),
            ownership: (foreign_key.is_ownership(), foreign_key.is_ownership_source()),
            principal_end_source: foreign_key.principal_end_source(),
            property_names: foreign_key
                .properties()
                .iter()
                .map(|p| self.model.property_name(*p).to_string())
                .collect(),
            properties_source: foreign_key.properties_source(),
            source: foreign_key.source(),
        };
        self.remove_foreign_key_unchecked(fk)?;
        Ok(Some(detached))
    }
}
