//! Serializable export of a model for the provider layer.

use crate::error::Result;
use crate::metadata::{
    ConstructorBinding, EntityType, EntityTypeId, Model, NavigationEnd, Property, TypeMapping,
    ValueGenerated,
};
use serde::{Deserialize, Serialize};

/// Flat, name-keyed description of a finished model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub entity_types: Vec<EntityTypeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub properties: Vec<PropertySnapshot>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<ConstructorBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub name: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    pub value_generated: ValueGenerated,
    pub shadow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_mapping: Option<TypeMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    pub principal: String,
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_to_principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_to_dependent: Option<String>,
    pub unique: bool,
    pub required: bool,
    pub ownership: bool,
}

impl ModelSnapshot {
    /// Capture every live entity type, sorted by name.
    pub fn from_model(model: &Model) -> Self {
        let mut entity_types: Vec<EntityTypeSnapshot> = model
            .entity_types()
            .map(|(id, entity)| entity_snapshot(model, id, entity))
            .collect();
        entity_types.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entity_types }
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeSnapshot> {
        self.entity_types.iter().find(|e| e.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Properties and foreign keys are sorted so that snapshots of equivalent models
/// compare equal regardless of the order members were discovered in.
fn entity_snapshot(model: &Model, id: EntityTypeId, entity: &EntityType) -> EntityTypeSnapshot {
    let mut properties: Vec<PropertySnapshot> = entity
        .declared_properties()
        .iter()
        .filter_map(|p| model.property(*p))
        .map(property_snapshot)
        .collect();
    properties.sort_by(|a, b| a.name.cmp(&b.name));
    let mut foreign_keys: Vec<ForeignKeySnapshot> = entity
        .declared_foreign_keys()
        .iter()
        .filter_map(|fk| model.foreign_key(*fk))
        .map(|fk| ForeignKeySnapshot {
            principal: model.entity_type_name(fk.principal()).to_string(),
            properties: fk
                .properties()
                .iter()
                .map(|p| model.property_name(*p).to_string())
                .collect(),
            dependent_to_principal: fk
                .navigation(NavigationEnd::DependentToPrincipal)
                .map(|n| n.name.clone()),
            principal_to_dependent: fk
                .navigation(NavigationEnd::PrincipalToDependent)
                .map(|n| n.name.clone()),
            unique: fk.is_unique(),
            required: fk.is_required(),
            ownership: fk.is_ownership(),
        })
        .collect();
    foreign_keys.sort_by(|a, b| {
        (&a.principal, &a.properties, &a.dependent_to_principal)
            .cmp(&(&b.principal, &b.properties, &b.dependent_to_principal))
    });
    EntityTypeSnapshot {
        name: entity.name().to_string(),
        runtime_type: entity.runtime_type().map(str::to_string),
        base_type: entity
            .base_type()
            .map(|b| model.entity_type_name(b).to_string()),
        owner: entity
            .defining_navigation()
            .map(|d| model.entity_type_name(d.owner).to_string()),
        properties,
        primary_key: if entity.base_type().is_none() {
            model.primary_key_names(id)
        } else {
            Vec::new()
        },
        foreign_keys,
        constructor: entity.constructor_binding().cloned(),
    }
}

fn property_snapshot(property: &Property) -> PropertySnapshot {
    PropertySnapshot {
        name: property.name().to_string(),
        nullable: property.is_nullable(),
        max_length: property.max_length(),
        value_generated: property.value_generated(),
        shadow: property.is_shadow(),
        type_mapping: property.type_mapping().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MemberKind, ScalarKind};
    use crate::metadata::{ForeignKey, Navigation};
    use crate::source::ConfigurationSource::{Convention, Explicit};

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut model = Model::new();
        let blog = model.add_entity_type("Blog", Some("Blog"), Explicit).unwrap();
        let post = model.add_entity_type("Post", Some("Post"), Explicit).unwrap();
        let id = model
            .add_property(
                Property::new("Id", blog, Some(ScalarKind::I32), false, Convention)
                    .with_member(MemberKind::Property),
            )
            .unwrap();
        let key = model.add_key(blog, vec![id], Convention).unwrap();
        model.set_primary_key(blog, Some(key), Some(Convention));
        let blog_id = model
            .add_property(Property::new("BlogId", post, Some(ScalarKind::I32), false, Convention))
            .unwrap();
        let mut fk = ForeignKey::new(post, blog, Convention);
        fk.set_navigation(NavigationEnd::PrincipalToDependent, Some(Navigation::new("Posts", Convention)));
        fk.set_properties(vec![blog_id], Some(Convention));
        model.add_foreign_key(fk).unwrap();

        let snapshot = ModelSnapshot::from_model(&model);
        let blog = snapshot.entity_type("Blog").unwrap();
        assert_eq!(blog.primary_key, vec!["Id"]);
        let post = snapshot.entity_type("Post").unwrap();
        assert_eq!(post.foreign_keys[0].properties, vec!["BlogId"]);
        assert!(post.properties[0].shadow);

        let json = snapshot.to_json().unwrap();
        assert_eq!(ModelSnapshot::from_json(&json).unwrap(), snapshot);
    }
}
