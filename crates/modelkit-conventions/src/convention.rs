//! The convention trait.
//!
//! A convention is a stateless rule unit. It overrides the hooks for the event kinds it
//! is registered under; every other hook is a no-op. Hooks receive the builder (all
//! model mutation goes through it and raises further events), the event's subject and
//! the dispatch context used to stop propagation.

use crate::builder::ModelBuilder;
use crate::context::ConventionContext;
use crate::dispatcher::{RemovedEntityType, RemovedForeignKey};
use modelkit_core::{EntityTypeId, ForeignKeyId, KeyId, NavigationRef, PropertyId, Result};

/// A rule that reacts to model events.
#[allow(unused_variables)]
pub trait Convention {
    /// Stable name used to locate the convention in a [`ConventionSet`](crate::ConventionSet).
    fn name(&self) -> &'static str;

    fn on_entity_type_added(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_entity_type_removed(
        &self,
        builder: &mut ModelBuilder,
        removed: &RemovedEntityType,
        ctx: &mut ConventionContext<RemovedEntityType>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_base_type_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        previous: Option<EntityTypeId>,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_entity_type_member_ignored(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        name: &str,
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_property_added(
        &self,
        builder: &mut ModelBuilder,
        property: PropertyId,
        ctx: &mut ConventionContext<PropertyId>,
    ) -> Result<()> {
        Ok(())
    }

    /// `previous_properties` are the old key's properties; some may be gone.
    fn on_primary_key_changed(
        &self,
        builder: &mut ModelBuilder,
        entity: EntityTypeId,
        previous: Option<KeyId>,
        previous_properties: &[PropertyId],
        ctx: &mut ConventionContext<EntityTypeId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_foreign_key_added(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_foreign_key_removed(
        &self,
        builder: &mut ModelBuilder,
        removed: &RemovedForeignKey,
        ctx: &mut ConventionContext<RemovedForeignKey>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_foreign_key_principal_end_changed(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_foreign_key_ownership_changed(
        &self,
        builder: &mut ModelBuilder,
        foreign_key: ForeignKeyId,
        ctx: &mut ConventionContext<ForeignKeyId>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_navigation_added(
        &self,
        builder: &mut ModelBuilder,
        navigation: NavigationRef,
        ctx: &mut ConventionContext<NavigationRef>,
    ) -> Result<()> {
        Ok(())
    }

    /// Validation and finishing pass. Runs inside its own delay scope.
    fn on_model_built(
        &self,
        builder: &mut ModelBuilder,
        ctx: &mut ConventionContext<()>,
    ) -> Result<()> {
        Ok(())
    }
}
