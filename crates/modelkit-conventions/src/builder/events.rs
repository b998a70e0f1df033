//! Event raising, dispatch and delay scopes.

use super::ModelBuilder;
use crate::context::ConventionContext;
use crate::convention::Convention;
use crate::dispatcher::{
    DelayScope, DispatchOutcome, EventKind, EventSubject, ModelEvent, RemovedEntityType,
    RemovedForeignKey,
};
use modelkit_core::{
    EntityTypeId, ForeignKeyId, KeyId, Model, NavigationRef, PropertyId, Result,
};
use std::fmt;
use std::rc::Rc;

impl ModelBuilder {
    // ==================== Delay scopes ====================

    /// Open a delay scope. Events raised until the matching [`end_delay`](Self::end_delay)
    /// are queued; closing the outermost scope drains the queue in FIFO order.
    pub fn begin_delay(&mut self) -> DelayScope {
        self.dispatcher.open_scope()
    }

    /// Close a delay scope, draining the queue if it was the outermost one.
    pub fn end_delay(&mut self, scope: DelayScope) -> Result<()> {
        if self.dispatcher.close_scope(scope) {
            self.run_immediately(|_| Ok(()))?;
        }
        Ok(())
    }

    /// Run `f` inside a delay scope. Conventions see none of the events `f` raises
    /// until it returns. If `f` fails at the outermost level the queued events are
    /// discarded; the model keeps whatever `f` already changed.
    pub fn delay_conventions<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let scope = self.begin_delay();
        match f(self) {
            Ok(value) => {
                self.end_delay(scope)?;
                Ok(value)
            }
            Err(e) => {
                if self.dispatcher.close_scope(scope) {
                    self.dispatcher.discard_queue();
                }
                Err(e)
            }
        }
    }

    // ==================== Raising ====================

    /// Dispatch `event` now, or queue it if a scope is open or a dispatch is running.
    pub(crate) fn raise(&mut self, event: ModelEvent) -> Result<DispatchOutcome> {
        if self.dispatcher.should_queue() {
            self.dispatcher.enqueue(event);
            return Ok(DispatchOutcome::Queued);
        }
        self.run_immediately(|builder| builder.run_event(event))
            .map(DispatchOutcome::Completed)
    }

    /// Run `f` as the outermost dispatch, then drain everything it queued.
    fn run_immediately<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.dispatcher.set_draining(true);
        let result = f(self).and_then(|value| {
            while let Some(event) = self.dispatcher.dequeue() {
                self.run_event(event)?;
            }
            Ok(value)
        });
        self.dispatcher.set_draining(false);
        if result.is_err() {
            self.dispatcher.discard_queue();
        }
        result
    }

    /// Entity type subject after raising: replaced, removed, or still alive.
    pub(crate) fn entity_outcome(
        &self,
        outcome: DispatchOutcome,
        original: EntityTypeId,
    ) -> Option<EntityTypeId> {
        let id = match outcome {
            DispatchOutcome::Queued => original,
            DispatchOutcome::Completed(Some(EventSubject::EntityType(id))) => id,
            DispatchOutcome::Completed(_) => return None,
        };
        self.model.contains_entity_type(id).then_some(id)
    }

    pub(crate) fn property_outcome(
        &self,
        outcome: DispatchOutcome,
        original: PropertyId,
    ) -> Option<PropertyId> {
        let id = match outcome {
            DispatchOutcome::Queued => original,
            DispatchOutcome::Completed(Some(EventSubject::Property(id))) => id,
            DispatchOutcome::Completed(_) => return None,
        };
        self.model.contains_property(id).then_some(id)
    }

    pub(crate) fn foreign_key_outcome(
        &self,
        outcome: DispatchOutcome,
        original: ForeignKeyId,
    ) -> Option<ForeignKeyId> {
        let id = match outcome {
            DispatchOutcome::Queued => original,
            DispatchOutcome::Completed(Some(EventSubject::ForeignKey(id))) => id,
            DispatchOutcome::Completed(_) => return None,
        };
        self.model.contains_foreign_key(id).then_some(id)
    }

    // ==================== Dispatch ====================

    fn run_event(&mut self, event: ModelEvent) -> Result<Option<EventSubject>> {
        let kind = event.kind();
        tracing::debug!(event = kind.as_str(), "dispatching model event");
        self.dispatcher.stats_mut().events_dispatched += 1;
        match event {
            ModelEvent::EntityTypeAdded(entity) => Ok(self
                .dispatch(kind, entity, entity_alive, |c, b, e, ctx| {
                    c.on_entity_type_added(b, e, ctx)
                })?
                .map(EventSubject::EntityType)),
            ModelEvent::EntityTypeRemoved(removed) => {
                self.dispatch(kind, removed, always_alive, |c, b, r: RemovedEntityType, ctx| {
                    c.on_entity_type_removed(b, &r, ctx)
                })?;
                Ok(Some(EventSubject::Removed))
            }
            ModelEvent::BaseTypeChanged { entity, previous } => Ok(self
                .dispatch(kind, entity, entity_alive, |c, b, e, ctx| {
                    c.on_base_type_changed(b, e, previous, ctx)
                })?
                .map(EventSubject::EntityType)),
            ModelEvent::EntityTypeMemberIgnored { entity, name } => Ok(self
                .dispatch(kind, entity, entity_alive, |c, b, e, ctx| {
                    c.on_entity_type_member_ignored(b, e, &name, ctx)
                })?
                .map(EventSubject::EntityType)),
            ModelEvent::PropertyAdded(property) => Ok(self
                .dispatch(kind, property, property_alive, |c, b, p, ctx| {
                    c.on_property_added(b, p, ctx)
                })?
                .map(EventSubject::Property)),
            ModelEvent::PrimaryKeyChanged {
                entity,
                previous,
                previous_properties,
            } => Ok(self
                .dispatch(kind, entity, entity_alive, |c, b, e, ctx| {
                    c.on_primary_key_changed(b, e, previous, &previous_properties, ctx)
                })?
                .map(EventSubject::EntityType)),
            ModelEvent::ForeignKeyAdded(fk) => Ok(self
                .dispatch(kind, fk, foreign_key_alive, |c, b, fk, ctx| {
                    c.on_foreign_key_added(b, fk, ctx)
                })?
                .map(EventSubject::ForeignKey)),
            ModelEvent::ForeignKeyRemoved(removed) => {
                self.dispatch(kind, removed, always_alive, |c, b, r: RemovedForeignKey, ctx| {
                    c.on_foreign_key_removed(b, &r, ctx)
                })?;
                Ok(Some(EventSubject::Removed))
            }
            ModelEvent::ForeignKeyPrincipalEndChanged(fk) => Ok(self
                .dispatch(kind, fk, foreign_key_alive, |c, b, fk, ctx| {
                    c.on_foreign_key_principal_end_changed(b, fk, ctx)
                })?
                .map(EventSubject::ForeignKey)),
            ModelEvent::ForeignKeyOwnershipChanged(fk) => Ok(self
                .dispatch(kind, fk, foreign_key_alive, |c, b, fk, ctx| {
                    c.on_foreign_key_ownership_changed(b, fk, ctx)
                })?
                .map(EventSubject::ForeignKey)),
            ModelEvent::NavigationAdded(navigation) => Ok(self
                .dispatch(kind, navigation, navigation_alive, |c, b, n, ctx| {
                    c.on_navigation_added(b, n, ctx)
                })?
                .map(EventSubject::Navigation)),
        }
    }

    /// Invoke each convention registered for `kind` in order until one stops
    /// processing or the subject dies.
    fn dispatch<T>(
        &mut self,
        kind: EventKind,
        subject: T,
        alive: fn(&Model, &T) -> bool,
        invoke: impl Fn(&dyn Convention, &mut Self, T, &mut ConventionContext<T>) -> Result<()>,
    ) -> Result<Option<T>>
    where
        T: Clone + PartialEq + fmt::Debug,
    {
        let conventions: Vec<Rc<dyn Convention>> = self.conventions.get(kind).to_vec();
        let mut ctx = ConventionContext::new(subject);
        for convention in conventions {
            if !alive(&self.model, ctx.subject()) {
                self.dispatcher.stats_mut().dead_subjects += 1;
                tracing::trace!(event = kind.as_str(), "subject removed; dispatch ends");
                return Ok(None);
            }
            ctx.begin();
            self.dispatcher.stats_mut().convention_invocations += 1;
            tracing::trace!(
                event = kind.as_str(),
                convention = convention.name(),
                subject = ?ctx.subject(),
                "invoking convention"
            );
            invoke(convention.as_ref(), self, ctx.subject().clone(), &mut ctx)?;
            if ctx.is_stopped() {
                self.dispatcher.stats_mut().stopped_dispatches += 1;
                tracing::trace!(
                    event = kind.as_str(),
                    convention = convention.name(),
                    "convention stopped processing"
                );
                break;
            }
        }
        ctx.complete();
        Ok(ctx.into_result().filter(|s| alive(&self.model, s)))
    }

    /// Run the model-built conventions, each inside its own delay scope.
    pub(crate) fn run_model_built(&mut self) -> Result<()> {
        let conventions: Vec<Rc<dyn Convention>> =
            self.conventions.get(EventKind::ModelBuilt).to_vec();
        let mut ctx = ConventionContext::new(());
        for convention in conventions {
            ctx.begin();
            self.dispatcher.stats_mut().convention_invocations += 1;
            tracing::debug!(convention = convention.name(), "running model-built convention");
            self.delay_conventions(|builder| convention.on_model_built(builder, &mut ctx))?;
            if ctx.is_stopped() {
                self.dispatcher.stats_mut().stopped_dispatches += 1;
                break;
            }
        }
        ctx.complete();
        Ok(())
    }

    // ==================== Typed raisers ====================

    pub(crate) fn raise_entity_type_added(&mut self, entity: EntityTypeId) -> Result<Option<EntityTypeId>> {
        let outcome = self.raise(ModelEvent::EntityTypeAdded(entity))?;
        Ok(self.entity_outcome(outcome, entity))
    }

    pub(crate) fn raise_base_type_changed(
        &mut self,
        entity: EntityTypeId,
        previous: Option<EntityTypeId>,
    ) -> Result<()> {
        self.raise(ModelEvent::BaseTypeChanged { entity, previous })?;
        Ok(())
    }

    pub(crate) fn raise_property_added(&mut self, property: PropertyId) -> Result<Option<PropertyId>> {
        let outcome = self.raise(ModelEvent::PropertyAdded(property))?;
        Ok(self.property_outcome(outcome, property))
    }

    pub(crate) fn raise_primary_key_changed(
        &mut self,
        entity: EntityTypeId,
        previous: Option<KeyId>,
        previous_properties: Vec<PropertyId>,
    ) -> Result<()> {
        self.raise(ModelEvent::PrimaryKeyChanged {
            entity,
            previous,
            previous_properties,
        })?;
        Ok(())
    }

    pub(crate) fn raise_foreign_key_added(&mut self, fk: ForeignKeyId) -> Result<Option<ForeignKeyId>> {
        let outcome = self.raise(ModelEvent::ForeignKeyAdded(fk))?;
        Ok(self.foreign_key_outcome(outcome, fk))
    }

    pub(crate) fn raise_navigation_added(&mut self, navigation: NavigationRef) -> Result<()> {
        self.raise(ModelEvent::NavigationAdded(navigation))?;
        Ok(())
    }
}

fn always_alive<T>(_model: &Model, _subject: &T) -> bool {
    true
}

fn entity_alive(model: &Model, entity: &EntityTypeId) -> bool {
    model.contains_entity_type(*entity)
}

fn property_alive(model: &Model, property: &PropertyId) -> bool {
    model.contains_property(*property)
}

fn foreign_key_alive(model: &Model, fk: &ForeignKeyId) -> bool {
    model.contains_foreign_key(*fk)
}

fn navigation_alive(model: &Model, navigation: &NavigationRef) -> bool {
    model.navigation(*navigation).is_some()
}
