//! Model events and the dispatcher's queue state.
//!
//! One dispatcher belongs to one [`ModelBuilder`](crate::ModelBuilder) and is not safe
//! for concurrent use. Events raised while a delay scope is open, or while another
//! event is being dispatched, go to a single FIFO queue instead of recursing. The
//! queue is drained when the outermost dispatch or scope finishes, so cascades never
//! grow the call stack and conventions observe the state left by completed edits.

use modelkit_core::{EntityTypeId, ForeignKeyId, KeyId, NavigationRef, PropertyId};
use std::collections::VecDeque;
use std::fmt;

/// Kinds of model events conventions can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    EntityTypeAdded,
    EntityTypeRemoved,
    BaseTypeChanged,
    EntityTypeMemberIgnored,
    PropertyAdded,
    PrimaryKeyChanged,
    ForeignKeyAdded,
    ForeignKeyRemoved,
    ForeignKeyPrincipalEndChanged,
    ForeignKeyOwnershipChanged,
    NavigationAdded,
    /// Terminal phase; never queued.
    ModelBuilt,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::EntityTypeAdded,
        EventKind::EntityTypeRemoved,
        EventKind::BaseTypeChanged,
        EventKind::EntityTypeMemberIgnored,
        EventKind::PropertyAdded,
        EventKind::PrimaryKeyChanged,
        EventKind::ForeignKeyAdded,
        EventKind::ForeignKeyRemoved,
        EventKind::ForeignKeyPrincipalEndChanged,
        EventKind::ForeignKeyOwnershipChanged,
        EventKind::NavigationAdded,
        EventKind::ModelBuilt,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::EntityTypeAdded => "entity_type_added",
            EventKind::EntityTypeRemoved => "entity_type_removed",
            EventKind::BaseTypeChanged => "base_type_changed",
            EventKind::EntityTypeMemberIgnored => "entity_type_member_ignored",
            EventKind::PropertyAdded => "property_added",
            EventKind::PrimaryKeyChanged => "primary_key_changed",
            EventKind::ForeignKeyAdded => "foreign_key_added",
            EventKind::ForeignKeyRemoved => "foreign_key_removed",
            EventKind::ForeignKeyPrincipalEndChanged => "foreign_key_principal_end_changed",
            EventKind::ForeignKeyOwnershipChanged => "foreign_key_ownership_changed",
            EventKind::NavigationAdded => "navigation_added",
            EventKind::ModelBuilt => "model_built",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is left of an entity type after removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntityType {
    pub id: EntityTypeId,
    pub name: String,
    pub runtime_type: Option<String>,
    /// Owner of a weak type, if it was one.
    pub owner: Option<EntityTypeId>,
    pub defining_navigation: Option<String>,
}

impl RemovedEntityType {
    pub fn was_weak(&self) -> bool {
        self.defining_navigation.is_some()
    }
}

/// What is left of a foreign key after removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedForeignKey {
    pub id: ForeignKeyId,
    pub dependent: EntityTypeId,
    pub principal: EntityTypeId,
    pub properties: Vec<PropertyId>,
    pub dependent_to_principal: Option<String>,
    pub principal_to_dependent: Option<String>,
    pub was_ownership: bool,
}

/// A model mutation waiting to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    EntityTypeAdded(EntityTypeId),
    EntityTypeRemoved(RemovedEntityType),
    BaseTypeChanged {
        entity: EntityTypeId,
        previous: Option<EntityTypeId>,
    },
    EntityTypeMemberIgnored {
        entity: EntityTypeId,
        name: String,
    },
    PropertyAdded(PropertyId),
    PrimaryKeyChanged {
        entity: EntityTypeId,
        previous: Option<KeyId>,
        previous_properties: Vec<PropertyId>,
    },
    ForeignKeyAdded(ForeignKeyId),
    ForeignKeyRemoved(RemovedForeignKey),
    ForeignKeyPrincipalEndChanged(ForeignKeyId),
    ForeignKeyOwnershipChanged(ForeignKeyId),
    NavigationAdded(NavigationRef),
}

impl ModelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ModelEvent::EntityTypeAdded(_) => EventKind::EntityTypeAdded,
            ModelEvent::EntityTypeRemoved(_) => EventKind::EntityTypeRemoved,
            ModelEvent::BaseTypeChanged { .. } => EventKind::BaseTypeChanged,
            ModelEvent::EntityTypeMemberIgnored { .. } => EventKind::EntityTypeMemberIgnored,
            ModelEvent::PropertyAdded(_) => EventKind::PropertyAdded,
            ModelEvent::PrimaryKeyChanged { .. } => EventKind::PrimaryKeyChanged,
            ModelEvent::ForeignKeyAdded(_) => EventKind::ForeignKeyAdded,
            ModelEvent::ForeignKeyRemoved(_) => EventKind::ForeignKeyRemoved,
            ModelEvent::ForeignKeyPrincipalEndChanged(_) => {
                EventKind::ForeignKeyPrincipalEndChanged
            }
            ModelEvent::ForeignKeyOwnershipChanged(_) => EventKind::ForeignKeyOwnershipChanged,
            ModelEvent::NavigationAdded(_) => EventKind::NavigationAdded,
        }
    }
}

/// The subject an immediate dispatch handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    EntityType(EntityTypeId),
    Property(PropertyId),
    ForeignKey(ForeignKeyId),
    Navigation(NavigationRef),
    /// Events about removed objects have no live subject.
    Removed,
}

/// Result of raising an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event went to the queue; conventions have not seen it yet.
    Queued,
    /// Conventions ran; `None` when one of them removed the subject.
    Completed(Option<EventSubject>),
}

/// Token for an open delay scope. Pass it back to
/// [`ModelBuilder::end_delay`](crate::ModelBuilder::end_delay).
#[must_use = "an open delay scope queues every event until it is ended"]
#[derive(Debug)]
pub struct DelayScope {
    depth: usize,
}

impl DelayScope {
    /// Nesting depth of this scope, 1 for the outermost.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Counters for one builder's dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events whose conventions were run.
    pub events_dispatched: usize,
    /// Events that were queued before running.
    pub events_queued: usize,
    /// Individual convention calls.
    pub convention_invocations: usize,
    /// Dispatches ended early by a convention stopping processing.
    pub stopped_dispatches: usize,
    /// Dispatches ended early because the subject was removed.
    pub dead_subjects: usize,
    /// Queued events discarded after a convention error.
    pub discarded_events: usize,
}

/// Queue and scope bookkeeping.
#[derive(Debug, Default)]
pub struct ConventionDispatcher {
    delay_depth: usize,
    draining: bool,
    queue: VecDeque<ModelEvent>,
    stats: DispatchStats,
}

impl ConventionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether newly raised events must wait in the queue.
    pub fn should_queue(&self) -> bool {
        self.delay_depth > 0 || self.draining
    }

    pub fn delay_depth(&self) -> usize {
        self.delay_depth
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub(crate) fn enqueue(&mut self, event: ModelEvent) {
        tracing::trace!(event = event.kind().as_str(), depth = self.delay_depth, "event queued");
        self.stats.events_queued += 1;
        self.queue.push_back(event);
    }

    pub(crate) fn dequeue(&mut self) -> Option<ModelEvent> {
        self.queue.pop_front()
    }

    pub(crate) fn open_scope(&mut self) -> DelayScope {
        self.delay_depth += 1;
        DelayScope {
            depth: self.delay_depth,
        }
    }

    /// Close a scope. Returns true when it was the outermost one and nothing else is
    /// draining, i.e. when the caller must drain the queue now.
    pub(crate) fn close_scope(&mut self, scope: DelayScope) -> bool {
        debug_assert_eq!(scope.depth, self.delay_depth, "delay scopes closed out of order");
        self.delay_depth = self.delay_depth.saturating_sub(1);
        self.delay_depth == 0 && !self.draining
    }

    pub(crate) fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// Drop everything queued; used when a convention fails.
    pub(crate) fn discard_queue(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!(discarded = self.queue.len(), "discarding queued events after error");
            self.stats.discarded_events += self.queue.len();
            self.queue.clear();
        }
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DispatchStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_core::ArenaId;

    #[test]
    fn test_nested_scopes_drain_only_at_outermost() {
        let mut dispatcher = ConventionDispatcher::new();
        assert!(!dispatcher.should_queue());
        let outer = dispatcher.open_scope();
        let inner = dispatcher.open_scope();
        assert_eq!(inner.depth(), 2);
        assert!(dispatcher.should_queue());
        assert!(!dispatcher.close_scope(inner));
        assert!(dispatcher.close_scope(outer));
        assert!(!dispatcher.should_queue());
    }

    #[test]
    fn test_closing_while_draining_defers_to_drain_loop() {
        let mut dispatcher = ConventionDispatcher::new();
        dispatcher.set_draining(true);
        let scope = dispatcher.open_scope();
        assert!(!dispatcher.close_scope(scope));
    }

    #[test]
    fn test_queue_is_fifo_and_discardable() {
        let mut dispatcher = ConventionDispatcher::new();
        let a = EntityTypeId::from_index(0);
        let b = EntityTypeId::from_index(1);
        dispatcher.enqueue(ModelEvent::EntityTypeAdded(a));
        dispatcher.enqueue(ModelEvent::EntityTypeAdded(b));
        assert_eq!(dispatcher.dequeue(), Some(ModelEvent::EntityTypeAdded(a)));
        dispatcher.discard_queue();
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(dispatcher.stats().discarded_events, 1);
        assert_eq!(dispatcher.stats().events_queued, 2);
    }
}
