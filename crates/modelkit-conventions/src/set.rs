//! Ordered convention registry and plugins.
//!
//! A [`ConventionSet`] maps each [`EventKind`] to an ordered list of conventions. It is
//! assembled once, optionally reshaped by [`ConventionSetPlugin`]s in registration
//! order, and then frozen behind an `Rc` for the lifetime of a model.

use crate::convention::Convention;
use crate::dispatcher::EventKind;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Conventions per event kind, in invocation order.
#[derive(Clone, Default)]
pub struct ConventionSet {
    conventions: BTreeMap<EventKind, Vec<Rc<dyn Convention>>>,
}

impl ConventionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventions registered for `kind`, in order.
    pub fn get(&self, kind: EventKind) -> &[Rc<dyn Convention>] {
        self.conventions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a convention to `kind`'s list.
    pub fn push(&mut self, kind: EventKind, convention: Rc<dyn Convention>) -> &mut Self {
        self.conventions.entry(kind).or_default().push(convention);
        self
    }

    /// Insert before the convention named `before`. Returns false if it is absent.
    pub fn insert_before(
        &mut self,
        kind: EventKind,
        before: &str,
        convention: Rc<dyn Convention>,
    ) -> bool {
        let list = self.conventions.entry(kind).or_default();
        match list.iter().position(|c| c.name() == before) {
            Some(index) => {
                list.insert(index, convention);
                true
            }
            None => false,
        }
    }

    /// Insert after the convention named `after`. Returns false if it is absent.
    pub fn insert_after(
        &mut self,
        kind: EventKind,
        after: &str,
        convention: Rc<dyn Convention>,
    ) -> bool {
        let list = self.conventions.entry(kind).or_default();
        match list.iter().position(|c| c.name() == after) {
            Some(index) => {
                list.insert(index + 1, convention);
                true
            }
            None => false,
        }
    }

    /// Replace every registration of the convention named `name`, keeping positions.
    /// Returns the number of replaced entries.
    pub fn replace(&mut self, name: &str, convention: &Rc<dyn Convention>) -> usize {
        let mut replaced = 0;
        for list in self.conventions.values_mut() {
            for slot in list.iter_mut().filter(|c| c.name() == name) {
                *slot = Rc::clone(convention);
                replaced += 1;
            }
        }
        replaced
    }

    /// Remove the convention named `name` from every event kind.
    pub fn remove(&mut self, name: &str) -> usize {
        let mut removed = 0;
        for list in self.conventions.values_mut() {
            let before = list.len();
            list.retain(|c| c.name() != name);
            removed += before - list.len();
        }
        removed
    }

    /// Remove the convention named `name` from one event kind.
    pub fn remove_from(&mut self, kind: EventKind, name: &str) -> bool {
        let Some(list) = self.conventions.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| c.name() != name);
        before != list.len()
    }

    pub fn contains(&self, kind: EventKind, name: &str) -> bool {
        self.get(kind).iter().any(|c| c.name() == name)
    }

    /// Names registered for `kind`, in order.
    pub fn names(&self, kind: EventKind) -> Vec<&'static str> {
        self.get(kind).iter().map(|c| c.name()).collect()
    }
}

impl fmt::Debug for ConventionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, list) in &self.conventions {
            let names: Vec<&str> = list.iter().map(|c| c.name()).collect();
            map.entry(&kind.as_str(), &names);
        }
        map.finish()
    }
}

/// A named post-processing step applied to a convention set before it is frozen.
pub trait ConventionSetPlugin {
    fn name(&self) -> &str;

    fn modify(&self, set: &mut ConventionSet);
}

/// Applies plugins in order and freezes the result.
#[derive(Default)]
pub struct ConventionSetBuilder {
    set: ConventionSet,
    plugins: Vec<Box<dyn ConventionSetPlugin>>,
}

impl ConventionSetBuilder {
    pub fn new(base: ConventionSet) -> Self {
        Self {
            set: base,
            plugins: Vec::new(),
        }
    }

    #[must_use]
    pub fn plugin(mut self, plugin: impl ConventionSetPlugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Run every plugin and freeze the set.
    pub fn build(mut self) -> Rc<ConventionSet> {
        for plugin in &self.plugins {
            tracing::debug!(plugin = plugin.name(), "applying convention set plugin");
            plugin.modify(&mut self.set);
        }
        Rc::new(self.set)
    }
}
