//! Append-only arenas for metadata objects.
//!
//! Each metadata kind lives in its own `Arena<I, T>` and is addressed by a dense
//! `u32` handle. Removal empties a slot but never recycles it, so a handle to a
//! removed object stays dead forever instead of aliasing a newer one. Liveness
//! checks during convention dispatch rely on this.
//!
//! # Determinism
//! - Handle ordering is by the inner `u32`, i.e. by creation order.
//! - Iteration visits live slots in index order.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// A dense handle into an [`Arena`].
pub trait ArenaId: Copy + Eq + Ord + Hash + fmt::Debug {
    /// Build a handle from a slot index.
    fn from_index(index: u32) -> Self;
    /// The slot index.
    fn index(self) -> u32;
}

/// Declare a `u32` newtype handle implementing [`ArenaId`].
#[macro_export]
macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $crate::arena::ArenaId for $name {
            #[inline]
            fn from_index(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            fn index(self) -> u32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

/// Slot storage that never reuses indices.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _id: PhantomData<fn() -> I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _id: PhantomData,
        }
    }

    /// Store a value and return its handle.
    pub fn insert(&mut self, value: T) -> I {
        let id = I::from_index(self.slots.len() as u32);
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    /// Borrow a live value.
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index() as usize).and_then(Option::as_ref)
    }

    /// Mutably borrow a live value.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index() as usize).and_then(Option::as_mut)
    }

    /// Remove a value. The slot stays empty for the arena's lifetime.
    pub fn remove(&mut self, id: I) -> Option<T> {
        let value = self.slots.get_mut(id.index() as usize)?.take();
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    /// Whether the handle refers to a live value.
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Iterate live values in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (I::from_index(i as u32), v)))
    }

    /// Mutably iterate live values in creation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (I::from_index(i as u32), v)))
    }

    /// Handles of all live values in creation order.
    pub fn ids(&self) -> Vec<I> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
