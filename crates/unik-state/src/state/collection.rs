//! A single lock-guarded entity collection.

use crate::error::{Result, StateError};
use crate::types::Entity;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Entities of one kind, keyed by id.
pub type EntityMap<T> = HashMap<String, T>;

/// One entity collection behind its own reader/writer lock.
///
/// Readers only ever get copies. The live map is reachable solely through
/// [`Collection::modify`], which holds the write lock for the duration of
/// the caller's update function.
#[derive(Debug)]
pub struct Collection<T> {
    entries: RwLock<EntityMap<T>>,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub fn from_map(entries: EntityMap<T>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, EntityMap<T>>> {
        self.entries.read().map_err(|_| StateError::LockPoisoned {
            collection: T::KIND,
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EntityMap<T>>> {
        self.entries.write().map_err(|_| StateError::LockPoisoned {
            collection: T::KIND,
        })
    }

    /// Copy of every entity currently in the collection.
    pub fn snapshot(&self) -> Result<EntityMap<T>> {
        Ok(self.read()?.clone())
    }

    /// Copy of a single entity.
    pub fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.read()?.get(id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Run `update` against the live map under the write lock.
    ///
    /// The lock is released when `update` returns or unwinds. Whatever
    /// `update` returns is passed back untouched; only a poisoned lock is
    /// converted into the caller's error type.
    pub fn modify<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<T>) -> std::result::Result<R, E>,
        E: From<StateError>,
    {
        let mut entries = self.write().map_err(E::from)?;
        update(&mut *entries)
    }

    /// Swap in new contents without locking. Clears a poisoned lock.
    ///
    /// Entries are kept under their document key even when it differs from
    /// the entity's own id.
    pub(crate) fn replace(&mut self, entries: EntityMap<T>) {
        for (key, entity) in &entries {
            if key != entity.id() {
                warn!("Loaded {} under key {} but its id is {}", T::KIND, key, entity.id());
            }
        }
        self.entries = RwLock::new(entries);
    }
}

/// Id-ordered copy of `entries`, as written to disk.
pub(crate) fn sorted_copy<T: Clone>(entries: &EntityMap<T>) -> BTreeMap<String, T> {
    entries
        .iter()
        .map(|(id, entity)| (id.clone(), entity.clone()))
        .collect()
}
