//! The entity store.
//!
//! [`State`] is what orchestration code depends on; [`MemoryState`] is the
//! in-memory implementation persisted as a single JSON document.
//!
//! # Locking
//!
//! Each collection has its own reader/writer lock, so images, instances and
//! volumes never block each other. Within one collection, readers share the
//! lock and an update function holds it exclusively. Locks are not
//! re-entrant: an update function must not call back into the same
//! collection. Nesting updates across collections is allowed only in the
//! order images → instances → volumes.

mod collection;
mod memory;

pub use collection::{Collection, EntityMap};
pub use memory::{MemoryState, StateCounts};

use crate::error::{Result, StateError};
use crate::types::{Image, Instance, Volume};

/// Access to the image, instance and volume registries.
pub trait State {
    /// Copy of every image.
    fn images(&self) -> Result<EntityMap<Image>>;

    /// Copy of every instance.
    fn instances(&self) -> Result<EntityMap<Instance>>;

    /// Copy of every volume.
    fn volumes(&self) -> Result<EntityMap<Volume>>;

    /// Apply `update` to the live image map under the images write lock.
    ///
    /// The result of `update` is returned as-is. Changes are not persisted
    /// until [`State::save`].
    fn modify_images<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Image>) -> std::result::Result<R, E>,
        E: From<StateError>;

    /// Apply `update` to the live instance map under the instances write lock.
    fn modify_instances<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Instance>) -> std::result::Result<R, E>,
        E: From<StateError>;

    /// Apply `update` to the live volume map under the volumes write lock.
    fn modify_volumes<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Volume>) -> std::result::Result<R, E>,
        E: From<StateError>;

    /// Write all three collections to the persistence target.
    fn save(&self) -> Result<()>;

    /// Replace all three collections with the persisted document.
    ///
    /// Requires exclusive access, so no reader or writer can observe the
    /// swap. On failure the current contents are kept.
    fn load(&mut self) -> Result<()>;
}
