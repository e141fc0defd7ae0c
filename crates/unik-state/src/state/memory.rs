//! In-memory [`State`] persisted as one JSON document.

use super::collection::{sorted_copy, Collection, EntityMap};
use super::State;
use crate::config::{SnapshotConsistency, StateOptions};
use crate::error::{Result, StateError};
use crate::persist::{read_document, write_document, StateDocument};
use crate::types::{Image, Instance, Volume};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Number of entities in each collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCounts {
    pub images: usize,
    pub instances: usize,
    pub volumes: usize,
}

/// Thread-safe store for images, instances and volumes.
///
/// Share it behind an `Arc` once loaded. `save` is serialized by its own
/// lock but does not block writers for longer than it takes to copy each
/// collection; with [`SnapshotConsistency::PerCollection`] (the default) a
/// save racing with writers may record different collections at slightly
/// different moments. Use [`SnapshotConsistency::Global`] when the document
/// must be a single point in time.
#[derive(Debug)]
pub struct MemoryState {
    images: Collection<Image>,
    instances: Collection<Instance>,
    volumes: Collection<Volume>,
    /// Serializes saves against each other
    save_lock: Mutex<()>,
    options: StateOptions,
}

impl MemoryState {
    /// Create an empty store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(StateOptions::new(path))
    }

    /// Create an empty store with explicit options.
    pub fn with_options(options: StateOptions) -> Self {
        Self {
            images: Collection::new(),
            instances: Collection::new(),
            volumes: Collection::new(),
            save_lock: Mutex::new(()),
            options,
        }
    }

    /// Create a store and load it from its persistence target.
    ///
    /// Fails if the file is missing; check [`StateError::is_not_found`] to
    /// start from an empty store instead.
    pub fn open(options: StateOptions) -> Result<Self> {
        let mut state = Self::with_options(options);
        state.load()?;
        Ok(state)
    }

    /// The persistence target.
    pub fn path(&self) -> &Path {
        &self.options.path
    }

    pub fn options(&self) -> &StateOptions {
        &self.options
    }

    /// Copy of one image.
    pub fn image(&self, id: &str) -> Result<Option<Image>> {
        self.images.get(id)
    }

    /// Copy of one instance.
    pub fn instance(&self, id: &str) -> Result<Option<Instance>> {
        self.instances.get(id)
    }

    /// Copy of one volume.
    pub fn volume(&self, id: &str) -> Result<Option<Volume>> {
        self.volumes.get(id)
    }

    /// Size of each collection, each read under its own lock.
    pub fn counts(&self) -> Result<StateCounts> {
        Ok(StateCounts {
            images: self.images.len()?,
            instances: self.instances.len()?,
            volumes: self.volumes.len()?,
        })
    }

    /// Copy the three collections into a document.
    fn capture(&self) -> Result<StateDocument> {
        match self.options.consistency {
            SnapshotConsistency::PerCollection => {
                // Each read guard is dropped at the end of its statement.
                let images = sorted_copy(&*self.images.read()?);
                let instances = sorted_copy(&*self.instances.read()?);
                let volumes = sorted_copy(&*self.volumes.read()?);
                Ok(StateDocument {
                    images,
                    instances,
                    volumes,
                })
            }
            SnapshotConsistency::Global => {
                let images = self.images.read()?;
                let instances = self.instances.read()?;
                let volumes = self.volumes.read()?;
                Ok(StateDocument {
                    images: sorted_copy(&*images),
                    instances: sorted_copy(&*instances),
                    volumes: sorted_copy(&*volumes),
                })
            }
        }
    }

    fn restore(&mut self, document: StateDocument) {
        self.images.replace(document.images.into_iter().collect());
        self.instances.replace(document.instances.into_iter().collect());
        self.volumes.replace(document.volumes.into_iter().collect());
    }
}

impl State for MemoryState {
    fn images(&self) -> Result<EntityMap<Image>> {
        self.images.snapshot()
    }

    fn instances(&self) -> Result<EntityMap<Instance>> {
        self.instances.snapshot()
    }

    fn volumes(&self) -> Result<EntityMap<Volume>> {
        self.volumes.snapshot()
    }

    fn modify_images<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Image>) -> std::result::Result<R, E>,
        E: From<StateError>,
    {
        self.images.modify(update)
    }

    fn modify_instances<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Instance>) -> std::result::Result<R, E>,
        E: From<StateError>,
    {
        self.instances.modify(update)
    }

    fn modify_volumes<F, R, E>(&self, update: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut EntityMap<Volume>) -> std::result::Result<R, E>,
        E: From<StateError>,
    {
        self.volumes.modify(update)
    }

    fn save(&self) -> Result<()> {
        // Guards no data, so a panic in an earlier save leaves nothing to repair.
        let _lock = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let document = self.capture()?;
        debug!(
            "Saving state to {} ({} images, {} instances, {} volumes)",
            self.path().display(),
            document.images.len(),
            document.instances.len(),
            document.volumes.len()
        );
        write_document(&self.options.path, &document, self.options.write_mode)
    }

    fn load(&mut self) -> Result<()> {
        let document = read_document(&self.options.path)?;
        debug!(
            "Loaded state from {} ({} images, {} instances, {} volumes)",
            self.path().display(),
            document.images.len(),
            document.instances.len(),
            document.volumes.len()
        );
        self.restore(document);
        Ok(())
    }
}
