//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;
use unik_state::{Entity, EntityMap, Image, Instance, MemoryState, State, StateError, StateOptions, Volume};

/// Which collection a command works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Images,
    Instances,
    Volumes,
}

impl Kind {
    fn entity_kind(self) -> &'static str {
        match self {
            Kind::Images => Image::KIND,
            Kind::Instances => Instance::KIND,
            Kind::Volumes => Volume::KIND,
        }
    }
}

fn open(path: &Path) -> Result<MemoryState> {
    // Rewrites go through a temp file so a daemon never reads a half-written state
    let options = StateOptions::new(path).atomic(true);
    MemoryState::open(options).with_context(|| format!("Failed to load state from {}", path.display()))
}

fn write_json<T: Serialize, W: Write>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn sorted<T>(entries: EntityMap<T>) -> BTreeMap<String, T> {
    entries.into_iter().collect()
}

pub fn summary<W: Write>(path: &Path, out: &mut W) -> Result<()> {
    let state = open(path)?;
    write_json(out, &state.counts()?)
}

pub fn list<W: Write>(path: &Path, kind: Kind, out: &mut W) -> Result<()> {
    let state = open(path)?;
    match kind {
        Kind::Images => write_json(out, &sorted(state.images()?)),
        Kind::Instances => write_json(out, &sorted(state.instances()?)),
        Kind::Volumes => write_json(out, &sorted(state.volumes()?)),
    }
}

/// Take `id` out of `entries`, failing if it is absent.
fn take<T: Entity>(entries: &mut EntityMap<T>, id: &str) -> unik_state::Result<T> {
    entries.remove(id).ok_or_else(|| StateError::NotFound {
        kind: T::KIND,
        id: id.to_string(),
    })
}

/// Remove `id` from the `kind` collection and return the removed entity's id.
fn remove_entity<S: State>(state: &S, kind: Kind, id: &str) -> unik_state::Result<String> {
    match kind {
        Kind::Images => state.modify_images(|images| take(images, id).map(|e| e.id().to_string())),
        Kind::Instances => {
            state.modify_instances(|instances| take(instances, id).map(|e| e.id().to_string()))
        }
        Kind::Volumes => state.modify_volumes(|volumes| take(volumes, id).map(|e| e.id().to_string())),
    }
}

pub fn remove(path: &Path, kind: Kind, id: &str) -> Result<()> {
    let state = open(path)?;
    let removed = remove_entity(&state, kind, id)?;
    state
        .save()
        .with_context(|| format!("Failed to save state to {}", path.display()))?;
    info!("Removed {} {} from {}", kind.entity_kind(), removed, path.display());
    Ok(())
}

pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    MemoryState::new(path)
        .save()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Initialized empty state at {}", path.display());
    Ok(())
}
