//! Reading and writing the state document on disk.
//!
//! Two write strategies are supported (see [`WriteMode`]):
//! 1. Overwrite: a single write straight to the target path
//! 2. Atomic: temp file in the same directory, fsync, optional `.bak` of the
//!    previous file, then rename over the target
//!
//! Reads never fall back to an empty document: a missing file is an error.

use crate::config::{StateConfig, WriteMode};
use crate::error::{Result, StateError};
use crate::persist::StateDocument;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Read and parse the state document at `path`.
pub fn read_document(path: &Path) -> Result<StateDocument> {
    let data = fs::read(path).map_err(|e| {
        StateError::io_with_path(
            e,
            format!("Failed to read state file {}", path.display()),
            path,
        )
    })?;

    serde_json::from_slice(&data).map_err(|e| StateError::deserialize(e, path))
}

/// Serialize `document` and write it to `path`.
///
/// Creates the parent directory first if it is missing.
pub fn write_document(path: &Path, document: &StateDocument, mode: WriteMode) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(document).map_err(|e| StateError::Serialize {
        message: format!("{} ({})", e, path.display()),
        source: Some(e),
    })?;

    ensure_parent_dir(path)?;

    match mode {
        WriteMode::Overwrite => overwrite(path, &serialized)?,
        WriteMode::Atomic { keep_backup } => replace_atomically(path, &serialized, keep_backup)?,
    }

    debug!("Wrote {} bytes of state to {}", serialized.len(), path.display());
    Ok(())
}

/// Directory that holds `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = parent_dir(path);
    if parent.exists() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(StateConfig::DIR_MODE);

    builder.create(parent).map_err(|e| {
        StateError::io_with_path(
            e,
            format!("Failed to create directory {}", parent.display()),
            parent,
        )
    })?;
    debug!("Created state directory {}", parent.display());
    Ok(())
}

fn overwrite(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(StateConfig::FILE_MODE);

    let write_err = |e: std::io::Error| {
        StateError::io_with_path(
            e,
            format!("Failed to write state file {}", path.display()),
            path,
        )
    };

    let mut file = options.open(path).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    Ok(())
}

fn replace_atomically(path: &Path, data: &[u8], keep_backup: bool) -> Result<()> {
    let dir = parent_dir(path);

    let mut temp = tempfile::Builder::new()
        .prefix(StateConfig::TEMP_PREFIX)
        .suffix(StateConfig::TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| {
            StateError::io_with_path(
                e,
                format!("Failed to create temp file in {}", dir.display()),
                dir,
            )
        })?;

    let temp_err = |e: std::io::Error| {
        StateError::io_with_path(
            e,
            format!("Failed to write temp file for {}", path.display()),
            path,
        )
    };

    temp.write_all(data).map_err(temp_err)?;
    temp.flush().map_err(temp_err)?;
    temp.as_file().sync_all().map_err(temp_err)?;
    #[cfg(unix)]
    temp.as_file()
        .set_permissions(fs::Permissions::from_mode(StateConfig::FILE_MODE))
        .map_err(temp_err)?;

    if keep_backup && path.exists() {
        let backup_path = StateConfig::backup_path(path);
        if let Err(e) = fs::copy(path, &backup_path) {
            // The new document is still written.
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    temp.persist(path).map_err(|e| {
        StateError::io_with_path(
            e.error,
            format!("Failed to rename temp file over {}", path.display()),
            path,
        )
    })?;
    Ok(())
}
