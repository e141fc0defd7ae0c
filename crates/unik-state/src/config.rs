//! Configuration for the state store.
//!
//! Constants for the on-disk layout live in [`StateConfig`]; per-store
//! runtime choices (where to persist, how to write, how consistent a save
//! must be) live in [`StateOptions`].

use std::path::{Path, PathBuf};

/// On-disk layout and naming constants.
pub struct StateConfig;

impl StateConfig {
    /// Directory under the user's home that holds unik runtime data.
    pub const DIR_NAME: &'static str = ".unik";
    pub const FILE_NAME: &'static str = "state.json";
    /// Overrides [`StateConfig::default_state_path`] when set.
    pub const PATH_ENV_VAR: &'static str = "UNIK_STATE_FILE";

    /// Unix mode for directories created by `save`.
    pub const DIR_MODE: u32 = 0o751;
    /// Unix mode for the state file.
    pub const FILE_MODE: u32 = 0o644;

    pub const BACKUP_EXTENSION: &'static str = "bak";
    pub const TEMP_PREFIX: &'static str = ".state-";
    pub const TEMP_SUFFIX: &'static str = ".tmp";

    /// Default persistence target: `$UNIK_STATE_FILE`, else `~/.unik/state.json`.
    ///
    /// Returns `None` only when neither the variable nor a home directory is available.
    pub fn default_state_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(Self::PATH_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|home| home.join(Self::DIR_NAME).join(Self::FILE_NAME))
    }

    /// Path of the backup copy kept by [`WriteMode::Atomic`].
    pub fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(Self::BACKUP_EXTENSION);
        path.with_file_name(name)
    }
}

/// How `save` puts the document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write the document straight over the target path.
    ///
    /// A crash mid-write can leave a truncated file behind.
    #[default]
    Overwrite,
    /// Write to a temp file in the target directory, fsync it and rename it
    /// over the target. Optionally copies the previous file to `<name>.bak`.
    Atomic { keep_backup: bool },
}

/// How `save` captures the three collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotConsistency {
    /// Each collection is copied under its own read lock, one after the
    /// other. Every collection is captured whole, but a save racing with
    /// writers on other collections may mix before/after states across
    /// collections.
    #[default]
    PerCollection,
    /// All three read locks are held together while copying, giving a
    /// single point-in-time document. Writers on every collection wait for
    /// the copy to finish.
    Global,
}

/// Runtime options for a [`MemoryState`](crate::MemoryState).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateOptions {
    pub path: PathBuf,
    pub write_mode: WriteMode,
    pub consistency: SnapshotConsistency,
}

impl StateOptions {
    /// Options with the default write mode and consistency for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_mode: WriteMode::default(),
            consistency: SnapshotConsistency::default(),
        }
    }

    /// Set the write mode.
    ///
    /// Default: [`WriteMode::Overwrite`]
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Shorthand for `write_mode(WriteMode::Atomic { keep_backup })`.
    pub fn atomic(self, keep_backup: bool) -> Self {
        self.write_mode(WriteMode::Atomic { keep_backup })
    }

    /// Set the snapshot consistency used by `save`.
    ///
    /// Default: [`SnapshotConsistency::PerCollection`]
    pub fn consistency(mut self, consistency: SnapshotConsistency) -> Self {
        self.consistency = consistency;
        self
    }
}
