//! Error types for the unik state store.
//!
//! Update functions passed to the `modify_*` accessors keep their own error
//! type; only failures raised by the store itself (locking, persistence) are
//! represented here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    // File system errors; `message` already names the path when there is one
    #[error("{message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("Failed to serialize state: {message}")]
    Serialize {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to parse state file {path:?}: {message}")]
    Deserialize {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Locking errors
    #[error("Lock poisoned for {collection} collection")]
    LockPoisoned { collection: &'static str },

    // Caller input
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },
}

/// Result type alias for state store operations.
pub type Result<T> = std::result::Result<T, StateError>;

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialize {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StateError {
    /// Create an IO error with path context.
    pub fn io_with_path(
        err: std::io::Error,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        StateError::Io {
            message: message.into(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a parse error for the state file at `path`.
    pub fn deserialize(err: serde_json::Error, path: impl Into<PathBuf>) -> Self {
        StateError::Deserialize {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// True when the state file simply does not exist yet.
    ///
    /// Lets callers treat a fresh install differently from a corrupt or
    /// unreadable file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StateError::Io {
                source: Some(e),
                ..
            } if e.kind() == std::io::ErrorKind::NotFound
        )
    }
}
