//! State persistence.
//!
//! This module provides:
//! - The on-disk document shape ([`StateDocument`])
//! - Whole-document reads and overwrite/atomic writes

mod document;
mod file;

pub use document::StateDocument;
pub use file::{read_document, write_document};
