//! The persisted state document.

use crate::types::{Image, Instance, Volume};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-store document written by `save` and read by `load`.
///
/// Exactly three top-level fields, `Images`, `Instances` and `Volumes`,
/// each mapping entity id to the full entity. All three are required when
/// reading; unknown extra fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateDocument {
    pub images: BTreeMap<String, Image>,
    pub instances: BTreeMap<String, Instance>,
    pub volumes: BTreeMap<String, Volume>,
}
