//! unik-state - concurrent, persistable registry for the unik control plane.
//!
//! Holds the three entity collections the orchestrator works with (images,
//! instances and volumes), each behind its own reader/writer lock, and saves
//! or restores all of them as a single JSON document.
//!
//! # Example
//!
//! ```rust,no_run
//! use unik_state::{Image, Infrastructure, MemoryState, State, StateError};
//!
//! fn main() -> unik_state::Result<()> {
//!     let state = MemoryState::new("/var/lib/unik/state.json");
//!
//!     state.modify_images(|images| {
//!         images.entry("img1".to_string()).or_insert_with(|| Image {
//!             id: "img1".to_string(),
//!             name: "alpine".to_string(),
//!             device_mappings: Vec::new(),
//!             size_mb: 5,
//!             infrastructure: Infrastructure::Qemu,
//!             created: chrono::Utc::now(),
//!         });
//!         Ok::<_, StateError>(())
//!     })?;
//!
//!     println!("{} images", state.images()?.len());
//!     state.save()
//! }
//! ```

pub mod config;
pub mod error;
pub mod persist;
pub mod state;
pub mod types;

pub use config::{SnapshotConsistency, StateConfig, StateOptions, WriteMode};
pub use error::{Result, StateError};
pub use persist::StateDocument;
pub use state::{Collection, EntityMap, MemoryState, State, StateCounts};
pub use types::{DeviceMapping, Entity, Image, Infrastructure, Instance, InstanceState, Volume};
