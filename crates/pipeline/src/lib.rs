//! Module-instance layer of the audio processing core.
//!
//! Couples four pieces around the module contract:
//!
//! - the lifecycle state machine ([`state`]) with its trigger table,
//! - the fragmented configuration-blob transport ([`blob`]),
//! - the processing-entry adapter ([`adapter`]) bridging the
//!   source/sink and staged-stream contract styles,
//! - the per-module resource registry ([`resources`]) that guarantees
//!   every allocation is returned when the module is freed.
//!
//! Topology edges between instances are tracked in [`bind`]; graphs
//! must be acyclic, enforced at bind time.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod adapter;
pub mod bind;
pub mod blob;
pub mod instance;
pub mod module;
pub mod resources;
pub mod state;

pub use adapter::{InputStreamBuffer, OutputStreamBuffer, ProcessStats};
pub use bind::Topology;
pub use blob::{BlobHandler, FragmentPosition};
pub use instance::{ModuleId, ModuleInstance};
pub use module::{BaseConfig, Domain, ModuleConfig, ModuleOps, ProcessingMode, MAX_PINS};
pub use resources::{ResourceId, ResourceRegistry, CONTAINER_CHUNK};
pub use state::{Command, InstanceState};
