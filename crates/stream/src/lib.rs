//! Streaming: budgeted GPU residency for mesh and texture resources.
//!
//! # Invariants
//! - Decisions are made on the frame thread; transfers only copy bytes.
//! - `Unloaded` resources have no GPU footprint; `Ready` ones are safe to draw.
//! - Usage stays within the global budget, except for resident constants and
//!   evictions the per-frame transfer cap pushes to a later frame.
//! - Upload completions are applied only if their generation is current.

mod budget;
mod config;
mod context;
mod resource;
mod streamer;
mod transfer;

pub use budget::{PassTimer, StreamBudget};
pub use config::{ConfigError, StreamerConfig, StreamingConfig};
pub use context::{FrameReport, StreamingContext};
pub use resource::{
    FailureRecord, LoadState, ResourceClass, ResourceId, ResourceKind, StreamableResource,
};
pub use streamer::{ResourceStreamer, StreamReport};
pub use transfer::{Completion, SimulatedDevice, TransferBackend, TransferError, TransferQueue};

pub fn crate_info() -> &'static str {
    "strata-stream v0.1.0"
}
