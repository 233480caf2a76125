//! Developer tooling: read-only inspectors for the spatial index and the
//! streaming context.
//!
//! # Invariants
//! - Inspectors never mutate what they look at.

pub mod inspector;

pub use inspector::{
    ContextSummary, IndexInspector, IndexSummary, LevelInfo, ResourceInfo, StreamInspector,
    StreamerSummary, format_bytes,
};

pub fn crate_info() -> &'static str {
    "strata-tools v0.1.0"
}
