//! Spatial index: an adaptive octree over non-owned entities.
//!
//! # Invariants
//! - The root contains every finite entity in the tree.
//! - Every entity sits in the deepest node whose octant still contains it.
//! - No node outlives its last member or descendant.
//! - Entities with `Infinite` bounds live outside the tree; `Zero` bounds are
//!   registered but never queried.

mod config;
mod entity;
mod index;
mod node;

pub use config::{ConfigError, OctreeConfig};
pub use entity::{Collidable, EntityLookup, HitInfo, SpatialEntity};
pub use index::{OctreeStats, SpatialIndex};
pub use node::{NodeId, SpatialNode};

pub fn crate_info() -> &'static str {
    "strata-spatial v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("spatial"));
    }
}
