//! Shared types for the strata runtime core.
//!
//! # Invariants
//! - `Aabb` always satisfies `min <= max` componentwise.
//! - Bounding volumes are values: recomputed, never mutated across owners.

mod bounds;
mod cast;
mod contract;
mod types;

pub use bounds::{Aabb, BoundingVolume};
pub use cast::{CastHit, CastShape, LineSegment, Ray, SphereSweep};
pub use contract::contract_violation;
pub use types::{EntityId, LAYER_ALL, LAYER_DEFAULT, Transform};

pub fn crate_info() -> &'static str {
    "strata-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
