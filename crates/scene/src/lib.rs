//! Scene: entity state that feeds the spatial index.
//!
//! # Invariants
//! - All mutations go through explicit operations and are logged.
//! - The index is brought up to date only by `Scene::sync_index`.

pub mod scene;

pub use scene::{NodeExtent, Scene, SceneEvent, SceneNode, SyncStats};

pub fn crate_info() -> &'static str {
    "strata-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
