use serde::{Deserialize, Serialize};

/// Errors from validating an [`OctreeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("min_node_extent must be finite and positive, got {0}")]
    MinNodeExtent(f32),
}

/// Octree tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Octants whose longest side would fall below this are never created.
    /// Also the minimum thickness of a freshly created root.
    pub min_node_extent: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            min_node_extent: 0.01,
        }
    }
}

impl OctreeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_node_extent.is_finite() || self.min_node_extent <= 0.0 {
            return Err(ConfigError::MinNodeExtent(self.min_node_extent));
        }
        Ok(())
    }
}
