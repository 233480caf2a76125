use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_spatial::OctreeConfig;
use strata_stream::StreamingConfig;

/// Top-level configuration file. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub octree: OctreeConfig,
    pub streaming: StreamingConfig,
}

impl EngineConfig {
    /// Read and validate a JSON config, or use defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                tracing::info!(path = %path.display(), "loading engine config");
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.octree.validate().context("invalid octree config")?;
        self.streaming.validate().context("invalid streaming config")?;
        Ok(())
    }
}
