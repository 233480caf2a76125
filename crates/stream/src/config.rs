use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Errors from validating streaming configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("budget_bytes must be positive")]
    ZeroBudget,
    #[error("transfer_cap_bytes must be positive")]
    ZeroTransferCap,
    #[error("{field} must be at least one frame")]
    EmptyWindow { field: &'static str },
    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidWeight { field: &'static str, value: f32 },
    #[error("max_backoff_frames ({max}) is below retry_backoff_frames ({base})")]
    BackoffRange { base: u64, max: u64 },
}

/// Priority and retry tuning for one resource class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Resources used within this many frames count as recently used and are
    /// wanted resident.
    pub recent_frames: u64,
    /// Frames over which an older resource's priority decays to zero.
    pub decay_frames: u64,
    /// Score floor for recently used resources; keeps them above any
    /// decaying one.
    pub recent_priority_base: f32,
    /// Multiplier applied to the frame's highest reported LOD coverage.
    pub coverage_weight: f32,
    /// Frames to wait after the first transfer failure.
    pub retry_backoff_frames: u64,
    /// Ceiling for the doubling backoff.
    pub max_backoff_frames: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            recent_frames: 5,
            decay_frames: 60,
            recent_priority_base: 10_000.0,
            coverage_weight: 10.0,
            retry_backoff_frames: 4,
            max_backoff_frames: 240,
        }
    }
}

impl StreamerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decay_frames == 0 {
            return Err(ConfigError::EmptyWindow { field: "decay_frames" });
        }
        if self.retry_backoff_frames == 0 {
            return Err(ConfigError::EmptyWindow {
                field: "retry_backoff_frames",
            });
        }
        if self.max_backoff_frames < self.retry_backoff_frames {
            return Err(ConfigError::BackoffRange {
                base: self.retry_backoff_frames,
                max: self.max_backoff_frames,
            });
        }
        for (field, value) in [
            ("recent_priority_base", self.recent_priority_base),
            ("coverage_weight", self.coverage_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { field, value });
            }
        }
        Ok(())
    }
}

/// Frame-level streaming limits shared by the mesh and texture streamers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Global GPU byte budget across all resource classes.
    pub budget_bytes: u64,
    /// Bytes that may be loaded or evicted within a single frame.
    pub transfer_cap_bytes: u64,
    /// Frames after a memory warning during which no loads are issued.
    pub memory_warning_suspend_frames: u64,
    /// Frames after a memory warning during which the budget is halved.
    pub memory_warning_halve_frames: u64,
    /// Run uploads on a worker thread instead of inline on the frame thread.
    pub background_transfers: bool,
    pub mesh: StreamerConfig,
    pub texture: StreamerConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 256 * MIB,
            transfer_cap_bytes: 8 * MIB,
            memory_warning_suspend_frames: 5,
            memory_warning_halve_frames: 30,
            background_transfers: false,
            mesh: StreamerConfig::default(),
            texture: StreamerConfig::default(),
        }
    }
}

impl StreamingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget_bytes == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.transfer_cap_bytes == 0 {
            return Err(ConfigError::ZeroTransferCap);
        }
        self.mesh.validate()?;
        self.texture.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StreamingConfig::default().validate().is_ok());
        assert_eq!(StreamerConfig::default().recent_frames, 5);
    }

    #[test]
    fn rejects_zero_limits() {
        let config = StreamingConfig {
            budget_bytes: 0,
            ..StreamingConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBudget)));

        let config = StreamingConfig {
            transfer_cap_bytes: 0,
            ..StreamingConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTransferCap)));
    }

    #[test]
    fn rejects_bad_streamer_tuning() {
        let mut config = StreamingConfig::default();
        config.texture.decay_frames = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyWindow { field: "decay_frames" })
        ));

        let mut config = StreamingConfig::default();
        config.mesh.coverage_weight = f32::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWeight { .. })));

        let mut config = StreamingConfig::default();
        config.mesh.max_backoff_frames = 1;
        assert!(matches!(config.validate(), Err(ConfigError::BackoffRange { .. })));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: StreamingConfig =
            serde_json::from_str(r#"{ "budget_bytes": 1024, "mesh": { "recent_frames": 2 } }"#)
                .unwrap();
        assert_eq!(config.budget_bytes, 1024);
        assert_eq!(config.mesh.recent_frames, 2);
        assert_eq!(config.mesh.decay_frames, 60);
        assert_eq!(config.transfer_cap_bytes, 8 * MIB);
    }
}
