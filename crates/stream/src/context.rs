use std::sync::Arc;
use std::time::Instant;

use crate::budget::{PassTimer, StreamBudget};
use crate::config::{ConfigError, StreamingConfig};
use crate::resource::ResourceClass;
use crate::streamer::{ResourceStreamer, StreamReport};
use crate::transfer::{TransferBackend, TransferQueue};

/// Outcome of one context-level streaming pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub global_total: u64,
    pub allow_loads: bool,
    pub mesh: StreamReport,
    pub texture: StreamReport,
    /// The pass moved no bytes while loads were allowed.
    pub fully_streamed: bool,
}

impl FrameReport {
    pub fn bytes_transferred(&self) -> u64 {
        self.mesh.bytes_transferred() + self.texture.bytes_transferred()
    }
}

/// Frame driver for the mesh and texture streamers.
///
/// Both streamers draw from one global budget and one per-frame transfer cap,
/// meshes first. The context also owns the frame counter, the streaming
/// toggle and the memory-warning throttle.
pub struct StreamingContext {
    config: StreamingConfig,
    mesh: ResourceStreamer,
    texture: ResourceStreamer,
    current_frame: u64,
    last_fully_streamed_frame: Option<u64>,
    enabled: bool,
    memory_warning_frame: Option<u64>,
    timer: PassTimer,
}

impl StreamingContext {
    pub fn new(config: StreamingConfig, backend: Arc<dyn TransferBackend>) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = |name: &str| {
            if config.background_transfers {
                TransferQueue::background(Arc::clone(&backend), name)
            } else {
                TransferQueue::inline(Arc::clone(&backend))
            }
        };
        let mesh = ResourceStreamer::new(ResourceClass::Mesh, config.mesh.clone(), queue("mesh-transfer"));
        let texture = ResourceStreamer::new(
            ResourceClass::Texture,
            config.texture.clone(),
            queue("texture-transfer"),
        );
        tracing::info!(
            budget = config.budget_bytes,
            cap = config.transfer_cap_bytes,
            background = config.background_transfers,
            "streaming context created"
        );
        Ok(Self {
            config,
            mesh,
            texture,
            current_frame: 0,
            last_fully_streamed_frame: None,
            enabled: true,
            memory_warning_frame: None,
            timer: PassTimer::default(),
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn mesh(&self) -> &ResourceStreamer {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut ResourceStreamer {
        &mut self.mesh
    }

    pub fn texture(&self) -> &ResourceStreamer {
        &self.texture
    }

    pub fn texture_mut(&mut self) -> &mut ResourceStreamer {
        &mut self.texture
    }

    pub fn streamer(&self, class: ResourceClass) -> &ResourceStreamer {
        match class {
            ResourceClass::Mesh => &self.mesh,
            ResourceClass::Texture => &self.texture,
        }
    }

    pub fn streamer_mut(&mut self, class: ResourceClass) -> &mut ResourceStreamer {
        match class {
            ResourceClass::Mesh => &mut self.mesh,
            ResourceClass::Texture => &mut self.texture,
        }
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Most recent frame whose pass had nothing left to transfer.
    pub fn last_fully_streamed_frame(&self) -> Option<u64> {
        self.last_fully_streamed_frame
    }

    pub fn streaming_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_streaming_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!(enabled, "streaming toggled");
        }
        self.enabled = enabled;
    }

    /// Throttle streaming after the platform reports memory pressure.
    pub fn received_memory_warning(&mut self) {
        tracing::warn!(frame = self.current_frame, "memory warning received, throttling streaming");
        self.memory_warning_frame = Some(self.current_frame);
    }

    pub fn used_bytes(&self) -> u64 {
        self.mesh.used_bytes() + self.texture.used_bytes()
    }

    pub fn active_count(&self) -> usize {
        self.mesh.active_count() + self.texture.active_count()
    }

    pub fn memory_active(&self) -> u64 {
        self.mesh.memory_active() + self.texture.memory_active()
    }

    pub fn memory_transferred_this_frame(&self) -> u64 {
        self.mesh.memory_transferred_this_frame() + self.texture.memory_transferred_this_frame()
    }

    pub fn pass_timer(&self) -> &PassTimer {
        &self.timer
    }

    /// Apply finished transfers and age priorities for the current frame.
    pub fn start_frame(&mut self) {
        self.mesh.start_frame(self.current_frame);
        self.texture.start_frame(self.current_frame);
    }

    /// Budget for the current frame, with any memory-warning throttle applied.
    pub fn frame_budget(&self) -> StreamBudget {
        let since_warning = self
            .memory_warning_frame
            .map(|frame| self.current_frame.saturating_sub(frame));
        let allow_loads =
            since_warning.is_none_or(|since| since >= self.config.memory_warning_suspend_frames);
        let halved = since_warning.is_some_and(|since| since < self.config.memory_warning_halve_frames);
        let total = if halved {
            self.config.budget_bytes / 2
        } else {
            self.config.budget_bytes
        };

        StreamBudget {
            allow_loads,
            ..StreamBudget::new(total, self.config.transfer_cap_bytes).with_used(self.used_bytes())
        }
    }

    /// Run both streamers against the frame budget. Returns `None` while
    /// streaming is disabled.
    pub fn do_streaming(&mut self) -> Option<FrameReport> {
        if !self.enabled {
            return None;
        }
        let _span = tracing::info_span!("streaming_frame", frame = self.current_frame).entered();
        let started = Instant::now();

        let mut budget = self.frame_budget();
        let mesh = self.mesh.do_streaming(&mut budget);
        let texture = self.texture.do_streaming(&mut budget);

        let fully_streamed = budget.allow_loads && budget.frame_cap > 0 && budget.is_untouched();
        if fully_streamed {
            self.last_fully_streamed_frame = Some(self.current_frame);
        }
        self.timer.record(started.elapsed());

        Some(FrameReport {
            frame: self.current_frame,
            global_total: budget.global_total,
            allow_loads: budget.allow_loads,
            mesh,
            texture,
            fully_streamed,
        })
    }

    pub fn end_frame(&mut self) {
        self.current_frame += 1;
    }

    /// Block until both transfer queues are idle.
    pub fn wait_for_transfers(&self) {
        self.mesh.wait_for_transfers();
        self.texture.wait_for_transfers();
    }
}
