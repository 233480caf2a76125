use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::StreamerConfig;

/// Which streamer owns a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceClass {
    Mesh,
    Texture,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceClass::Mesh => f.write_str("mesh"),
            ResourceClass::Texture => f.write_str("texture"),
        }
    }
}

/// Handle to a registered resource. Indices are never reused within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub class: ResourceClass,
    pub index: u32,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.index)
    }
}

/// Eviction policy of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Loaded when wanted and affordable, evicted under pressure.
    Streaming,
    /// Engine-critical: always planned resident and never evicted.
    Constant,
    /// Reclaimed as soon as it stops being wanted.
    Temporary,
}

/// GPU residency of a resource.
///
/// `Unloaded` has no GPU footprint. `Loaded` has its bytes charged and an
/// upload in flight. `Ready` is bound and safe to render from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Unloaded,
    Loaded,
    Ready,
}

/// Bookkeeping for a resource whose last upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    /// Consecutive failed uploads.
    pub attempts: u32,
    /// First frame at which a retry is allowed under the same budget.
    pub retry_frame: u64,
    /// Global budget in force when the failure happened.
    pub global_total: u64,
}

/// One GPU-backed buffer tracked by a [`ResourceStreamer`](crate::ResourceStreamer).
#[derive(Debug, Clone)]
pub struct StreamableResource {
    pub(crate) id: ResourceId,
    pub(crate) label: String,
    pub(crate) byte_size: u64,
    pub(crate) kind: ResourceKind,
    pub(crate) state: LoadState,
    pub(crate) last_frame_used: Option<u64>,
    /// Highest coverage reported during `last_frame_used`.
    pub(crate) max_coverage: f32,
    pub(crate) priority: f32,
    /// Bumped on every load and eviction; completions carrying an older value
    /// are stale.
    pub(crate) generation: u64,
    /// Global budget this resource was found too large for.
    pub(crate) oversized_for: Option<u64>,
    pub(crate) failure: Option<FailureRecord>,
}

impl StreamableResource {
    pub(crate) fn new(id: ResourceId, label: String, byte_size: u64, kind: ResourceKind) -> Self {
        Self {
            id,
            label,
            byte_size,
            kind,
            state: LoadState::Unloaded,
            last_frame_used: None,
            max_coverage: 0.0,
            priority: 0.0,
            generation: 0,
            oversized_for: None,
            failure: None,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Charged against the budget: loaded or ready.
    pub fn is_resident(&self) -> bool {
        self.state != LoadState::Unloaded
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    pub fn last_frame_used(&self) -> Option<u64> {
        self.last_frame_used
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_oversized(&self) -> bool {
        self.oversized_for.is_some()
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// Record a use at `frame` with the given LOD coverage and rescore.
    ///
    /// The first report of a frame replaces the stored coverage; later
    /// reports in the same frame keep the maximum.
    pub(crate) fn touch(&mut self, frame: u64, coverage: f32, config: &StreamerConfig) {
        let coverage = if coverage.is_finite() { coverage.max(0.0) } else { 0.0 };
        if self.last_frame_used == Some(frame) {
            self.max_coverage = self.max_coverage.max(coverage);
        } else {
            self.max_coverage = coverage;
        }
        self.last_frame_used = Some(self.last_frame_used.map_or(frame, |used| used.max(frame)));
        self.rescore(frame, config);
    }

    pub(crate) fn rescore(&mut self, frame: u64, config: &StreamerConfig) {
        self.priority = self.score(frame, config);
    }

    /// Recently used resources score above every decaying one; within each
    /// band higher coverage and fresher use win.
    pub(crate) fn score(&self, frame: u64, config: &StreamerConfig) -> f32 {
        let Some(used) = self.last_frame_used else {
            return 0.0;
        };
        let age = frame.saturating_sub(used);
        if age <= config.recent_frames {
            config.recent_priority_base + self.max_coverage * config.coverage_weight
        } else {
            let decay = (age as f32 / config.decay_frames.max(1) as f32).clamp(0.0, 1.0);
            1.0 - decay
        }
    }

    /// Used recently enough that it should be resident.
    pub(crate) fn is_wanted(&self, frame: u64, config: &StreamerConfig) -> bool {
        self.last_frame_used
            .is_some_and(|used| frame.saturating_sub(used) <= config.recent_frames)
    }

    /// Not in failure backoff, or the budget moved since the failure.
    pub(crate) fn retry_allowed(&self, frame: u64, global_total: u64) -> bool {
        self.failure
            .is_none_or(|f| frame >= f.retry_frame || f.global_total != global_total)
    }
}
