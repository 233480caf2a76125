use std::fmt;

use strata_common::Aabb;
use strata_spatial::{NodeId, SpatialIndex};
use strata_stream::{LoadState, ResourceClass, ResourceId, ResourceStreamer, StreamingContext};

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Spatial index inspector.
pub struct IndexInspector;

impl IndexInspector {
    pub fn summary<K: Copy + Ord + fmt::Debug>(index: &SpatialIndex<K>) -> IndexSummary {
        let stats = index.stats();
        IndexSummary {
            entities: index.len(),
            node_count: stats.node_count,
            max_depth: stats.max_depth,
            tree_entities: stats.tree_entities,
            outer_entities: stats.outer_entities,
            hidden_entities: stats.hidden_entities,
            root_bounds: index.root_bounds(),
        }
    }

    /// Node and member counts per tree depth, root first.
    pub fn levels<K: Copy + Ord + fmt::Debug>(index: &SpatialIndex<K>) -> Vec<LevelInfo> {
        let mut levels: Vec<LevelInfo> = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = index.root_id().map(|id| (id, 0)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = index.node(id) else { continue };
            while levels.len() <= depth {
                levels.push(LevelInfo {
                    depth: levels.len(),
                    nodes: 0,
                    members: 0,
                });
            }
            levels[depth].nodes += 1;
            levels[depth].members += node.members().len();
            stack.extend(node.children().map(|(_, child)| (child, depth + 1)));
        }
        levels
    }
}

#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub entities: usize,
    pub node_count: usize,
    pub max_depth: usize,
    pub tree_entities: usize,
    pub outer_entities: usize,
    pub hidden_entities: usize,
    pub root_bounds: Option<Aabb>,
}

impl fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index: entities={} (tree={} outer={} hidden={}) nodes={} depth={}",
            self.entities,
            self.tree_entities,
            self.outer_entities,
            self.hidden_entities,
            self.node_count,
            self.max_depth
        )?;
        match &self.root_bounds {
            Some(b) => write!(
                f,
                " root=({:.2}, {:.2}, {:.2})..({:.2}, {:.2}, {:.2})",
                b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
            ),
            None => write!(f, " root=none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelInfo {
    pub depth: usize,
    pub nodes: usize,
    pub members: usize,
}

impl fmt::Display for LevelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "depth {:>2}: {:>5} nodes {:>6} members", self.depth, self.nodes, self.members)
    }
}

/// Streaming inspector.
pub struct StreamInspector;

impl StreamInspector {
    pub fn streamer(streamer: &ResourceStreamer) -> StreamerSummary {
        let mut summary = StreamerSummary {
            class: streamer.class(),
            registered: streamer.len(),
            resident: 0,
            ready: 0,
            oversized: 0,
            failing: 0,
            used_bytes: streamer.used_bytes(),
            active_bytes: streamer.memory_active(),
        };
        for resource in streamer.resources() {
            summary.resident += usize::from(resource.is_resident());
            summary.ready += usize::from(resource.is_ready());
            summary.oversized += usize::from(resource.is_oversized());
            summary.failing += usize::from(resource.failure().is_some());
        }
        summary
    }

    pub fn context(ctx: &StreamingContext) -> ContextSummary {
        ContextSummary {
            frame: ctx.current_frame(),
            enabled: ctx.streaming_enabled(),
            budget_bytes: ctx.config().budget_bytes,
            used_bytes: ctx.used_bytes(),
            transferred_bytes: ctx.memory_transferred_this_frame(),
            last_fully_streamed_frame: ctx.last_fully_streamed_frame(),
            mesh: Self::streamer(ctx.mesh()),
            texture: Self::streamer(ctx.texture()),
        }
    }

    /// The `count` highest-priority resources, highest first.
    pub fn top_resources(streamer: &ResourceStreamer, count: usize) -> Vec<ResourceInfo> {
        let mut infos: Vec<ResourceInfo> = streamer
            .resources()
            .map(|r| ResourceInfo {
                id: r.id(),
                label: r.label().to_string(),
                byte_size: r.byte_size(),
                state: r.state(),
                priority: r.priority(),
            })
            .collect();
        infos.sort_by(|a, b| b.priority.total_cmp(&a.priority).then(a.id.cmp(&b.id)));
        infos.truncate(count);
        infos
    }
}

#[derive(Debug, Clone)]
pub struct StreamerSummary {
    pub class: ResourceClass,
    pub registered: usize,
    pub resident: usize,
    pub ready: usize,
    pub oversized: usize,
    pub failing: usize,
    pub used_bytes: u64,
    pub active_bytes: u64,
}

impl fmt::Display for StreamerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} resident ({} ready) used={} active={}",
            self.class,
            self.resident,
            self.registered,
            self.ready,
            format_bytes(self.used_bytes),
            format_bytes(self.active_bytes)
        )?;
        if self.oversized > 0 || self.failing > 0 {
            write!(f, " oversized={} failing={}", self.oversized, self.failing)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ContextSummary {
    pub frame: u64,
    pub enabled: bool,
    pub budget_bytes: u64,
    pub used_bytes: u64,
    pub transferred_bytes: u64,
    pub last_fully_streamed_frame: Option<u64>,
    pub mesh: StreamerSummary,
    pub texture: StreamerSummary,
}

impl fmt::Display for ContextSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Streaming: frame={} enabled={} used={} / {} transferred={}",
            self.frame,
            self.enabled,
            format_bytes(self.used_bytes),
            format_bytes(self.budget_bytes),
            format_bytes(self.transferred_bytes)
        )?;
        match self.last_fully_streamed_frame {
            Some(frame) => writeln!(f, "  fully streamed at frame {frame}")?,
            None => writeln!(f, "  not yet fully streamed")?,
        }
        writeln!(f, "  {}", self.mesh)?;
        write!(f, "  {}", self.texture)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub label: String,
    pub byte_size: u64,
    pub state: LoadState,
    pub priority: f32,
}

impl fmt::Display for ResourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:<16} {:>10} {:<8} priority={:.2}",
            self.id.to_string(),
            self.label,
            format_bytes(self.byte_size),
            format!("{:?}", self.state),
            self.priority
        )
    }
}
