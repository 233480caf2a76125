use std::collections::BTreeMap;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};
use strata_common::{Aabb, BoundingVolume, CastHit, CastShape, EntityId, LAYER_DEFAULT, Transform};
use strata_spatial::{Collidable, EntityLookup, SpatialEntity, SpatialIndex};

/// A record produced by every mutation to the scene.
///
/// The log is how the spatial index learns about changes: `Scene::sync_index`
/// drains it and replays each record against the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    Spawned { id: EntityId },
    Despawned { id: EntityId },
    Moved { id: EntityId, old: Transform, new: Transform },
}

/// Local-space footprint of a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeExtent {
    /// Oriented box around the node origin, before scale.
    Box { half_extents: Vec3 },
    /// Covers all space (sky, global lights).
    Unbounded,
    /// No visual footprint.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub transform: Transform,
    pub extent: NodeExtent,
    pub layer: u32,
    /// Whether casts may hit this node. Only boxes have collision geometry.
    pub collidable: bool,
}

impl SceneNode {
    pub fn boxed(transform: Transform, half_extents: Vec3) -> Self {
        Self {
            transform,
            extent: NodeExtent::Box { half_extents },
            layer: LAYER_DEFAULT,
            collidable: true,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            transform: Transform::default(),
            extent: NodeExtent::Unbounded,
            layer: LAYER_DEFAULT,
            collidable: false,
        }
    }

    pub fn hidden(transform: Transform) -> Self {
        Self {
            transform,
            extent: NodeExtent::Hidden,
            layer: LAYER_DEFAULT,
            collidable: false,
        }
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    /// World-space box enclosing the rotated, scaled footprint.
    pub fn world_aabb(&self) -> Option<Aabb> {
        let NodeExtent::Box { half_extents } = self.extent else {
            return None;
        };
        let half = half_extents * self.transform.scale.abs();
        let basis = Mat3::from_quat(self.transform.rotation);
        let world_half =
            basis.x_axis.abs() * half.x + basis.y_axis.abs() * half.y + basis.z_axis.abs() * half.z;
        Some(Aabb::from_center_half_extent(self.transform.position, world_half))
    }
}

impl SpatialEntity for SceneNode {
    fn bounds(&self) -> BoundingVolume {
        match self.extent {
            NodeExtent::Hidden => BoundingVolume::Zero,
            NodeExtent::Unbounded => BoundingVolume::Infinite,
            NodeExtent::Box { .. } => self
                .world_aabb()
                .map_or(BoundingVolume::Zero, BoundingVolume::Finite),
        }
    }

    fn layer_mask(&self) -> u32 {
        self.layer
    }

    fn collider(&self) -> Option<&dyn Collidable> {
        if self.collidable {
            Some(self)
        } else {
            None
        }
    }
}

impl Collidable for SceneNode {
    fn try_collide(&self, shape: &CastShape) -> Option<CastHit> {
        shape.cast_against(&self.world_aabb()?)
    }
}

/// What one `sync_index` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

/// Scene state. BTreeMap keeps iteration order stable across platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    nodes: BTreeMap<EntityId, SceneNode>,
    /// Seed for deterministic scene generation.
    seed: u64,
    #[serde(skip)]
    event_log: Vec<SceneEvent>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &BTreeMap<EntityId, SceneNode> {
        &self.nodes
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn spawn(&mut self, node: SceneNode) -> EntityId {
        let id = EntityId::new();
        self.spawn_with_id(id, node);
        id
    }

    /// Spawn with a caller-chosen id. An existing node with that id is replaced.
    pub fn spawn_with_id(&mut self, id: EntityId, node: SceneNode) {
        if self.nodes.insert(id, node).is_some() {
            self.event_log.push(SceneEvent::Despawned { id });
        }
        self.event_log.push(SceneEvent::Spawned { id });
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<SceneNode> {
        let node = self.nodes.remove(&id);
        if node.is_some() {
            self.event_log.push(SceneEvent::Despawned { id });
        }
        node
    }

    /// Move a node. Returns false if it does not exist.
    pub fn set_transform(&mut self, id: EntityId, new: Transform) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        let old = node.transform;
        node.transform = new;
        self.event_log.push(SceneEvent::Moved { id, old, new });
        true
    }

    /// Replay pending mutations against `index`, then clear the log.
    ///
    /// Records that no longer apply (a spawn whose node was despawned before
    /// the sync, a move of a node the index never saw) are skipped.
    pub fn sync_index(&mut self, index: &mut SpatialIndex<EntityId>) -> SyncStats {
        let mut stats = SyncStats::default();
        for event in std::mem::take(&mut self.event_log) {
            match event {
                SceneEvent::Spawned { id } => {
                    if let Some(node) = self.nodes.get(&id) {
                        if !index.contains(id) {
                            index.add(id, node);
                            stats.added += 1;
                        }
                    }
                }
                SceneEvent::Despawned { id } => {
                    if index.contains(id) {
                        index.remove(id);
                        stats.removed += 1;
                    }
                }
                SceneEvent::Moved { id, .. } => {
                    if let Some(node) = self.nodes.get(&id) {
                        if index.contains(id) {
                            index.update(id, node);
                            stats.updated += 1;
                        }
                    }
                }
            }
        }
        tracing::debug!(
            added = stats.added,
            removed = stats.removed,
            updated = stats.updated,
            "scene synced to spatial index"
        );
        stats
    }

    /// Next value of the scene's deterministic generator.
    pub fn next_random(&mut self) -> u64 {
        self.seed = splitmix64(self.seed);
        self.seed
    }

    /// Scatter `count` unit-ish boxes inside a cube of side `extent`.
    ///
    /// Ids and placement derive from the seed alone, so equal seeds produce
    /// equal scenes.
    pub fn populate(&mut self, count: usize, extent: f32) -> Vec<EntityId> {
        (0..count)
            .map(|_| {
                let id = EntityId::from_u128(
                    (u128::from(self.next_random()) << 64) | u128::from(self.next_random()),
                );
                let position = Vec3::new(
                    self.unit_random(),
                    self.unit_random(),
                    self.unit_random(),
                ) * extent;
                let half = Vec3::splat(0.25 + self.unit_random());
                self.spawn_with_id(id, SceneNode::boxed(Transform::from_position(position), half));
                id
            })
            .collect()
    }

    fn unit_random(&mut self) -> f32 {
        (self.next_random() >> 40) as f32 / (1u64 << 24) as f32
    }
}

impl EntityLookup<EntityId> for Scene {
    fn entity(&self, key: EntityId) -> Option<&dyn SpatialEntity> {
        self.nodes.entity(key)
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
