use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use glam::Vec3;
use strata_common::{
    Aabb, BoundingVolume, CastShape, LineSegment, Ray, SphereSweep, contract_violation,
};

use crate::config::{ConfigError, OctreeConfig};
use crate::entity::{EntityLookup, HitInfo, SpatialEntity};
use crate::node::{NodeId, SpatialNode};

/// Slot the old root takes when the tree grows toward decreasing coordinates.
const GROW_NEGATIVE_SLOT: usize = 7;
/// Slot the old root takes when the tree grows toward increasing coordinates.
const GROW_POSITIVE_SLOT: usize = 0;

/// Where a registered entity currently lives.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Placement {
    /// `Zero` bounds: registered, but invisible to every query.
    Hidden,
    /// `Infinite` bounds: tracked outside the tree.
    Outer,
    /// In the tree, with the bounds it was inserted with.
    Node { node: NodeId, bounds: Aabb },
}

/// Structural counters for inspection and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OctreeStats {
    pub node_count: usize,
    /// Depth of the deepest node; the root is depth 0.
    pub max_depth: usize,
    pub tree_entities: usize,
    pub outer_entities: usize,
    pub hidden_entities: usize,
}

/// Dynamic octree over non-owned entities keyed by `K`.
///
/// Nodes live in an arena owned by the index; the root grows by wrapping
/// itself in a parent twice its size and shrinks by dropping empty outer
/// shells. Every mutation leaves the tree query-consistent.
///
/// Contract violations (adding a registered key, removing or updating an
/// unknown key) panic in debug builds. Release builds log a warning and
/// leave the index untouched.
#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    config: OctreeConfig,
    nodes: Vec<Option<SpatialNode<K>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    outer: BTreeSet<K>,
    placements: BTreeMap<K, Placement>,
}

impl<K: Copy + Ord + Debug> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Ord + Debug> SpatialIndex<K> {
    pub fn new() -> Self {
        Self::empty(OctreeConfig::default())
    }

    pub fn with_config(config: OctreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::empty(config))
    }

    fn empty(config: OctreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            outer: BTreeSet::new(),
            placements: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Number of registered entities, including hidden and unbounded ones.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn contains(&self, key: K) -> bool {
        self.placements.contains_key(&key)
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Read-only root for frustum traversal.
    pub fn root(&self) -> Option<&SpatialNode<K>> {
        self.root.map(|id| self.slot(id))
    }

    pub fn root_bounds(&self) -> Option<Aabb> {
        self.root().map(|node| node.bounds)
    }

    pub fn node(&self, id: NodeId) -> Option<&SpatialNode<K>> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Entities with `Infinite` bounds.
    pub fn outer_entities(&self) -> &BTreeSet<K> {
        &self.outer
    }

    /// The tree node currently holding `key`, if it is in the tree.
    pub fn node_of(&self, key: K) -> Option<NodeId> {
        match self.placements.get(&key) {
            Some(Placement::Node { node, .. }) => Some(*node),
            _ => None,
        }
    }

    /// Register `key` using the entity's current bounds.
    pub fn add<E: SpatialEntity + ?Sized>(&mut self, key: K, entity: &E) {
        if self.placements.contains_key(&key) {
            contract_violation(format_args!("entity {key:?} is already in the spatial index"));
            return;
        }

        let placement = match entity.bounds() {
            BoundingVolume::Zero => Placement::Hidden,
            BoundingVolume::Infinite => {
                self.outer.insert(key);
                Placement::Outer
            }
            BoundingVolume::Finite(bounds) => Placement::Node {
                node: self.insert_finite(key, &bounds),
                bounds,
            },
        };
        tracing::trace!(?key, ?placement, "spatial add");
        self.placements.insert(key, placement);
    }

    /// Unregister `key`, then shrink.
    pub fn remove(&mut self, key: K) {
        let Some(placement) = self.placements.remove(&key) else {
            contract_violation(format_args!("entity {key:?} is not in the spatial index"));
            return;
        };

        match placement {
            Placement::Hidden => {}
            Placement::Outer => {
                self.outer.remove(&key);
            }
            Placement::Node { node, .. } => {
                self.slot_mut(node).members.remove(&key);
                self.prune_upwards(node);
            }
        }
        tracing::trace!(?key, "spatial remove");
        self.shrink();
    }

    /// Re-file `key` after its bounds changed: remove, add, shrink.
    pub fn update<E: SpatialEntity + ?Sized>(&mut self, key: K, entity: &E) {
        if !self.placements.contains_key(&key) {
            contract_violation(format_args!("cannot update {key:?}: not in the spatial index"));
            return;
        }
        self.remove(key);
        self.add(key, entity);
        self.shrink();
    }

    /// Collapse the root while it holds no members and at most one child.
    pub fn shrink(&mut self) {
        while let Some(root) = self.root {
            let node = self.slot(root);
            if !node.members.is_empty() {
                return;
            }
            let survivor = {
                let mut occupied = node.children();
                match (occupied.next(), occupied.next()) {
                    (None, _) => None,
                    (Some((_, only)), None) => Some(only),
                    _ => return,
                }
            };

            self.free_node(root);
            if let Some(child) = survivor {
                let child_node = self.slot_mut(child);
                child_node.parent = None;
                child_node.octant = None;
            }
            tracing::trace!(?survivor, "octree root shrunk");
            self.root = survivor;
        }
    }

    /// Drop every entity and node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.outer.clear();
        self.placements.clear();
    }

    pub fn ray_cast<L: EntityLookup<K> + ?Sized>(
        &self,
        lookup: &L,
        origin: Vec3,
        direction: Vec3,
        layer_mask: u32,
    ) -> Option<HitInfo<K>> {
        self.cast(lookup, &Ray::new(origin, direction).into(), layer_mask)
    }

    pub fn line_cast<L: EntityLookup<K> + ?Sized>(
        &self,
        lookup: &L,
        start: Vec3,
        end: Vec3,
        layer_mask: u32,
    ) -> Option<HitInfo<K>> {
        self.cast(lookup, &LineSegment::new(start, end).into(), layer_mask)
    }

    pub fn sphere_cast<L: EntityLookup<K> + ?Sized>(
        &self,
        lookup: &L,
        start: Vec3,
        end: Vec3,
        radius: f32,
        layer_mask: u32,
    ) -> Option<HitInfo<K>> {
        self.cast(lookup, &SphereSweep::new(start, end, radius).into(), layer_mask)
    }

    /// Nearest hit of `shape` against every collidable entity on `layer_mask`.
    ///
    /// Unbounded entities are tested first, then the tree depth-first with
    /// nodes pruned when the shape misses them or enters them beyond the best
    /// hit so far. The smallest distance wins; ties go to the smaller key.
    /// Colliders are assumed to stay within the bounds they reported.
    pub fn cast<L: EntityLookup<K> + ?Sized>(
        &self,
        lookup: &L,
        shape: &CastShape,
        layer_mask: u32,
    ) -> Option<HitInfo<K>> {
        if shape.is_degenerate() {
            return None;
        }

        let mut best = None;
        for &key in &self.outer {
            test_entity(lookup, key, shape, layer_mask, &mut best);
        }

        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = self.slot(id);
            let Some(enter) = shape.enter_distance(&node.bounds) else {
                continue;
            };
            if best.as_ref().is_some_and(|hit: &HitInfo<K>| enter > hit.distance) {
                continue;
            }
            for &key in &node.members {
                test_entity(lookup, key, shape, layer_mask, &mut best);
            }
            stack.extend(node.children.iter().rev().flatten().copied());
        }
        best
    }

    /// Unbounded entities plus every tree entity whose bounds touch `region`.
    pub fn entities_intersecting(&self, region: &Aabb) -> Vec<K> {
        let mut found: Vec<K> = self.outer.iter().copied().collect();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = self.slot(id);
            if !node.bounds.intersects(region) {
                continue;
            }
            found.extend(node.members.iter().copied().filter(|key| {
                matches!(
                    self.placements.get(key),
                    Some(Placement::Node { bounds, .. }) if bounds.intersects(region)
                )
            }));
            stack.extend(node.children.iter().flatten().copied());
        }
        found
    }

    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            node_count: self.nodes.len() - self.free.len(),
            outer_entities: self.outer.len(),
            ..OctreeStats::default()
        };
        for placement in self.placements.values() {
            match placement {
                Placement::Hidden => stats.hidden_entities += 1,
                Placement::Outer => {}
                Placement::Node { .. } => stats.tree_entities += 1,
            }
        }

        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            stats.max_depth = stats.max_depth.max(depth);
            stack.extend(self.slot(id).children().map(|(_, child)| (child, depth + 1)));
        }
        stats
    }

    fn insert_finite(&mut self, key: K, bounds: &Aabb) -> NodeId {
        let root = match self.root {
            Some(root) => self.grow_to_contain(root, bounds),
            None => {
                let root_bounds = bounds.with_min_extent(self.config.min_node_extent);
                let id = self.alloc(SpatialNode::new(root_bounds, None, None));
                tracing::trace!(?root_bounds, "octree root created");
                self.root = Some(id);
                id
            }
        };
        let target = self.descend(root, bounds);
        self.slot_mut(target).members.insert(key);
        target
    }

    /// Wrap the root in ever larger parents until it contains `bounds`.
    fn grow_to_contain(&mut self, mut root: NodeId, bounds: &Aabb) -> NodeId {
        loop {
            let current = self.slot(root).bounds;
            let size = self.growth_step(&current);
            let (grown, slot) = if bounds.min.cmplt(current.min).any() {
                (Aabb::new(current.min - size, current.max), GROW_NEGATIVE_SLOT)
            } else if bounds.max.cmpgt(current.max).any() {
                (Aabb::new(current.min, current.max + size), GROW_POSITIVE_SLOT)
            } else {
                return root;
            };

            let mut parent = SpatialNode::new(grown, None, None);
            parent.children[slot] = Some(root);
            let parent_id = self.alloc(parent);
            let old = self.slot_mut(root);
            old.parent = Some(parent_id);
            old.octant = Some(slot);

            tracing::trace!(?grown, slot, "octree root grown");
            self.root = Some(parent_id);
            root = parent_id;
        }
    }

    /// Per-axis growth: the root's size, but never less than
    /// `min_node_extent` or a few ulps of the largest coordinate, so a flat
    /// root far from the origin still widens on every step.
    fn growth_step(&self, current: &Aabb) -> Vec3 {
        let magnitude = current.min.abs().max(current.max.abs());
        current
            .size()
            .max(magnitude * (4.0 * f32::EPSILON))
            .max(Vec3::splat(self.config.min_node_extent))
    }

    /// Walk down from `start`, creating octants on demand, to the deepest
    /// node with a single octant that still contains `bounds`.
    fn descend(&mut self, start: NodeId, bounds: &Aabb) -> NodeId {
        let mut current = start;
        while let Some(octant) = self.fitting_octant(current, bounds) {
            current = match self.slot(current).children[octant] {
                Some(child) => child,
                None => {
                    let child_bounds = self.slot(current).bounds.octant(octant);
                    let child = self.alloc(SpatialNode::new(child_bounds, Some(current), Some(octant)));
                    self.slot_mut(current).children[octant] = Some(child);
                    child
                }
            };
        }
        current
    }

    fn fitting_octant(&self, id: NodeId, bounds: &Aabb) -> Option<usize> {
        let node = self.slot(id);
        (0..8).find(|&octant| {
            let candidate = match node.children[octant] {
                Some(child) => self.slot(child).bounds,
                None => node.bounds.octant(octant),
            };
            candidate.max_extent() >= self.config.min_node_extent && candidate.contains(bounds)
        })
    }

    /// Free `start` and its ancestors for as long as they are empty.
    fn prune_upwards(&mut self, start: NodeId) {
        let mut current = start;
        loop {
            let node = self.slot(current);
            if !node.is_empty() {
                return;
            }
            let (parent, octant) = (node.parent, node.octant);
            self.free_node(current);
            match (parent, octant) {
                (Some(parent), Some(octant)) => {
                    self.slot_mut(parent).children[octant] = None;
                    current = parent;
                }
                _ => {
                    self.root = None;
                    return;
                }
            }
        }
    }

    fn alloc(&mut self, node: SpatialNode<K>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(node);
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id.index()] = None;
        self.free.push(id);
    }

    fn slot(&self, id: NodeId) -> &SpatialNode<K> {
        self.nodes[id.index()]
            .as_ref()
            .expect("octree node ids always point at live slots")
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut SpatialNode<K> {
        self.nodes[id.index()]
            .as_mut()
            .expect("octree node ids always point at live slots")
    }
}

fn test_entity<K, L>(
    lookup: &L,
    key: K,
    shape: &CastShape,
    layer_mask: u32,
    best: &mut Option<HitInfo<K>>,
) where
    K: Copy + Ord + Debug,
    L: EntityLookup<K> + ?Sized,
{
    let Some(entity) = lookup.entity(key) else {
        tracing::warn!(?key, "indexed entity missing from lookup");
        return;
    };
    if entity.layer_mask() & layer_mask == 0 {
        return;
    }
    let Some(hit) = entity.collider().and_then(|c| c.try_collide(shape)) else {
        return;
    };
    let candidate = HitInfo {
        entity: key,
        distance: hit.distance,
        position: hit.position,
        normal: hit.normal,
    };
    if best.as_ref().is_none_or(|current| candidate.beats(current)) {
        *best = Some(candidate);
    }
}
