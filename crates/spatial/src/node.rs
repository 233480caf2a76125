use std::collections::BTreeSet;

use strata_common::Aabb;

/// Arena slot of a [`SpatialNode`] inside its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One octree cell.
///
/// Children are owned through the arena; `parent` is a non-owning back index.
/// Every member's bounds lie inside `bounds`, and a member sits in the deepest
/// node whose octant still contains it whole.
#[derive(Debug, Clone)]
pub struct SpatialNode<K> {
    pub(crate) bounds: Aabb,
    pub(crate) parent: Option<NodeId>,
    pub(crate) octant: Option<usize>,
    pub(crate) children: [Option<NodeId>; 8],
    pub(crate) members: BTreeSet<K>,
}

impl<K: Ord> SpatialNode<K> {
    pub(crate) fn new(bounds: Aabb, parent: Option<NodeId>, octant: Option<usize>) -> Self {
        Self {
            bounds,
            parent,
            octant,
            children: [None; 8],
            members: BTreeSet::new(),
        }
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Which octant of the parent this node occupies; `None` for the root.
    pub fn octant(&self) -> Option<usize> {
        self.octant
    }

    pub fn child(&self, octant: usize) -> Option<NodeId> {
        self.children.get(octant).copied().flatten()
    }

    /// Occupied child slots in octant order.
    pub fn children(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|id| (i, id)))
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().flatten().count()
    }

    /// Entities held at this level (not in descendants).
    pub fn members(&self) -> &BTreeSet<K> {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.child_count() == 0
    }
}
