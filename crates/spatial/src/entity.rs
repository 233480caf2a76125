use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use glam::Vec3;
use strata_common::{BoundingVolume, CastHit, CastShape, LAYER_DEFAULT};

/// Anything the index can track: it has bounds and a layer.
///
/// The index never owns entities. It stores keys and resolves them through an
/// [`EntityLookup`] whenever it needs live data.
pub trait SpatialEntity {
    fn bounds(&self) -> BoundingVolume;

    fn layer_mask(&self) -> u32 {
        LAYER_DEFAULT
    }

    /// Collision capability. Entities without one are skipped by casts.
    fn collider(&self) -> Option<&dyn Collidable> {
        None
    }
}

/// Optional capability: answer ray, line and sphere casts.
pub trait Collidable {
    fn try_collide(&self, shape: &CastShape) -> Option<CastHit>;
}

/// Resolves index keys to live entities at query time.
pub trait EntityLookup<K> {
    fn entity(&self, key: K) -> Option<&dyn SpatialEntity>;
}

impl<K, E> EntityLookup<K> for BTreeMap<K, E>
where
    K: Ord,
    E: SpatialEntity,
{
    fn entity(&self, key: K) -> Option<&dyn SpatialEntity> {
        self.get(&key).map(|e| e as &dyn SpatialEntity)
    }
}

impl<K, E> EntityLookup<K> for HashMap<K, E>
where
    K: Eq + Hash,
    E: SpatialEntity,
{
    fn entity(&self, key: K) -> Option<&dyn SpatialEntity> {
        self.get(&key).map(|e| e as &dyn SpatialEntity)
    }
}

/// Nearest hit of a cast, tagged with the entity that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInfo<K> {
    pub entity: K,
    pub distance: f32,
    pub position: Vec3,
    pub normal: Vec3,
}

impl<K: Ord> HitInfo<K> {
    /// Ordering used to pick the reported hit: smaller distance wins, equal
    /// distances fall back to the smaller key.
    pub(crate) fn beats(&self, other: &HitInfo<K>) -> bool {
        self.distance < other.distance
            || (self.distance == other.distance && self.entity < other.entity)
    }
}
