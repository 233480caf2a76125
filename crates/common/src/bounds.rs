use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box defined by its min and max corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its corners. `min` must not exceed `max` on any axis.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            min.cmple(max).all(),
            "Aabb min {min} exceeds max {max}"
        );
        Self { min, max }
    }

    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self::new(center - half_extent, center + half_extent)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Length of the longest side.
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// True when `other` lies entirely inside this box (shared faces count).
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    /// Closed-interval overlap test: touching boxes intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow every face outwards by `amount`.
    pub fn expanded(&self, amount: f32) -> Aabb {
        Aabb::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    /// Pad any axis thinner than `extent` symmetrically up to `extent`.
    pub fn with_min_extent(&self, extent: f32) -> Aabb {
        let size = self.size();
        let pad = (Vec3::splat(extent) - size).max(Vec3::ZERO) * 0.5;
        Aabb {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Bounds of child octant `index`: bit 0 selects +x, bit 1 +y, bit 2 +z.
    /// Octant 0 touches `min`, octant 7 touches `max`.
    pub fn octant(&self, index: usize) -> Aabb {
        debug_assert!(index < 8, "octant index {index} out of range");
        let center = self.center();
        let pick = |bit: usize, lo: f32, mid: f32, hi: f32| {
            if index & bit != 0 { (mid, hi) } else { (lo, mid) }
        };
        let (x0, x1) = pick(1, self.min.x, center.x, self.max.x);
        let (y0, y1) = pick(2, self.min.y, center.y, self.max.y);
        let (z0, z1) = pick(4, self.min.z, center.z, self.max.z);
        Aabb {
            min: Vec3::new(x0, y0, z0),
            max: Vec3::new(x1, y1, z1),
        }
    }

    /// Slab test of the parametric segment `origin + direction * t`, `t` in
    /// `[0, t_max]`. `direction` must be normalized so `t` is a distance.
    ///
    /// Returns the entry distance and the outward normal of the entry face.
    /// A segment starting inside the box enters at `t = 0` with normal
    /// `-direction`.
    pub fn segment_entry(&self, origin: Vec3, direction: Vec3, t_max: f32) -> Option<(f32, Vec3)> {
        let mut t_enter = 0.0_f32;
        let mut t_exit = t_max;
        let mut normal = -direction;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() <= f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let (near, far) = {
                let t0 = (lo - o) * inv;
                let t1 = (hi - o) * inv;
                if t0 <= t1 { (t0, t1) } else { (t1, t0) }
            };

            if near > t_enter {
                t_enter = near;
                let mut n = Vec3::ZERO;
                n[axis] = if d > 0.0 { -1.0 } else { 1.0 };
                normal = n;
            }
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        Some((t_enter, normal))
    }
}

/// Spatial extent of a renderable: a finite box, or one of two sentinels.
///
/// `Zero` means no visual footprint (never indexed); `Infinite` means the
/// object covers all space (tracked outside the octree).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundingVolume {
    Zero,
    Infinite,
    Finite(Aabb),
}

impl BoundingVolume {
    pub fn finite(min: Vec3, max: Vec3) -> Self {
        Self::Finite(Aabb::new(min, max))
    }

    pub fn as_aabb(&self) -> Option<&Aabb> {
        match self {
            Self::Finite(b) => Some(b),
            _ => None,
        }
    }

    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        match (self, other) {
            (Self::Infinite, _) | (_, Self::Infinite) => Self::Infinite,
            (Self::Zero, v) | (v, Self::Zero) => *v,
            (Self::Finite(a), Self::Finite(b)) => Self::Finite(a.union(b)),
        }
    }

    /// `Zero` is contained by everything; only `Infinite` contains `Infinite`.
    pub fn contains(&self, other: &BoundingVolume) -> bool {
        match (self, other) {
            (_, Self::Zero) => true,
            (Self::Infinite, _) => true,
            (_, Self::Infinite) => false,
            (Self::Zero, Self::Finite(_)) => false,
            (Self::Finite(a), Self::Finite(b)) => a.contains(b),
        }
    }

    /// `Zero` intersects nothing; `Infinite` intersects every non-zero volume.
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        match (self, other) {
            (Self::Zero, _) | (_, Self::Zero) => false,
            (Self::Infinite, _) | (_, Self::Infinite) => true,
            (Self::Finite(a), Self::Finite(b)) => a.intersects(b),
        }
    }
}

impl From<Aabb> for BoundingVolume {
    fn from(aabb: Aabb) -> Self {
        Self::Finite(aabb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn accessors() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(b.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.size(), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(b.max_extent(), 6.0);
    }

    #[test]
    fn containment_includes_shared_faces() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        assert!(outer.contains(&unit()));
        assert!(outer.contains(&outer));
        assert!(!unit().contains(&outer));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = unit();
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Vec3::splat(1.5), Vec3::splat(2.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn octants_tile_the_parent() {
        let parent = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(parent.octant(0), unit());
        assert_eq!(parent.octant(7), Aabb::new(Vec3::ONE, Vec3::splat(2.0)));
        assert_eq!(
            parent.octant(1),
            Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0))
        );
        let total: f32 = (0..8)
            .map(|i| {
                let s = parent.octant(i).size();
                s.x * s.y * s.z
            })
            .sum();
        assert_eq!(total, 8.0);
    }

    #[test]
    fn min_extent_pads_degenerate_axes_only() {
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 4.0));
        let padded = flat.with_min_extent(1.0);
        assert_eq!(padded.min, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(padded.max, Vec3::new(4.0, 0.5, 4.0));
        assert!(padded.contains(&flat));
    }

    #[test]
    fn segment_entry_hits_near_face() {
        let (t, n) = unit()
            .segment_entry(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, f32::INFINITY)
            .unwrap();
        assert!((t - 1.0).abs() < 1e-6);
        assert_eq!(n, Vec3::NEG_X);
    }

    #[test]
    fn segment_entry_misses_offset_ray() {
        assert!(
            unit()
                .segment_entry(Vec3::new(-1.0, 5.0, 5.0), Vec3::X, f32::INFINITY)
                .is_none()
        );
    }

    #[test]
    fn segment_entry_respects_length() {
        assert!(
            unit()
                .segment_entry(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, 0.5)
                .is_none()
        );
    }

    #[test]
    fn segment_entry_from_inside_is_zero() {
        let (t, n) = unit()
            .segment_entry(Vec3::splat(0.5), Vec3::Y, f32::INFINITY)
            .unwrap();
        assert_eq!(t, 0.0);
        assert_eq!(n, Vec3::NEG_Y);
    }

    #[test]
    fn segment_pointing_away_misses() {
        assert!(
            unit()
                .segment_entry(Vec3::new(-1.0, 0.5, 0.5), Vec3::NEG_X, f32::INFINITY)
                .is_none()
        );
    }

    #[test]
    fn volume_union_and_sentinels() {
        let a = BoundingVolume::from(unit());
        let b = BoundingVolume::finite(Vec3::splat(2.0), Vec3::splat(3.0));
        assert_eq!(
            a.union(&b),
            BoundingVolume::finite(Vec3::ZERO, Vec3::splat(3.0))
        );
        assert_eq!(a.union(&BoundingVolume::Zero), a);
        assert_eq!(a.union(&BoundingVolume::Infinite), BoundingVolume::Infinite);
    }

    #[test]
    fn volume_containment_rules() {
        let a = BoundingVolume::from(unit());
        assert!(BoundingVolume::Infinite.contains(&a));
        assert!(!a.contains(&BoundingVolume::Infinite));
        assert!(a.contains(&BoundingVolume::Zero));
        assert!(!BoundingVolume::Zero.contains(&a));
    }

    #[test]
    fn volume_intersection_rules() {
        let a = BoundingVolume::from(unit());
        assert!(BoundingVolume::Infinite.intersects(&a));
        assert!(!BoundingVolume::Zero.intersects(&a));
        assert!(!BoundingVolume::Zero.intersects(&BoundingVolume::Infinite));
    }
}
