use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;

/// Half-infinite ray. `direction` is stored normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// A zero `direction` produces a degenerate ray that hits nothing.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Finite segment from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl LineSegment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Sphere of `radius` swept from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereSweep {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

impl SphereSweep {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        debug_assert!(radius >= 0.0, "negative sphere radius {radius}");
        Self { start, end, radius }
    }
}

/// One query shape of a spatial cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CastShape {
    Ray(Ray),
    Line(LineSegment),
    Sphere(SphereSweep),
}

/// Where a cast met a collider. `distance` is measured from the cast origin
/// along the cast direction; for sphere sweeps `position` is the sphere
/// centre at first contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CastHit {
    pub distance: f32,
    pub position: Vec3,
    pub normal: Vec3,
}

/// Normalized parametric form shared by all shapes.
struct Sweep {
    origin: Vec3,
    direction: Vec3,
    t_max: f32,
    inflate: f32,
}

impl CastShape {
    fn sweep(&self) -> Option<Sweep> {
        let (origin, direction, t_max, inflate) = match *self {
            CastShape::Ray(ray) => (ray.origin, ray.direction, f32::INFINITY, 0.0),
            CastShape::Line(line) => {
                let delta = line.end - line.start;
                (line.start, delta.normalize_or_zero(), delta.length(), 0.0)
            }
            CastShape::Sphere(s) => {
                let delta = s.end - s.start;
                (s.start, delta.normalize_or_zero(), delta.length(), s.radius)
            }
        };
        if direction == Vec3::ZERO || t_max <= 0.0 {
            return None;
        }
        Some(Sweep {
            origin,
            direction,
            t_max,
            inflate,
        })
    }

    /// Zero-length segments and zero-direction rays never hit anything.
    pub fn is_degenerate(&self) -> bool {
        self.sweep().is_none()
    }

    /// Distance at which the shape first touches `aabb`, if it does.
    /// Sphere sweeps are tested against the box grown by their radius.
    pub fn enter_distance(&self, aabb: &Aabb) -> Option<f32> {
        self.cast_against(aabb).map(|hit| hit.distance)
    }

    /// Full hit record of this shape against a solid box.
    pub fn cast_against(&self, aabb: &Aabb) -> Option<CastHit> {
        let sweep = self.sweep()?;
        let target = if sweep.inflate > 0.0 {
            aabb.expanded(sweep.inflate)
        } else {
            *aabb
        };
        let (distance, normal) = target.segment_entry(sweep.origin, sweep.direction, sweep.t_max)?;
        Some(CastHit {
            distance,
            position: sweep.origin + sweep.direction * distance,
            normal,
        })
    }
}

impl From<Ray> for CastShape {
    fn from(ray: Ray) -> Self {
        Self::Ray(ray)
    }
}

impl From<LineSegment> for CastShape {
    fn from(line: LineSegment) -> Self {
        Self::Line(line)
    }
}

impl From<SphereSweep> for CastShape {
    fn from(sweep: SphereSweep) -> Self {
        Self::Sphere(sweep)
    }
}
