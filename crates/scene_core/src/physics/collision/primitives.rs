//! Numeric building blocks of the swept-sphere test
//!
//! All functions work in ellipsoid-scaled space, where the moving volume is
//! a unit sphere.

use crate::foundation::math::Vec3;

/// Below this magnitude a triangle normal is treated as degenerate
const DEGENERATE_NORMAL: f32 = 1e-12;

/// Plane `normal . p + d = 0` built from a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPlane {
    /// Unit normal, zero for a degenerate triangle
    pub normal: Vec3,
    /// Offset
    pub d: f32,
}

impl CollisionPlane {
    /// Plane through three counter-clockwise points
    pub fn from_points(p1: &Vec3, p2: &Vec3, p3: &Vec3) -> Self {
        let cross = (p2 - p1).cross(&(p3 - p1));
        let length = cross.magnitude();
        let normal = if length > 0.0 { cross / length } else { Vec3::zeros() };
        Self {
            normal,
            d: -normal.dot(p1),
        }
    }

    /// Whether the triangle had no area
    pub fn is_degenerate(&self) -> bool {
        self.normal.magnitude_squared() < DEGENERATE_NORMAL
    }

    /// Signed distance of a point
    pub fn signed_distance_to(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Whether a movement along `direction` approaches the front side
    pub fn is_front_facing_to(&self, direction: &Vec3, epsilon: f32) -> bool {
        self.normal.dot(direction) <= epsilon
    }
}

/// Signed distance of `point` to the plane through `origin` with `normal`
pub fn signed_distance_to_plane(origin: &Vec3, normal: &Vec3, point: &Vec3) -> f32 {
    normal.dot(point) - normal.dot(origin)
}

/// Lazily filled per-face plane cache of a static triangle stream
#[derive(Debug, Clone, Default)]
pub struct TrianglePlaneCache {
    planes: Vec<Option<CollisionPlane>>,
}

impl TrianglePlaneCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached plane
    pub fn clear(&mut self) {
        self.planes.clear();
    }

    /// Number of faces with a cached plane
    pub fn cached_count(&self) -> usize {
        self.planes.iter().filter(|p| p.is_some()).count()
    }

    /// Cached plane of `face`, computed from the points on first use
    pub fn get_or_compute(&mut self, face: usize, p1: &Vec3, p2: &Vec3, p3: &Vec3) -> CollisionPlane {
        if self.planes.len() <= face {
            self.planes.resize(face + 1, None);
        }
        *self.planes[face].get_or_insert_with(|| CollisionPlane::from_points(p1, p2, p3))
    }
}

/// Interval during which the unit sphere overlaps a triangle's plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSweep {
    /// Entry time, clamped to `[0, 1]`
    pub t0: f32,
    /// Exit time
    pub t1: f32,
    /// Moving parallel to the plane while already within unit distance
    pub embedded: bool,
}

/// Time interval in which a unit sphere at signed distance
/// `signed_distance` touches the plane while moving with
/// `normal_dot_velocity`, or `None` when it never does within the step
pub fn sweep_plane(signed_distance: f32, normal_dot_velocity: f32) -> Option<PlaneSweep> {
    if normal_dot_velocity.abs() <= f32::EPSILON {
        if signed_distance.abs() >= 1.0 {
            return None;
        }
        return Some(PlaneSweep {
            t0: 0.0,
            t1: 1.0,
            embedded: true,
        });
    }

    let mut t0 = (-1.0 - signed_distance) / normal_dot_velocity;
    let mut t1 = (1.0 - signed_distance) / normal_dot_velocity;
    if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
    }
    if t0 > 1.0 || t1 < 0.0 {
        return None;
    }

    Some(PlaneSweep {
        t0: t0.clamp(0.0, 1.0),
        t1,
        embedded: false,
    })
}

/// Smallest root of `a t^2 + b t + c = 0` in `[0, max_r)`.
///
/// No real roots, a degenerate `a`, or roots outside the range give `None`.
pub fn get_lowest_root(a: f32, b: f32, c: f32, max_r: f32) -> Option<f32> {
    if a.abs() <= f32::EPSILON {
        return None;
    }
    let determinant = b * b - 4.0 * a * c;
    if determinant < 0.0 {
        return None;
    }

    let sqrt_d = determinant.sqrt();
    let mut r1 = (-b - sqrt_d) / (2.0 * a);
    let mut r2 = (-b + sqrt_d) / (2.0 * a);
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }

    [r1, r2].into_iter().find(|&r| r >= 0.0 && r < max_r)
}

/// Same-side test of `point` against the three edges of a triangle with
/// normal `n`; points on an edge count as inside
pub fn check_point_in_triangle(point: &Vec3, pa: &Vec3, pb: &Vec3, pc: &Vec3, n: &Vec3) -> bool {
    let to_a = pa - point;
    let to_b = pb - point;
    if to_a.cross(&to_b).dot(n) < 0.0 {
        return false;
    }
    let to_c = pc - point;
    if to_b.cross(&to_c).dot(n) < 0.0 {
        return false;
    }
    to_c.cross(&to_a).dot(n) >= 0.0
}

/// Whether a sphere overlaps the box `[min, max]` (per-axis slab test)
pub fn intersect_box_aa_sphere(min: &Vec3, max: &Vec3, center: &Vec3, radius: f32) -> bool {
    min.x <= center.x + radius
        && max.x >= center.x - radius
        && min.y <= center.y + radius
        && max.y >= center.y - radius
        && min.z <= center.z + radius
        && max.z >= center.z - radius
}
