//! Splitting planes and polygon classification

use crate::csg::polygon::Polygon;
use crate::foundation::math::Vec3;

/// Tolerance deciding whether a point lies on a plane
pub const EPSILON: f32 = 1e-5;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

/// Plane `normal . p = w`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsgPlane {
    /// Unit normal
    pub normal: Vec3,
    /// Distance from the origin along `normal`
    pub w: f32,
}

/// Where a polygon landed relative to a splitting plane
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult {
    /// On the plane, facing the same way
    CoplanarFront(Polygon),
    /// On the plane, facing the other way
    CoplanarBack(Polygon),
    /// Entirely in front
    Front(Polygon),
    /// Entirely behind
    Back(Polygon),
    /// Cut in two; degenerate fragments are dropped
    Spanning {
        /// Part in front of the plane
        front: Option<Polygon>,
        /// Part behind the plane
        back: Option<Polygon>,
    },
}

impl CsgPlane {
    /// Create a plane from a unit normal and offset
    pub fn new(normal: Vec3, w: f32) -> Self {
        Self { normal, w }
    }

    /// Plane through three counter-clockwise points, `None` when collinear
    pub fn from_points(a: &Vec3, b: &Vec3, c: &Vec3) -> Option<Self> {
        let normal = (b - a).cross(&(c - a)).try_normalize(1e-12)?;
        Some(Self {
            normal,
            w: normal.dot(a),
        })
    }

    /// Reverse the facing
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance of a point
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.w
    }

    /// Classify `polygon` against this plane, splitting it when it spans
    pub fn split_polygon(&self, polygon: &Polygon) -> SplitResult {
        let types: Vec<u8> = polygon
            .vertices
            .iter()
            .map(|v| {
                let t = self.signed_distance(&v.pos);
                if t < -EPSILON {
                    BACK
                } else if t > EPSILON {
                    FRONT
                } else {
                    COPLANAR
                }
            })
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    SplitResult::CoplanarFront(polygon.clone())
                } else {
                    SplitResult::CoplanarBack(polygon.clone())
                }
            }
            FRONT => SplitResult::Front(polygon.clone()),
            BACK => SplitResult::Back(polygon.clone()),
            _ => {
                let count = polygon.vertices.len();
                let mut front = Vec::with_capacity(count + 1);
                let mut back = Vec::with_capacity(count + 1);

                for i in 0..count {
                    let j = (i + 1) % count;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);

                    if ti != BACK {
                        front.push(*vi);
                    }
                    if ti != FRONT {
                        back.push(*vi);
                    }
                    if ti | tj == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.pos))
                            / self.normal.dot(&(vj.pos - vi.pos));
                        let v = vi.interpolate(vj, t);
                        front.push(v);
                        back.push(v);
                    }
                }

                SplitResult::Spanning {
                    front: Polygon::new(front, polygon.shared),
                    back: Polygon::new(back, polygon.shared),
                }
            }
        }
    }
}
