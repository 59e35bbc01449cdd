//! CSG vertex

use crate::foundation::math::{Vec2, Vec3, Vec4};

/// Polygon vertex carrying the attributes interpolated by clipping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// World-space position
    pub pos: Vec3,
    /// World-space normal
    pub normal: Vec3,
    /// Texture coordinate
    pub uv: Option<Vec2>,
    /// RGBA vertex color
    pub color: Option<Vec4>,
}

impl Vertex {
    /// Create a vertex
    pub fn new(pos: Vec3, normal: Vec3, uv: Option<Vec2>) -> Self {
        Self {
            pos,
            normal,
            uv,
            color: None,
        }
    }

    /// Attach a vertex color
    pub fn with_color(mut self, color: Option<Vec4>) -> Self {
        self.color = color;
        self
    }

    /// Reverse the normal
    pub fn flip(&mut self) {
        self.normal = -self.normal;
    }

    /// Linear blend toward `other`; UVs and colors blend only when both
    /// sides have one
    pub fn interpolate(&self, other: &Vertex, t: f32) -> Vertex {
        Vertex {
            pos: self.pos.lerp(&other.pos, t),
            normal: self.normal.lerp(&other.normal, t),
            uv: match (self.uv, other.uv) {
                (Some(a), Some(b)) => Some(a.lerp(&b, t)),
                (uv, _) => uv,
            },
            color: match (self.color, other.color) {
                (Some(a), Some(b)) => Some(a.lerp(&b, t)),
                (color, _) => color,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_midpoint() {
        let a = Vertex::new(Vec3::zeros(), Vec3::x(), Some(Vec2::new(0.0, 0.0)));
        let b = Vertex::new(Vec3::new(2.0, 0.0, 0.0), Vec3::y(), Some(Vec2::new(1.0, 1.0)));
        let mid = a.interpolate(&b, 0.5);

        assert_relative_eq!(mid.pos, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(mid.normal, Vec3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(mid.uv.unwrap(), Vec2::new(0.5, 0.5));
        assert!(mid.color.is_none());
    }

    #[test]
    fn test_interpolate_blends_colors() {
        let red = Vertex::new(Vec3::zeros(), Vec3::z(), None)
            .with_color(Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        let blue = Vertex::new(Vec3::x(), Vec3::z(), None)
            .with_color(Some(Vec4::new(0.0, 0.0, 1.0, 0.5)));

        let quarter = red.interpolate(&blue, 0.25);
        assert_relative_eq!(quarter.color.unwrap(), Vec4::new(0.75, 0.0, 0.25, 0.875));
    }
}
