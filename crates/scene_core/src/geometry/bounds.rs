//! Bounding volumes shared by the CSG and collision engines

use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing every point, `None` for an empty iterator
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |mut aabb, p| {
            aabb.min = aabb.min.inf(&p);
            aabb.max = aabb.max.sup(&p);
            aabb
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the sphere passing through the box corners
    pub fn bounding_radius(&self) -> f32 {
        self.extents().magnitude()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points_encloses_all() {
        let aabb = AABB::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();

        assert_relative_eq!(aabb.min, Vec3::new(-1.0, -2.0, -4.0));
        assert_relative_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert!(AABB::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bounding_radius_reaches_corners() {
        let aabb = AABB::from_points([Vec3::new(-1.0, -2.0, -2.0), Vec3::new(1.0, 2.0, 2.0)]).unwrap();

        assert_relative_eq!(aabb.center(), Vec3::zeros());
        assert_relative_eq!(aabb.extents(), Vec3::new(1.0, 2.0, 2.0));
        assert_relative_eq!(aabb.bounding_radius(), 3.0);
    }
}
