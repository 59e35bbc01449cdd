//! Math utilities and types
//!
//! Thin layer over `nalgebra` shared by the skeleton, CSG and collision
//! engines. All matrices use the column-vector convention: a point is
//! transformed as `m * p`, and a child's absolute transform is
//! `parent * local`.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type (texture coordinates)
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type (RGBA vertex colors)
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Tolerance used by [`almost_equal`]
pub const EPSILON: f32 = 1e-6;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform from all three components
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into position, rotation and scale.
    ///
    /// A negative determinant is folded into the X scale so the rotation part
    /// stays a proper rotation.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let mut scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();

        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if linear.determinant() < 0.0 {
            scale_x = -scale_x;
        }

        let safe = |s: f32| if s.abs() < EPSILON { 1.0 } else { s };
        let rotation_matrix = Matrix3::new(
            matrix.m11 / safe(scale_x), matrix.m12 / safe(scale_y), matrix.m13 / safe(scale_z),
            matrix.m21 / safe(scale_x), matrix.m22 / safe(scale_y), matrix.m23 / safe(scale_z),
            matrix.m31 / safe(scale_x), matrix.m32 / safe(scale_y), matrix.m33 / safe(scale_z),
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale: Vec3::new(scale_x, scale_y, scale_z),
        }
    }

    /// Interpolate two transforms: lerp position and scale, slerp rotation
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            position: self.position.lerp(&other.position, t),
            rotation: self.rotation.slerp(&other.rotation, t),
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

/// Compare two floats with the engine-wide [`EPSILON`]
pub fn almost_equal(a: f32, b: f32) -> bool {
    approx::abs_diff_eq!(a, b, epsilon = EPSILON)
}

/// Transform a position (w = 1) by a matrix
pub fn transform_coordinates(matrix: &Mat4, v: &Vec3) -> Vec3 {
    matrix.transform_point(&Point3::from(*v)).coords
}

/// Transform a direction (w = 0) by a matrix
pub fn transform_normal(matrix: &Mat4, v: &Vec3) -> Vec3 {
    matrix.transform_vector(v)
}

/// Invert a matrix, falling back to identity for singular input
pub fn invert_or_identity(matrix: &Mat4) -> Mat4 {
    matrix.try_inverse().unwrap_or_else(Mat4::identity)
}

/// Column-major float array of a matrix
pub fn matrix_to_array(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Matrix from a column-major float array
pub fn matrix_from_array(values: &[f32; 16]) -> Mat4 {
    Mat4::from_column_slice(values)
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Create a rotation matrix around an arbitrary axis
    fn rotation_axis(axis: &Vec3, angle: f32) -> Mat4;

    /// Translation part of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Overwrite the translation part of an affine matrix
    fn set_translation_part(&mut self, translation: &Vec3);
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn rotation_axis(axis: &Vec3, angle: f32) -> Mat4 {
        match Unit::try_new(*axis, EPSILON) {
            Some(unit) => Mat4::from_axis_angle(&unit, angle),
            None => Mat4::identity(),
        }
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn set_translation_part(&mut self, translation: &Vec3) {
        self.m14 = translation.x;
        self.m24 = translation.y;
        self.m34 = translation.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_round_trip_through_matrix() {
        let transform = Transform::new(
            Vec3::new(1.0, -2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
            Vec3::new(2.0, 1.0, 0.5),
        );

        let decomposed = Transform::from_matrix(&transform.to_matrix());

        assert_relative_eq!(decomposed.position, transform.position, epsilon = 1e-5);
        assert_relative_eq!(decomposed.scale, transform.scale, epsilon = 1e-5);
        assert_relative_eq!(
            decomposed.rotation.to_rotation_matrix().into_inner(),
            transform.rotation.to_rotation_matrix().into_inner(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_matrix_array_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let values = matrix_to_array(&m);

        assert_eq!(&values[12..15], &[4.0, 5.0, 6.0]);
        assert_eq!(matrix_from_array(&values), m);
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let m = Mat4::rotation_z(constants::HALF_PI);
        let p = transform_coordinates(&m, &Vec3::new(0.0, 1.0, 0.0));

        assert_relative_eq!(p, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_singular_matrix_inverts_to_identity() {
        let singular = Mat4::zeros();
        assert_eq!(invert_or_identity(&singular), Mat4::identity());
    }
}
