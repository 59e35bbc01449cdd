//! Bone data owned by a [`Skeleton`](super::Skeleton) arena
//!
//! A bone only knows its parent by [`BoneId`]; everything that needs the
//! hierarchy (difference matrices, world matrices) is driven by the skeleton.

use slotmap::new_key_type;

use crate::animation::track::AnimationTrack;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

new_key_type! {
    /// Stable handle of a bone inside its skeleton
    pub struct BoneId;
}

/// Coordinate space for bone pose queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Relative to the parent bone
    Local,
    /// Relative to the scene, through the owning mesh's world matrix
    World,
}

/// A single joint of a skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Bone name
    pub name: String,
    /// Optional external identifier
    pub id: Option<String>,
    pub(crate) index: Option<usize>,
    pub(crate) parent: Option<BoneId>,
    pub(crate) local_matrix: Mat4,
    pub(crate) rest_pose: Mat4,
    pub(crate) base_matrix: Mat4,
    pub(crate) absolute_transform: Mat4,
    pub(crate) inverted_absolute_transform: Mat4,
    pub(crate) world_matrix: Mat4,
    pub(crate) scaling_determinant: f32,
    pub(crate) linked_transform_node: Option<String>,
    pub(crate) length: Option<f32>,
    pub(crate) animation: Option<AnimationTrack>,
}

impl Bone {
    /// Create a bone whose rest pose and bind matrix equal `local_matrix`
    pub fn new(name: impl Into<String>, local_matrix: Mat4) -> Self {
        Self {
            name: name.into(),
            id: None,
            index: None,
            parent: None,
            local_matrix,
            rest_pose: local_matrix,
            base_matrix: local_matrix,
            absolute_transform: Mat4::identity(),
            inverted_absolute_transform: Mat4::identity(),
            world_matrix: local_matrix,
            scaling_determinant: determinant_sign(&local_matrix),
            linked_transform_node: None,
            length: None,
            animation: None,
        }
    }

    /// Override the rest pose
    pub fn with_rest_pose(mut self, rest_pose: Mat4) -> Self {
        self.rest_pose = rest_pose;
        self
    }

    /// Override the bind (base) matrix
    pub fn with_base_matrix(mut self, base_matrix: Mat4) -> Self {
        self.base_matrix = base_matrix;
        self
    }

    /// Map the bone to a fixed slot of the skinning buffer
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the bone length used when rescaling copied animations
    pub fn with_length(mut self, length: f32) -> Self {
        self.length = Some(length);
        self
    }

    /// Drive the local matrix from an external transform node
    pub fn with_linked_transform_node(mut self, node_id: impl Into<String>) -> Self {
        self.linked_transform_node = Some(node_id.into());
        self
    }

    /// Attach a keyframe track
    pub fn with_animation(mut self, track: AnimationTrack) -> Self {
        self.animation = Some(track);
        self
    }

    /// Set the external identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Mapped skinning buffer slot, if any
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Parent bone
    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    /// Animated local matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// Replace the animated local matrix
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        self.scaling_determinant = determinant_sign(&matrix);
        self.local_matrix = matrix;
    }

    /// Rest pose
    pub fn rest_pose(&self) -> &Mat4 {
        &self.rest_pose
    }

    /// Replace the rest pose
    pub fn set_rest_pose(&mut self, matrix: Mat4) {
        self.rest_pose = matrix;
    }

    /// Bind matrix relative to the parent
    pub fn base_matrix(&self) -> &Mat4 {
        &self.base_matrix
    }

    /// Absolute bind transform
    pub fn absolute_transform(&self) -> &Mat4 {
        &self.absolute_transform
    }

    /// Inverse of the absolute bind transform
    pub fn inverted_absolute_transform(&self) -> &Mat4 {
        &self.inverted_absolute_transform
    }

    /// Animated world matrix from the last evaluation
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// `-1.0` when the local matrix mirrors, otherwise `1.0`
    pub fn scaling_determinant(&self) -> f32 {
        self.scaling_determinant
    }

    /// Bone length
    pub fn length(&self) -> Option<f32> {
        self.length
    }

    /// Linked transform node id
    pub fn linked_transform_node(&self) -> Option<&str> {
        self.linked_transform_node.as_deref()
    }

    /// Keyframe track
    pub fn animation(&self) -> Option<&AnimationTrack> {
        self.animation.as_ref()
    }

    /// Mutable keyframe track
    pub fn animation_mut(&mut self) -> Option<&mut AnimationTrack> {
        self.animation.as_mut()
    }

    /// Reset the local matrix to the rest pose
    pub fn return_to_rest(&mut self) {
        self.set_local_matrix(self.rest_pose);
    }

    /// Bone position in the given space.
    ///
    /// World space reads the last evaluated world matrix, so the skeleton
    /// must have been evaluated since the last change.
    pub fn get_position(&self, space: Space, mesh_world: Option<&Mat4>) -> Vec3 {
        match space {
            Space::Local => self.local_matrix.translation_part(),
            Space::World => match mesh_world {
                Some(mesh) => (mesh * self.world_matrix).translation_part(),
                None => self.world_matrix.translation_part(),
            },
        }
    }

    /// World-space position of the bone
    pub fn get_absolute_position(&self, mesh_world: Option<&Mat4>) -> Vec3 {
        self.get_position(Space::World, mesh_world)
    }

    /// Set the local translation
    pub fn set_position(&mut self, position: &Vec3) {
        let mut local = self.local_matrix;
        local.set_translation_part(position);
        self.set_local_matrix(local);
    }

    /// Offset the local translation
    pub fn translate(&mut self, offset: &Vec3) {
        let position = self.local_matrix.translation_part() + offset;
        self.set_position(&position);
    }

    /// Rotate around an axis of the bone's own frame, keeping its translation
    pub fn rotate(&mut self, axis: &Vec3, angle: f32) {
        let translation = self.local_matrix.translation_part();
        let mut rotated = self.local_matrix;
        rotated.set_translation_part(&Vec3::zeros());
        rotated *= Mat4::rotation_axis(axis, angle);
        rotated.set_translation_part(&translation);
        self.set_local_matrix(rotated);
    }
}

fn determinant_sign(matrix: &Mat4) -> f32 {
    if matrix.determinant() < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_bone_uses_local_as_rest_and_bind() {
        let local = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        let bone = Bone::new("spine", local);

        assert_eq!(bone.rest_pose(), &local);
        assert_eq!(bone.base_matrix(), &local);
        assert_relative_eq!(bone.scaling_determinant(), 1.0);
    }

    #[test]
    fn test_rotate_preserves_translation() {
        let mut bone = Bone::new("arm", Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)));
        bone.rotate(&Vec3::z(), HALF_PI);

        assert_relative_eq!(bone.get_position(Space::Local, None), Vec3::new(1.0, 2.0, 3.0));
        let x_axis = bone.local_matrix().transform_vector(&Vec3::x());
        assert_relative_eq!(x_axis, Vec3::y(), epsilon = 1e-6);
    }

    #[test]
    fn test_translate_and_set_position() {
        let mut bone = Bone::new("hand", Mat4::identity());
        bone.set_position(&Vec3::new(1.0, 0.0, 0.0));
        bone.translate(&Vec3::new(0.0, 2.0, 0.0));

        assert_relative_eq!(bone.get_position(Space::Local, None), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_mirrored_local_flips_determinant() {
        let mut bone = Bone::new("mirror", Mat4::identity());
        bone.set_local_matrix(Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, 1.0, 1.0)));

        assert_relative_eq!(bone.scaling_determinant(), -1.0);
        bone.return_to_rest();
        assert_relative_eq!(bone.scaling_determinant(), 1.0);
    }

    #[test]
    fn test_pose_edits_keep_determinant_in_step() {
        let mirror = Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, 1.0, 1.0));
        let mut bone = Bone::new("mirror", mirror);
        bone.set_local_matrix(Mat4::identity());

        bone.set_local_matrix(mirror);
        bone.set_position(&Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(bone.scaling_determinant(), -1.0);
        bone.translate(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(bone.scaling_determinant(), -1.0);
        bone.rotate(&Vec3::y(), 0.7);
        assert_relative_eq!(bone.scaling_determinant(), -1.0);
        assert_relative_eq!(bone.scaling_determinant(), determinant_sign(bone.local_matrix()));
        assert_relative_eq!(bone.get_position(Space::Local, None), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_world_position_through_mesh_matrix() {
        let mut bone = Bone::new("root", Mat4::identity());
        bone.world_matrix = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        let mesh = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));

        assert_relative_eq!(bone.get_absolute_position(Some(&mesh)), Vec3::new(5.0, 1.0, 0.0));
    }
}
