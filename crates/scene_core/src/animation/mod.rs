//! Skeletal animation
//!
//! Bone hierarchies evaluated into flat skinning buffers, with named
//! animation ranges cascading into per-bone keyframe tracks.
//!
//! # Module Organization
//!
//! - [`bone`] - Bone data and pose helpers
//! - [`skeleton`] - Bone arena, world matrix evaluation, skinning buffers
//! - [`track`] - Matrix keyframe tracks and named ranges
//! - [`serialization`] - Serde form of a skeleton, RON round trip

pub mod bone;
pub mod serialization;
pub mod skeleton;
pub mod track;

use std::collections::HashMap;

use thiserror::Error;

use crate::foundation::math::Mat4;

pub use bone::{Bone, BoneId, Space};
pub use serialization::{SerializedBone, SerializedSkeleton};
pub use skeleton::{Skeleton, MATRIX_STRIDE};
pub use track::{AnimationRange, AnimationTrack, MatrixKey};

/// A mesh deformed by a skeleton
pub trait SkinnedMesh {
    /// Identifier used to key per-mesh skinning buffers
    fn unique_id(&self) -> u64;

    /// Root transform applied when the skeleton needs an initial skin matrix
    fn pose_matrix(&self) -> Mat4;
}

/// Resolves linked transform node ids to their local matrices
pub trait TransformNodeLookup {
    /// Local matrix of the node, `None` when unknown
    fn local_matrix(&self, node_id: &str) -> Option<Mat4>;
}

impl TransformNodeLookup for HashMap<String, Mat4> {
    fn local_matrix(&self, node_id: &str) -> Option<Mat4> {
        self.get(node_id).copied()
    }
}

/// Skeleton construction and serialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkeletonError {
    /// Parent handle does not belong to this skeleton
    #[error("parent of bone '{0}' is not part of the skeleton")]
    UnknownParent(String),

    /// Serialized parent index points outside the bone list
    #[error("bone {bone} has invalid parent index {parent}")]
    InvalidParentIndex {
        /// Bone position in the serialized list
        bone: usize,
        /// Offending parent index
        parent: usize,
    },

    /// Serialized parent links form a cycle
    #[error("bone hierarchy contains a cycle through '{0}'")]
    CyclicHierarchy(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Parsing failed
    #[error("Parse error: {0}")]
    Parse(String),
}
