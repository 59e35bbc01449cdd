//! # Scene Core
//!
//! Geometry engines behind a real-time 3D scene: skeletal animation, CSG
//! booleans and swept-ellipsoid collision.
//!
//! ## Features
//!
//! - **Skeletons**: Bone hierarchies evaluated into a flat skinning buffer,
//!   with keyframe tracks, named ranges and RON persistence
//! - **CSG**: Union, subtraction and intersection of meshes through BSP trees
//! - **Collision**: Collide-and-slide movement of ellipsoids over triangle meshes
//! - **Config**: TOML/RON settings for every subsystem
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_core::prelude::*;
//!
//! let mut skeleton = Skeleton::new("rig", "rig-0");
//! let root = skeleton.add_bone(Bone::new("root", Mat4::identity()), None)?;
//! skeleton.add_bone(Bone::new("tip", Mat4::new_translation(&Vec3::y())), Some(root))?;
//!
//! let matrices = skeleton.get_transform_matrices(None);
//! assert_eq!(matrices.len(), 2 * MATRIX_STRIDE);
//! # Ok::<(), scene_core::animation::SkeletonError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;

// Subsystems
pub mod animation;
pub mod csg;
pub mod geometry;
pub mod physics;

#[cfg(test)]
mod tests;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{AnimationRange, AnimationTrack, Bone, BoneId, Skeleton, SkinnedMesh, Space, MATRIX_STRIDE},
        config::{Config, ConfigFormat},
        core::config::{CollisionSettings, CsgSettings, EngineSettings, LoggingSettings},
        csg::{Csg, VertexDedup},
        foundation::math::{Mat4, Mat4Ext, Quat, Transform, Vec2, Vec3},
        geometry::{MeshData, MeshSource, SubMesh, AABB},
        physics::{CollidableMesh, Collider, CollisionCoordinator, CollisionLayers, CollisionResult, MeshKey},
    };
}
