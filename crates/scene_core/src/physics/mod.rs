//! Physics module: collision detection and response
//!
//! Movers are ellipsoids resolved against static triangle meshes, with
//! collision groups filtering which meshes a mover can hit.

pub mod collision;
pub mod collision_layers;

pub use collision::{
    CollidableMesh,
    Collider,
    CollisionCoordinator,
    CollisionResult,
    MeshKey,
};
pub use collision_layers::CollisionLayers;
