//! Geometry contracts
//!
//! Flat mesh buffers, submesh ranges and bounding volumes consumed by the
//! CSG and collision engines.

pub mod bounds;
pub mod mesh_data;

pub use bounds::AABB;
pub use mesh_data::{validate_source, GeometryError, MeshData, MeshSource, SubMesh};
