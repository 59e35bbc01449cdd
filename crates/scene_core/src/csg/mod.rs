//! Constructive solid geometry
//!
//! Boolean operations on meshes through BSP-tree polygon clipping.
//!
//! # Module Organization
//!
//! - [`vertex`], [`polygon`], [`plane`] - Clipping primitives
//! - [`node`] - BSP tree built per operation
//! - [`solid`] - The [`Csg`] solid, mesh conversion and boolean operations
//! - [`mesh_builder`] - Polygons back to flat mesh buffers
//!
//! ```rust,no_run
//! use scene_core::core::config::CsgSettings;
//! use scene_core::csg::Csg;
//! use scene_core::foundation::math::Vec3;
//! use scene_core::geometry::MeshData;
//!
//! let a = Csg::from_mesh(&MeshData::cuboid("a", Vec3::new(1.0, 1.0, 1.0)))?;
//! let b = Csg::from_mesh(&MeshData::cuboid("b", Vec3::new(0.5, 2.0, 0.5)))?;
//! let drilled = a.subtract(&b).to_mesh("drilled", &CsgSettings::default());
//! # Ok::<(), scene_core::geometry::GeometryError>(())
//! ```

pub mod mesh_builder;
pub mod node;
pub mod plane;
pub mod polygon;
pub mod solid;
pub mod vertex;

pub use mesh_builder::{build_mesh_geometry, VertexDedup};
pub use node::Node;
pub use plane::{CsgPlane, SplitResult};
pub use polygon::{Polygon, PolygonShared};
pub use solid::Csg;
pub use vertex::Vertex;
