//! Swept-ellipsoid collision against static triangle meshes
//!
//! Movement is resolved with the collide-and-slide scheme: the ellipsoid is
//! swept along its displacement, stopped at the nearest contact, and the
//! remaining movement is projected onto the contact plane. The loop repeats
//! until the residual movement is negligible or the retry budget runs out.
//!
//! # Module Organization
//!
//! - [`primitives`] - Root finding, plane sweep and containment tests
//! - [`collider`] - The moving ellipsoid and its per-triangle test
//! - [`collidable`] - Registered meshes and their transformed-vertex caches
//! - [`coordinator`] - The retry loop over every registered mesh
//!
//! ```
//! use scene_core::foundation::math::Vec3;
//! use scene_core::geometry::MeshData;
//! use scene_core::physics::{CollidableMesh, Collider, CollisionCoordinator};
//! use scene_core::core::CollisionSettings;
//!
//! let mut coordinator = CollisionCoordinator::new(CollisionSettings::default());
//! let ground = CollidableMesh::from_source("ground", &MeshData::plane("ground", 5.0))?;
//! coordinator.add_mesh(ground);
//!
//! let mut collider = Collider::new(Vec3::new(1.0, 1.0, 1.0));
//! let result = coordinator.get_new_position(
//!     Vec3::new(0.0, 5.0, 0.0),
//!     Vec3::new(0.0, -10.0, 0.0),
//!     &mut collider,
//!     5,
//!     None,
//! );
//! assert!(result.collision_found);
//! assert!(result.position.y > 1.0);
//! # Ok::<(), scene_core::geometry::GeometryError>(())
//! ```

pub mod collidable;
pub mod collider;
pub mod coordinator;
pub mod primitives;

pub use collidable::{CollidableMesh, MeshKey};
pub use collider::Collider;
pub use coordinator::{CollisionCoordinator, CollisionResult};
pub use primitives::{
    check_point_in_triangle, get_lowest_root, intersect_box_aa_sphere, sweep_plane, CollisionPlane, PlaneSweep,
    TrianglePlaneCache,
};
