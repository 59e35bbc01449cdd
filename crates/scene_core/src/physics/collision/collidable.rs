//! Static triangle meshes registered with the collision coordinator
//!
//! A [`CollidableMesh`] keeps local positions, world bounds per mesh and per
//! submesh, and a per-submesh cache of vertices transformed into the
//! collider's ellipsoid space. The cache is rebuilt only when that transform
//! changes.

use slotmap::new_key_type;

use crate::foundation::math::{transform_coordinates, Mat4, Vec3};
use crate::geometry::{validate_source, GeometryError, MeshSource, SubMesh, AABB};
use crate::physics::collision::collider::Collider;
use crate::physics::collision::primitives::TrianglePlaneCache;
use crate::physics::collision_layers::CollisionLayers;

new_key_type! {
    /// Handle of a mesh registered with a [`CollisionCoordinator`](super::CollisionCoordinator)
    pub struct MeshKey;
}

#[derive(Debug, Clone, Default)]
struct SubMeshCollisionCache {
    transform: Option<Mat4>,
    vertices: Vec<Vec3>,
    planes: TrianglePlaneCache,
}

/// Triangle mesh the collider can hit
#[derive(Debug, Clone)]
pub struct CollidableMesh {
    /// Mesh name, for logging
    pub name: String,
    /// Whether the mesh takes part in collisions at all
    pub check_collisions: bool,
    /// Disabled meshes are skipped
    pub enabled: bool,
    /// Groups the mesh belongs to
    pub collision_group: CollisionLayers,
    /// Mask used when this mesh is the one being moved
    pub collision_mask: CollisionLayers,
    /// Meshes with a material collide on both faces
    pub has_material: bool,

    positions: Vec<Vec3>,
    indices: Vec<u32>,
    sub_meshes: Vec<SubMesh>,
    world_matrix: Mat4,
    world_bounds: Option<AABB>,
    sub_mesh_bounds: Vec<Option<AABB>>,
    caches: Vec<SubMeshCollisionCache>,
}

impl CollidableMesh {
    /// Copy the geometry of a mesh source, placed with its world matrix
    pub fn from_source<M: MeshSource + ?Sized>(name: impl Into<String>, mesh: &M) -> Result<Self, GeometryError> {
        validate_source(mesh)?;

        let sub_meshes = mesh.sub_mesh_ranges();
        let mut collidable = Self {
            name: name.into(),
            check_collisions: true,
            enabled: true,
            collision_group: CollisionLayers::all(),
            collision_mask: CollisionLayers::all(),
            has_material: false,
            positions: (0..mesh.vertex_count()).map(|i| mesh.position(i)).collect(),
            indices: mesh.indices().to_vec(),
            caches: vec![SubMeshCollisionCache::default(); sub_meshes.len()],
            sub_meshes,
            world_matrix: Mat4::identity(),
            world_bounds: None,
            sub_mesh_bounds: Vec::new(),
        };
        collidable.set_world_matrix(mesh.world_matrix());
        Ok(collidable)
    }

    /// Builder for the collision group
    pub fn with_group(mut self, group: CollisionLayers) -> Self {
        self.collision_group = group;
        self
    }

    /// Builder for the material flag
    pub fn with_material(mut self, has_material: bool) -> Self {
        self.has_material = has_material;
        self
    }

    /// World matrix used for collisions
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// World-space bounds, `None` for a mesh without vertices
    pub fn world_bounds(&self) -> Option<&AABB> {
        self.world_bounds.as_ref()
    }

    /// Submesh ranges
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    /// Move the mesh and refresh its world bounds
    pub fn set_world_matrix(&mut self, matrix: Mat4) {
        self.world_matrix = matrix;
        let world = |range: std::ops::Range<usize>| {
            AABB::from_points(
                self.positions[range]
                    .iter()
                    .map(|p| transform_coordinates(&matrix, p)),
            )
        };

        self.world_bounds = world(0..self.positions.len());
        self.sub_mesh_bounds = self
            .sub_meshes
            .iter()
            .map(|s| {
                let start = (s.vertex_start as usize).min(self.positions.len());
                let end = (start + s.vertex_count as usize).min(self.positions.len());
                world(start..end)
            })
            .collect();
    }

    /// Whether the mesh passes the coordinator's filter for `mask`
    pub fn accepts(&self, mask: CollisionLayers) -> bool {
        self.enabled && self.check_collisions && CollisionLayers::should_collide(mask, self.collision_group)
    }

    fn bounds_reachable(collider: &Collider, bounds: &AABB) -> bool {
        collider.can_do_collision(&bounds.center(), bounds.bounding_radius(), &bounds.min, &bounds.max)
    }

    /// Run the collider against every reachable submesh
    pub fn check_collision(&mut self, collider: &mut Collider, key: Option<MeshKey>) {
        let Some(bounds) = self.world_bounds.as_ref() else {
            return;
        };
        if !Self::bounds_reachable(collider, bounds) {
            return;
        }

        let radius = collider.radius();
        let scaling = Mat4::new_nonuniform_scaling(&Vec3::new(1.0 / radius.x, 1.0 / radius.y, 1.0 / radius.z));
        let transform = scaling * self.world_matrix;

        let several = self.sub_meshes.len() > 1;
        for (index, sub_mesh) in self.sub_meshes.iter().enumerate() {
            if several {
                match self.sub_mesh_bounds.get(index).copied().flatten() {
                    Some(bounds) if Self::bounds_reachable(collider, &bounds) => {}
                    _ => continue,
                }
            }

            let cache = &mut self.caches[index];
            if cache.transform != Some(transform) {
                let start = (sub_mesh.vertex_start as usize).min(self.positions.len());
                let end = (start + sub_mesh.vertex_count as usize).min(self.positions.len());
                cache.vertices = self.positions[start..end]
                    .iter()
                    .map(|p| transform_coordinates(&transform, p))
                    .collect();
                cache.planes.clear();
                cache.transform = Some(transform);
            }

            let index_start = sub_mesh.index_start as usize;
            collider.collide(
                &mut cache.planes,
                &cache.vertices,
                &self.indices,
                index_start,
                index_start + sub_mesh.index_count as usize,
                sub_mesh.vertex_start,
                self.has_material,
                key,
            );
        }
    }

    #[cfg(test)]
    fn cached_vertices(&self, sub_mesh: usize) -> &[Vec3] {
        &self.caches[sub_mesh].vertices
    }
}
