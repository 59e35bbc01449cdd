//! The [`Csg`] solid and its boolean operations

use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::core::config::CsgSettings;
use crate::csg::mesh_builder::build_mesh_geometry;
use crate::csg::node::Node;
use crate::csg::polygon::{Polygon, PolygonShared};
use crate::csg::vertex::Vertex;
use crate::foundation::math::{transform_coordinates, transform_normal, Mat4, Transform};
use crate::geometry::{validate_source, GeometryError, MeshData, MeshSource};

/// Next id handed to a mesh converted by [`Csg::from_mesh`]
static CURRENT_CSG_MESH_ID: AtomicU32 = AtomicU32::new(0);

/// Solid described by world-space polygons, plus the transform of the mesh
/// it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Csg {
    polygons: Vec<Polygon>,
    /// World matrix of the source mesh; rebuilt meshes are expressed in its
    /// local space
    pub matrix: Mat4,
    /// Position, rotation and scale of the source mesh
    pub transform: Transform,
}

impl Default for Csg {
    fn default() -> Self {
        Self {
            polygons: Vec::new(),
            matrix: Mat4::identity(),
            transform: Transform::identity(),
        }
    }
}

impl Csg {
    /// Convert every triangle of every submesh into a world-space polygon.
    ///
    /// Collinear triangles are skipped. Each call consumes one mesh id so
    /// polygons of different meshes stay distinguishable.
    pub fn from_mesh<M: MeshSource + ?Sized>(mesh: &M) -> Result<Self, GeometryError> {
        validate_source(mesh)?;

        let matrix = mesh.world_matrix();
        let indices = mesh.indices();
        let mesh_id = CURRENT_CSG_MESH_ID.fetch_add(1, Ordering::Relaxed);
        let mut polygons = Vec::with_capacity(indices.len() / 3);
        let mut dropped = 0usize;

        for (sub_mesh_id, sub_mesh) in mesh.sub_mesh_ranges().iter().enumerate() {
            let shared = PolygonShared {
                mesh_id,
                sub_mesh_id: sub_mesh_id as u32,
                material_index: sub_mesh.material_index,
            };

            for triangle in indices[sub_mesh.index_range()].chunks_exact(3) {
                let vertices = triangle
                    .iter()
                    .map(|&index| {
                        let i = index as usize;
                        Vertex::new(
                            transform_coordinates(&matrix, &mesh.position(i)),
                            transform_normal(&matrix, &mesh.normal(i)),
                            mesh.uv(i),
                        )
                        .with_color(mesh.color(i))
                    })
                    .collect();

                match Polygon::new(vertices, shared) {
                    Some(polygon) => polygons.push(polygon),
                    None => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            debug!("csg mesh {mesh_id}: dropped {dropped} degenerate triangles");
        }

        Ok(Self {
            polygons,
            matrix,
            transform: mesh.transform(),
        })
    }

    /// Solid made of the given polygons with an identity transform
    pub fn from_polygons(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons,
            ..Default::default()
        }
    }

    /// Polygons of the solid
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Whether the solid has no polygons
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Take the transform attributes of `other`
    pub fn copy_transform_attributes(&mut self, other: &Csg) -> &mut Self {
        self.matrix = other.matrix;
        self.transform = other.transform;
        self
    }

    fn union_polygons(&self, other: &Csg) -> Vec<Polygon> {
        let mut a = Node::new(self.polygons.clone());
        let mut b = Node::new(other.polygons.clone());
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(b.all_polygons());
        a.all_polygons()
    }

    fn subtract_polygons(&self, other: &Csg) -> Vec<Polygon> {
        let mut a = Node::new(self.polygons.clone());
        let mut b = Node::new(other.polygons.clone());
        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(b.all_polygons());
        a.invert();
        a.all_polygons()
    }

    fn intersect_polygons(&self, other: &Csg) -> Vec<Polygon> {
        let mut a = Node::new(self.polygons.clone());
        let mut b = Node::new(other.polygons.clone());
        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(b.all_polygons());
        a.invert();
        a.all_polygons()
    }

    fn with_polygons(&self, polygons: Vec<Polygon>) -> Csg {
        let mut result = Csg::from_polygons(polygons);
        result.copy_transform_attributes(self);
        result
    }

    /// Space occupied by either solid
    pub fn union(&self, other: &Csg) -> Csg {
        let polygons = self.union_polygons(other);
        debug!("csg union: {} + {} -> {} polygons", self.polygons.len(), other.polygons.len(), polygons.len());
        self.with_polygons(polygons)
    }

    /// [`union`](Self::union), replacing this solid's polygons
    pub fn union_in_place(&mut self, other: &Csg) {
        self.polygons = self.union_polygons(other);
    }

    /// Space occupied by this solid but not `other`
    pub fn subtract(&self, other: &Csg) -> Csg {
        let polygons = self.subtract_polygons(other);
        debug!("csg subtract: {} - {} -> {} polygons", self.polygons.len(), other.polygons.len(), polygons.len());
        self.with_polygons(polygons)
    }

    /// [`subtract`](Self::subtract), replacing this solid's polygons
    pub fn subtract_in_place(&mut self, other: &Csg) {
        self.polygons = self.subtract_polygons(other);
    }

    /// Space occupied by both solids
    pub fn intersect(&self, other: &Csg) -> Csg {
        let polygons = self.intersect_polygons(other);
        debug!("csg intersect: {} & {} -> {} polygons", self.polygons.len(), other.polygons.len(), polygons.len());
        self.with_polygons(polygons)
    }

    /// [`intersect`](Self::intersect), replacing this solid's polygons
    pub fn intersect_in_place(&mut self, other: &Csg) {
        self.polygons = self.intersect_polygons(other);
    }

    /// Complement of the solid
    pub fn inverse(&self) -> Csg {
        let mut result = self.clone();
        result.inverse_in_place();
        result
    }

    /// [`inverse`](Self::inverse), in place
    pub fn inverse_in_place(&mut self) {
        for polygon in &mut self.polygons {
            polygon.flip();
        }
    }

    /// Rebuild flat mesh buffers in the source mesh's local space
    pub fn build_mesh_geometry(&self, name: &str, settings: &CsgSettings) -> MeshData {
        build_mesh_geometry(
            name,
            &self.polygons,
            &self.matrix,
            settings.keep_sub_meshes,
            settings.vertex_dedup,
        )
    }

    /// [`build_mesh_geometry`](Self::build_mesh_geometry), placed with the
    /// carried transform
    pub fn to_mesh(&self, name: &str, settings: &CsgSettings) -> MeshData {
        let mut mesh = self.build_mesh_geometry(name, settings);
        mesh.world_matrix = self.matrix;
        mesh.transform = self.transform;
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::geometry::SubMesh;
    use approx::assert_relative_eq;

    fn cube_at(x: f32) -> Csg {
        let mesh = MeshData::cuboid("cube", Vec3::new(1.0, 1.0, 1.0))
            .with_transform(Transform::from_position(Vec3::new(x, 0.0, 0.0)));
        Csg::from_mesh(&mesh).unwrap()
    }

    #[test]
    fn test_from_mesh_assigns_fresh_mesh_ids() {
        let a = cube_at(0.0);
        let b = cube_at(0.0);

        assert_eq!(a.polygons().len(), 12);
        assert_ne!(a.polygons()[0].shared.mesh_id, b.polygons()[0].shared.mesh_id);
    }

    #[test]
    fn test_from_mesh_moves_to_world_space() {
        let csg = cube_at(3.0);
        for polygon in csg.polygons() {
            for vertex in &polygon.vertices {
                assert!(vertex.pos.x >= 2.5 - 1e-6 && vertex.pos.x <= 3.5 + 1e-6);
            }
        }
        assert_relative_eq!(csg.transform.position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_from_mesh_drops_degenerate_triangles() {
        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.indices.extend_from_slice(&[0, 0, 1]);

        let csg = Csg::from_mesh(&mesh).unwrap();
        assert_eq!(csg.polygons().len(), 2);
    }

    #[test]
    fn test_from_mesh_tags_sub_meshes() {
        let mut mesh = MeshData::cuboid("cube", Vec3::new(1.0, 1.0, 1.0));
        mesh.sub_meshes = vec![SubMesh::new(0, 0, 24, 0, 18), SubMesh::new(3, 0, 24, 18, 18)];

        let csg = Csg::from_mesh(&mesh).unwrap();
        let materials: Vec<u32> = csg.polygons().iter().map(|p| p.shared.material_index).collect();
        assert_eq!(&materials[..6], &[0; 6]);
        assert_eq!(&materials[6..], &[3; 6]);
        assert_eq!(csg.polygons()[11].shared.sub_mesh_id, 1);
    }

    #[test]
    fn test_from_mesh_carries_vertex_colors() {
        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.colors = Some([0.2, 0.4, 0.6, 1.0].repeat(4));

        let csg = Csg::from_mesh(&mesh).unwrap();
        let color = csg.polygons()[0].vertices[0].color.unwrap();
        assert_relative_eq!(color, crate::foundation::math::Vec4::new(0.2, 0.4, 0.6, 1.0));

        let rebuilt = csg.to_mesh("ground-rebuilt", &CsgSettings::default());
        assert_eq!(rebuilt.colors.as_ref().map(Vec::len), Some(16));
    }

    #[test]
    fn test_from_mesh_rejects_malformed_buffers() {
        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.indices[0] = 99;
        assert!(matches!(Csg::from_mesh(&mesh), Err(GeometryError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_in_place_matches_pure() {
        let a = cube_at(0.0);
        let b = cube_at(0.5);

        let mut in_place = a.clone();
        in_place.union_in_place(&b);
        assert_eq!(in_place.polygons(), a.union(&b).polygons());

        let mut in_place = a.clone();
        in_place.subtract_in_place(&b);
        assert_eq!(in_place.polygons(), a.subtract(&b).polygons());

        let mut in_place = a.clone();
        in_place.intersect_in_place(&b);
        assert_eq!(in_place.polygons(), a.intersect(&b).polygons());
    }

    #[test]
    fn test_result_carries_receiver_transform() {
        let a = cube_at(2.0);
        let b = cube_at(0.0);
        let result = a.union(&b);

        assert_eq!(result.matrix, a.matrix);
        assert_eq!(result.transform, a.transform);
    }

    #[test]
    fn test_inverse_flips_every_polygon() {
        let a = cube_at(0.0);
        let inverse = a.inverse();

        for (original, flipped) in a.polygons().iter().zip(inverse.polygons()) {
            assert_relative_eq!(original.plane.normal, -flipped.plane.normal);
        }
        assert_eq!(inverse.inverse().polygons(), a.polygons());
    }

    #[test]
    fn test_empty_operands_do_not_panic() {
        let empty = Csg::default();
        let a = cube_at(0.0);

        assert!(empty.union(&empty).is_empty());
        assert!(empty.intersect(&empty).is_empty());
        assert_eq!(empty.union(&a).polygons().len(), a.polygons().len());
        assert_eq!(a.subtract(&empty).polygons().len(), a.polygons().len());
    }
}
