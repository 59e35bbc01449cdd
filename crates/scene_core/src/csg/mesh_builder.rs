//! Polygon list to flat mesh buffers
//!
//! Polygons are fan-triangulated, moved back into the source mesh's local
//! space and welded through a position-keyed dictionary. Two corners merge
//! only when their normal, UV and color match as well.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::csg::polygon::Polygon;
use crate::foundation::math::{
    almost_equal, invert_or_identity, transform_coordinates, transform_normal, Mat4, Vec2, Vec3, Vec4,
};
use crate::geometry::{MeshData, SubMesh};

/// Vertex welding policy for rebuilt meshes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum VertexDedup {
    /// Weld identical positions whose attributes agree within float noise
    #[default]
    Exact,
    /// Weld positions on a grid of `precision`, attributes within `precision`
    Quantized {
        /// Grid cell size and attribute tolerance
        precision: f32,
    },
}

impl VertexDedup {
    fn key(self, p: &Vec3) -> String {
        match self {
            // `+ 0.0` folds -0.0 into 0.0
            Self::Exact => format!("{},{},{}", p.x + 0.0, p.y + 0.0, p.z + 0.0),
            Self::Quantized { precision } => {
                let q = |v: f32| (v / precision).round() as i64;
                format!("{},{},{}", q(p.x), q(p.y), q(p.z))
            }
        }
    }

    fn same(self, a: f32, b: f32) -> bool {
        match self {
            Self::Exact => almost_equal(a, b),
            Self::Quantized { precision } => (a - b).abs() <= precision,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SubMeshSpan {
    index_start: usize,
    index_end: usize,
    material_index: u32,
}

#[derive(Default)]
struct Buffers {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    colors: Vec<f32>,
    indices: Vec<u32>,
}

/// Attributes compared before two corners at one position are welded
struct Corner {
    normal: Vec3,
    uv: Vec2,
    color: Vec4,
}

impl Buffers {
    fn matches(&self, index: usize, corner: &Corner, dedup: VertexDedup) -> bool {
        let same = |stored: &[f32], wanted: &[f32]| {
            stored.iter().zip(wanted).all(|(&a, &b)| dedup.same(a, b))
        };
        same(&self.normals[index * 3..index * 3 + 3], corner.normal.as_slice())
            && same(&self.uvs[index * 2..index * 2 + 2], corner.uv.as_slice())
            && same(&self.colors[index * 4..index * 4 + 4], corner.color.as_slice())
    }

    fn push(&mut self, position: &Vec3, corner: &Corner) -> u32 {
        self.positions.extend_from_slice(position.as_slice());
        self.normals.extend_from_slice(corner.normal.as_slice());
        self.uvs.extend_from_slice(corner.uv.as_slice());
        self.colors.extend_from_slice(corner.color.as_slice());
        (self.positions.len() / 3 - 1) as u32
    }
}

/// Rebuild mesh buffers from world-space polygons.
///
/// `matrix` is the world matrix the polygons were produced with; its inverse
/// brings positions and normals back to local space. With
/// `keep_sub_meshes`, triangles are grouped per `(mesh_id, sub_mesh_id)` and
/// material indices are offset per source mesh so they never collide.
pub fn build_mesh_geometry(
    name: &str,
    polygons: &[Polygon],
    matrix: &Mat4,
    keep_sub_meshes: bool,
    dedup: VertexDedup,
) -> MeshData {
    let inverse = invert_or_identity(matrix);
    let has_uvs = polygons.iter().flat_map(|p| &p.vertices).any(|v| v.uv.is_some());
    let has_colors = polygons.iter().flat_map(|p| &p.vertices).any(|v| v.color.is_some());

    let mut ordered: Vec<&Polygon> = polygons.iter().collect();
    if keep_sub_meshes {
        ordered.sort_by_key(|p| (p.shared.mesh_id, p.shared.sub_mesh_id));
    }

    let mut buffers = Buffers::default();
    let mut vertex_dict: HashMap<String, u32> = HashMap::new();
    let mut spans: BTreeMap<u32, BTreeMap<u32, SubMeshSpan>> = BTreeMap::new();

    for polygon in ordered {
        let span = spans
            .entry(polygon.shared.mesh_id)
            .or_default()
            .entry(polygon.shared.sub_mesh_id)
            .or_insert(SubMeshSpan {
                index_start: usize::MAX,
                index_end: 0,
                material_index: polygon.shared.material_index,
            });

        for j in 2..polygon.vertices.len() {
            for k in [0, j - 1, j] {
                let vertex = &polygon.vertices[k];
                let position = transform_coordinates(&inverse, &vertex.pos);
                let corner = Corner {
                    normal: transform_normal(&inverse, &vertex.normal),
                    uv: vertex.uv.unwrap_or_else(Vec2::zeros),
                    color: vertex.color.unwrap_or_else(|| Vec4::repeat(1.0)),
                };

                let key = dedup.key(&position);
                let index = match vertex_dict.get(&key) {
                    Some(&existing) if buffers.matches(existing as usize, &corner, dedup) => existing,
                    _ => {
                        let created = buffers.push(&position, &corner);
                        vertex_dict.insert(key, created);
                        created
                    }
                };

                let current = buffers.indices.len();
                buffers.indices.push(index);
                span.index_start = span.index_start.min(current);
                span.index_end = span.index_end.max(current);
            }
        }
    }

    let mut mesh = MeshData::new(name);
    if keep_sub_meshes {
        mesh.sub_meshes = collect_sub_meshes(&spans, &buffers.indices);
    }
    mesh.positions = buffers.positions;
    mesh.normals = buffers.normals;
    mesh.uvs = has_uvs.then_some(buffers.uvs);
    mesh.colors = has_colors.then_some(buffers.colors);
    mesh.indices = buffers.indices;
    mesh
}

fn collect_sub_meshes(
    spans: &BTreeMap<u32, BTreeMap<u32, SubMeshSpan>>,
    indices: &[u32],
) -> Vec<SubMesh> {
    let mut sub_meshes = Vec::new();
    let mut material_offset = 0;

    for per_mesh in spans.values() {
        let mut highest_material = None;
        for span in per_mesh.values() {
            if span.index_start > span.index_end {
                continue;
            }
            let range = &indices[span.index_start..=span.index_end];
            let vertex_start = range.iter().copied().min().unwrap_or(0);
            let vertex_end = range.iter().copied().max().unwrap_or(0);

            sub_meshes.push(SubMesh::new(
                span.material_index + material_offset,
                vertex_start,
                vertex_end - vertex_start + 1,
                span.index_start as u32,
                (span.index_end - span.index_start + 1) as u32,
            ));
            highest_material = highest_material.max(Some(span.material_index));
        }
        material_offset += highest_material.map_or(0, |m| m + 1);
    }
    sub_meshes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::polygon::PolygonShared;
    use crate::csg::vertex::Vertex;
    use crate::foundation::math::Transform;
    use crate::geometry::MeshSource;
    use approx::assert_relative_eq;

    fn quad(shared: PolygonShared, offset: f32) -> Polygon {
        let n = Vec3::z();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        Polygon::new(
            corners
                .iter()
                .map(|&(x, y)| Vertex::new(Vec3::new(x + offset, y, 0.0), n, Some(Vec2::new(x, y))))
                .collect(),
            shared,
        )
        .unwrap()
    }

    #[test]
    fn test_fan_triangulation_and_welding() {
        let polygons = [quad(PolygonShared::default(), 0.0)];
        let mesh = build_mesh_geometry("quad", &polygons, &Mat4::identity(), false, VertexDedup::Exact);

        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.sub_meshes.is_empty());
        assert!(mesh.uvs.is_some());
    }

    #[test]
    fn test_differing_normals_are_not_welded() {
        let a = quad(PolygonShared::default(), 0.0);
        let mut b = quad(PolygonShared::default(), 0.0);
        b.flip();

        let mesh = build_mesh_geometry("pair", &[a, b], &Mat4::identity(), false, VertexDedup::Exact);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn test_differing_colors_are_not_welded() {
        let tint = |polygon: &mut Polygon, color: Vec4| {
            for vertex in &mut polygon.vertices {
                vertex.color = Some(color);
            }
        };
        let mut a = quad(PolygonShared::default(), 0.0);
        let mut b = quad(PolygonShared::default(), 0.0);
        tint(&mut a, Vec4::new(1.0, 0.0, 0.0, 1.0));
        tint(&mut b, Vec4::new(0.0, 1.0, 0.0, 1.0));

        let identity = Mat4::identity();
        let mesh = build_mesh_geometry("tinted", &[a.clone(), b], &identity, false, VertexDedup::Exact);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.colors.as_ref().map(Vec::len), Some(32));
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.color(4), Some(Vec4::new(0.0, 1.0, 0.0, 1.0)));

        let same = build_mesh_geometry("tinted", &[a.clone(), a], &identity, false, VertexDedup::Exact);
        assert_eq!(same.vertex_count(), 4);
    }

    #[test]
    fn test_exact_dedup_tolerates_attribute_noise() {
        let a = quad(PolygonShared::default(), 0.0);
        let mut b = quad(PolygonShared::default(), 0.0);
        for vertex in &mut b.vertices {
            vertex.normal = Vec3::new(1e-7, 0.0, 1.0);
            vertex.uv = vertex.uv.map(|uv| uv.add_scalar(1e-7));
        }

        let mesh = build_mesh_geometry("noisy", &[a, b], &Mat4::identity(), false, VertexDedup::Exact);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 0, 1, 2, 0, 2, 3]);
        assert!(mesh.colors.is_none());
    }

    #[test]
    fn test_quantized_dedup_absorbs_noise() {
        let a = quad(PolygonShared::default(), 0.0);
        let b = quad(PolygonShared::default(), 1e-7);

        let exact = build_mesh_geometry(
            "noisy",
            &[a.clone(), b.clone()],
            &Mat4::identity(),
            false,
            VertexDedup::Exact,
        );
        let welded = build_mesh_geometry(
            "noisy",
            &[a, b],
            &Mat4::identity(),
            false,
            VertexDedup::Quantized { precision: 1e-4 },
        );

        assert_eq!(exact.vertex_count(), 8);
        assert_eq!(welded.vertex_count(), 4);
    }

    #[test]
    fn test_inverse_matrix_restores_local_space() {
        let world = Transform::from_position(Vec3::new(10.0, 0.0, 0.0)).to_matrix();
        let polygon = quad(PolygonShared::default(), 10.0);

        let mesh = build_mesh_geometry("moved", &[polygon], &world, false, VertexDedup::Exact);
        assert_relative_eq!(mesh.position(0), Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(mesh.normal(0), Vec3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_sub_meshes_regrouped_with_material_offsets() {
        let shared = |mesh_id, sub_mesh_id, material_index| PolygonShared {
            mesh_id,
            sub_mesh_id,
            material_index,
        };
        let polygons = vec![
            quad(shared(8, 1, 1), 3.0),
            quad(shared(7, 0, 0), 0.0),
            quad(shared(8, 0, 0), 2.0),
            quad(shared(7, 1, 2), 1.0),
        ];

        let mesh = build_mesh_geometry("merged", &polygons, &Mat4::identity(), true, VertexDedup::Exact);
        let materials: Vec<u32> = mesh.sub_meshes.iter().map(|s| s.material_index).collect();
        let starts: Vec<u32> = mesh.sub_meshes.iter().map(|s| s.index_start).collect();

        assert_eq!(materials, vec![0, 2, 3, 4]);
        assert_eq!(starts, vec![0, 6, 12, 18]);
        assert!(mesh.sub_meshes.iter().all(|s| s.index_count == 6));
        assert!(mesh.validate().is_ok());
    }
}
