//! Flat mesh buffers and the geometry contract consumed by the CSG and
//! collision engines.
//!
//! Positions and normals are packed `xyz` triples, UVs packed `uv` pairs,
//! colors packed `rgba` quadruples, and indices describe counter-clockwise (right-handed) triangles.

use thiserror::Error;

use crate::foundation::math::{Mat4, Transform, Vec2, Vec3, Vec4};
use crate::geometry::bounds::AABB;

/// Index/vertex range of a mesh drawn with a single material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubMesh {
    /// Material slot of the owning mesh
    pub material_index: u32,
    /// First vertex used by the range
    pub vertex_start: u32,
    /// Number of vertices used by the range
    pub vertex_count: u32,
    /// First index of the range
    pub index_start: u32,
    /// Number of indices in the range (multiple of three)
    pub index_count: u32,
}

impl SubMesh {
    /// Create a submesh range
    pub fn new(
        material_index: u32,
        vertex_start: u32,
        vertex_count: u32,
        index_start: u32,
        index_count: u32,
    ) -> Self {
        Self {
            material_index,
            vertex_start,
            vertex_count,
            index_start,
            index_count,
        }
    }

    /// Index range as a slice range
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.index_start as usize;
        start..start + self.index_count as usize
    }
}

/// Errors raised when mesh buffers break their layout contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Position buffer length is not a multiple of three
    #[error("position buffer length {0} is not a multiple of 3")]
    PositionLength(usize),

    /// Normal buffer does not match the vertex count
    #[error("expected {expected} normal floats, found {actual}")]
    NormalCountMismatch {
        /// Expected float count
        expected: usize,
        /// Actual float count
        actual: usize,
    },

    /// UV buffer does not match the vertex count
    #[error("expected {expected} uv floats, found {actual}")]
    UvCountMismatch {
        /// Expected float count
        expected: usize,
        /// Actual float count
        actual: usize,
    },

    /// Color buffer does not match the vertex count
    #[error("expected {expected} color floats, found {actual}")]
    ColorCountMismatch {
        /// Expected float count
        expected: usize,
        /// Actual float count
        actual: usize,
    },

    /// Index buffer length is not a multiple of three
    #[error("index buffer length {0} is not a multiple of 3")]
    IndexCount(usize),

    /// An index refers past the end of the vertex buffers
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index value
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// A submesh range reaches past the end of the index buffer
    #[error("submesh {sub_mesh} range {start}..{end} exceeds {len} indices")]
    SubMeshOutOfRange {
        /// Submesh position in the submesh list
        sub_mesh: usize,
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Index buffer length
        len: usize,
    },
}

/// Geometry a mesh exposes to the CSG and collision engines
pub trait MeshSource {
    /// Current world transform of the mesh
    fn world_matrix(&self) -> Mat4;

    /// Decomposed position/rotation/scale of the mesh
    fn transform(&self) -> Transform {
        Transform::from_matrix(&self.world_matrix())
    }

    /// Packed `xyz` positions in local space
    fn positions(&self) -> &[f32];

    /// Packed `xyz` normals in local space
    fn normals(&self) -> &[f32];

    /// Packed `uv` coordinates, if the mesh carries any
    fn uvs(&self) -> Option<&[f32]>;

    /// Packed `rgba` vertex colors, if the mesh carries any
    fn colors(&self) -> Option<&[f32]> {
        None
    }

    /// Triangle indices
    fn indices(&self) -> &[u32];

    /// Submesh ranges; empty means one range over the whole index buffer
    fn sub_meshes(&self) -> &[SubMesh];

    /// Number of vertices
    fn vertex_count(&self) -> usize {
        self.positions().len() / 3
    }

    /// Submesh ranges with the implicit whole-mesh range filled in
    fn sub_mesh_ranges(&self) -> Vec<SubMesh> {
        if self.sub_meshes().is_empty() {
            vec![SubMesh::new(
                0,
                0,
                self.vertex_count() as u32,
                0,
                self.indices().len() as u32,
            )]
        } else {
            self.sub_meshes().to_vec()
        }
    }

    /// Local position of vertex `i`
    fn position(&self, i: usize) -> Vec3 {
        let p = self.positions();
        Vec3::new(p[i * 3], p[i * 3 + 1], p[i * 3 + 2])
    }

    /// Local normal of vertex `i`, zero when the mesh has no normals
    fn normal(&self, i: usize) -> Vec3 {
        let n = self.normals();
        if n.len() < (i + 1) * 3 {
            return Vec3::zeros();
        }
        Vec3::new(n[i * 3], n[i * 3 + 1], n[i * 3 + 2])
    }

    /// UV of vertex `i`, if the mesh carries UVs
    fn uv(&self, i: usize) -> Option<Vec2> {
        self.uvs().map(|uv| Vec2::new(uv[i * 2], uv[i * 2 + 1]))
    }

    /// Color of vertex `i`, if the mesh carries colors
    fn color(&self, i: usize) -> Option<Vec4> {
        self.colors()
            .map(|c| Vec4::new(c[i * 4], c[i * 4 + 1], c[i * 4 + 2], c[i * 4 + 3]))
    }
}

/// Check the buffer layout of any mesh source
pub fn validate_source<M: MeshSource + ?Sized>(mesh: &M) -> Result<(), GeometryError> {
    let positions = mesh.positions();
    if positions.len() % 3 != 0 {
        return Err(GeometryError::PositionLength(positions.len()));
    }
    let vertex_count = positions.len() / 3;

    let normals = mesh.normals();
    if !normals.is_empty() && normals.len() != positions.len() {
        return Err(GeometryError::NormalCountMismatch {
            expected: positions.len(),
            actual: normals.len(),
        });
    }

    if let Some(uvs) = mesh.uvs() {
        if uvs.len() != vertex_count * 2 {
            return Err(GeometryError::UvCountMismatch {
                expected: vertex_count * 2,
                actual: uvs.len(),
            });
        }
    }

    if let Some(colors) = mesh.colors() {
        if colors.len() != vertex_count * 4 {
            return Err(GeometryError::ColorCountMismatch {
                expected: vertex_count * 4,
                actual: colors.len(),
            });
        }
    }

    let indices = mesh.indices();
    if indices.len() % 3 != 0 {
        return Err(GeometryError::IndexCount(indices.len()));
    }
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(GeometryError::IndexOutOfRange { index, vertex_count });
    }

    for (sub_mesh, range) in mesh.sub_meshes().iter().enumerate() {
        let span = range.index_range();
        if span.end > indices.len() {
            return Err(GeometryError::SubMeshOutOfRange {
                sub_mesh,
                start: span.start,
                end: span.end,
                len: indices.len(),
            });
        }
    }

    Ok(())
}

/// Owned mesh buffers with a world transform
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Mesh name
    pub name: String,
    /// Packed `xyz` positions
    pub positions: Vec<f32>,
    /// Packed `xyz` normals
    pub normals: Vec<f32>,
    /// Packed `uv` coordinates
    pub uvs: Option<Vec<f32>>,
    /// Packed `rgba` vertex colors
    pub colors: Option<Vec<f32>>,
    /// Triangle indices
    pub indices: Vec<u32>,
    /// Submesh ranges
    pub sub_meshes: Vec<SubMesh>,
    /// Decomposed transform
    pub transform: Transform,
    /// World matrix
    pub world_matrix: Mat4,
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            name: String::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: None,
            colors: None,
            indices: Vec::new(),
            sub_meshes: Vec::new(),
            transform: Transform::identity(),
            world_matrix: Mat4::identity(),
        }
    }
}

impl MeshData {
    /// Create an empty mesh
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Place the mesh with a transform, keeping the world matrix in sync
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.set_transform(transform);
        self
    }

    /// Set the transform and its world matrix
    pub fn set_transform(&mut self, transform: Transform) {
        self.world_matrix = transform.to_matrix();
        self.transform = transform;
    }

    /// Set the world matrix and its decomposition
    pub fn set_world_matrix(&mut self, matrix: Mat4) {
        self.transform = Transform::from_matrix(&matrix);
        self.world_matrix = matrix;
    }

    /// Check the buffer layout
    pub fn validate(&self) -> Result<(), GeometryError> {
        validate_source(self)
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Local-space bounds, `None` for an empty mesh
    pub fn bounding_box(&self) -> Option<AABB> {
        AABB::from_points((0..self.vertex_count()).map(|i| self.position(i)))
    }

    /// Axis-aligned box of `size` centered on the origin.
    ///
    /// 24 vertices so every face carries its own normal and UVs.
    pub fn cuboid(name: impl Into<String>, size: Vec3) -> Self {
        let half = size * 0.5;
        let x = Vec3::x();
        let y = Vec3::y();
        let z = Vec3::z();
        // (normal, u, v) with u x v == normal
        let faces = [(x, y, z), (-x, z, y), (y, z, x), (-y, x, z), (z, x, y), (-z, y, x)];

        let mut mesh = Self::new(name);
        for (normal, u, v) in faces {
            let center = normal.component_mul(&half);
            let hu = u.abs().dot(&half);
            let hv = v.abs().dot(&half);
            mesh.push_quad(center, normal, u * hu, v * hv);
        }
        mesh
    }

    /// Square in the XZ plane at `y = 0`, facing +Y
    pub fn plane(name: impl Into<String>, half_extent: f32) -> Self {
        let mut mesh = Self::new(name);
        mesh.push_quad(
            Vec3::zeros(),
            Vec3::y(),
            Vec3::z() * half_extent,
            Vec3::x() * half_extent,
        );
        mesh
    }

    fn push_quad(&mut self, center: Vec3, normal: Vec3, u: Vec3, v: Vec3) {
        let base = self.vertex_count() as u32;
        let corners = [
            (center - u - v, Vec2::new(0.0, 0.0)),
            (center + u - v, Vec2::new(1.0, 0.0)),
            (center + u + v, Vec2::new(1.0, 1.0)),
            (center - u + v, Vec2::new(0.0, 1.0)),
        ];

        let uvs = self.uvs.get_or_insert_with(Vec::new);
        for (p, uv) in corners {
            self.positions.extend_from_slice(&[p.x, p.y, p.z]);
            self.normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
            uvs.extend_from_slice(&[uv.x, uv.y]);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

impl MeshSource for MeshData {
    fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn positions(&self) -> &[f32] {
        &self.positions
    }

    fn normals(&self) -> &[f32] {
        &self.normals
    }

    fn uvs(&self) -> Option<&[f32]> {
        self.uvs.as_deref()
    }

    fn colors(&self) -> Option<&[f32]> {
        self.colors.as_deref()
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_layout() {
        let cube = MeshData::cuboid("cube", Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.validate().is_ok());

        let bounds = cube.bounding_box().unwrap();
        assert_relative_eq!(bounds.min, Vec3::new(-0.5, -1.0, -1.5));
        assert_relative_eq!(bounds.max, Vec3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn test_cuboid_winding_faces_outward() {
        let cube = MeshData::cuboid("cube", Vec3::new(1.0, 1.0, 1.0));

        for tri in cube.indices.chunks(3) {
            let a = cube.position(tri[0] as usize);
            let b = cube.position(tri[1] as usize);
            let c = cube.position(tri[2] as usize);
            let face_normal = (b - a).cross(&(c - a)).normalize();

            assert_relative_eq!(face_normal, cube.normal(tri[0] as usize), epsilon = 1e-6);
            assert!(face_normal.dot(&((a + b + c) / 3.0)) > 0.0);
        }
    }

    #[test]
    fn test_validate_rejects_bad_buffers() {
        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.indices.push(7);
        assert_eq!(mesh.validate(), Err(GeometryError::IndexCount(7)));

        mesh.indices.extend_from_slice(&[0, 1]);
        assert_eq!(
            mesh.validate(),
            Err(GeometryError::IndexOutOfRange { index: 7, vertex_count: 4 })
        );

        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.sub_meshes.push(SubMesh::new(0, 0, 4, 3, 6));
        assert!(matches!(
            mesh.validate(),
            Err(GeometryError::SubMeshOutOfRange { sub_mesh: 0, .. })
        ));

        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.normals.pop();
        assert!(matches!(mesh.validate(), Err(GeometryError::NormalCountMismatch { .. })));

        let mut mesh = MeshData::plane("ground", 1.0);
        mesh.colors = Some(vec![1.0; 12]);
        assert_eq!(
            mesh.validate(),
            Err(GeometryError::ColorCountMismatch { expected: 16, actual: 12 })
        );
        mesh.colors = Some(vec![1.0; 16]);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.color(3), Some(Vec4::new(1.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_implicit_sub_mesh_covers_everything() {
        let mesh = MeshData::plane("ground", 2.0);
        let ranges = mesh.sub_mesh_ranges();

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].index_range(), 0..6);
        assert_eq!(ranges[0].vertex_count, 4);
    }
}
