//! Convex planar polygon with provenance metadata

use crate::csg::plane::CsgPlane;
use crate::csg::vertex::Vertex;

/// Provenance of a polygon, used to regroup submeshes after an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolygonShared {
    /// Source mesh id, unique per `Csg::from_mesh` call
    pub mesh_id: u32,
    /// Submesh position inside the source mesh
    pub sub_mesh_id: u32,
    /// Material slot of the source submesh
    pub material_index: u32,
}

/// Convex, planar polygon of at least three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Counter-clockwise vertices
    pub vertices: Vec<Vertex>,
    /// Provenance
    pub shared: PolygonShared,
    /// Plane through the first three vertices
    pub plane: CsgPlane,
}

impl Polygon {
    /// Build a polygon; `None` for fewer than three vertices or collinear input
    pub fn new(vertices: Vec<Vertex>, shared: PolygonShared) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let plane = CsgPlane::from_points(&vertices[0].pos, &vertices[1].pos, &vertices[2].pos)?;
        Some(Self {
            vertices,
            shared,
            plane,
        })
    }

    /// Reverse winding and facing
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for vertex in &mut self.vertices {
            vertex.flip();
        }
        self.plane.flip();
    }
}
