//! Swept ellipsoid against triangle soups
//!
//! The collider works in ellipsoid space: world coordinates divided
//! component-wise by the ellipsoid radius, so the moving volume is a unit
//! sphere. Each step records the nearest contact over all tested triangles
//! and [`Collider::get_response`] turns it into a slide along the contact
//! plane.

use crate::foundation::math::Vec3;
use crate::physics::collision::collidable::MeshKey;
use crate::physics::collision::primitives::{
    check_point_in_triangle, get_lowest_root, intersect_box_aa_sphere, signed_distance_to_plane, sweep_plane,
    TrianglePlaneCache,
};
use crate::physics::collision_layers::CollisionLayers;

/// Moving ellipsoid and the nearest contact found during the current step
#[derive(Debug, Clone)]
pub struct Collider {
    radius: Vec3,
    /// Groups this collider tests against
    pub collision_mask: CollisionLayers,

    pub(crate) retry: u32,
    velocity: Vec3,
    normalized_velocity: Vec3,
    base_point: Vec3,
    base_point_world: Vec3,
    velocity_world_length: f32,
    epsilon: f32,

    collision_found: bool,
    nearest_distance: f32,
    intersection_point: Vec3,
    collided_mesh: Option<MeshKey>,
}

impl Default for Collider {
    fn default() -> Self {
        Self::new(Vec3::new(1.0, 1.0, 1.0))
    }
}

impl Collider {
    /// Collider for an ellipsoid with the given per-axis radius
    pub fn new(radius: Vec3) -> Self {
        Self {
            radius,
            collision_mask: CollisionLayers::all(),
            retry: 0,
            velocity: Vec3::zeros(),
            normalized_velocity: Vec3::zeros(),
            base_point: Vec3::zeros(),
            base_point_world: Vec3::zeros(),
            velocity_world_length: 0.0,
            epsilon: 0.0,
            collision_found: false,
            nearest_distance: f32::INFINITY,
            intersection_point: Vec3::zeros(),
            collided_mesh: None,
        }
    }

    /// Ellipsoid radius per axis
    pub fn radius(&self) -> Vec3 {
        self.radius
    }

    /// Change the ellipsoid radius
    pub fn set_radius(&mut self, radius: Vec3) {
        self.radius = radius;
    }

    /// Largest radius component
    pub fn max_radius(&self) -> f32 {
        self.radius.x.max(self.radius.y).max(self.radius.z)
    }

    /// Whether the current step found a contact
    pub fn collision_found(&self) -> bool {
        self.collision_found
    }

    /// Travel distance in ellipsoid space before the nearest contact
    pub fn nearest_distance(&self) -> Option<f32> {
        self.collision_found.then_some(self.nearest_distance)
    }

    /// Ellipsoid-space contact point of the nearest contact
    pub fn intersection_point(&self) -> Option<Vec3> {
        self.collision_found.then_some(self.intersection_point)
    }

    /// Mesh hit by the nearest contact
    pub fn collided_mesh(&self) -> Option<MeshKey> {
        self.collided_mesh
    }

    /// Retries used by the last coordinator run
    pub fn retry_count(&self) -> u32 {
        self.retry
    }

    /// Fraction of the step's velocity travelled before the nearest contact
    pub fn time_of_impact(&self) -> Option<f32> {
        let speed = self.velocity.magnitude();
        if !self.collision_found || speed <= 0.0 {
            return None;
        }
        Some(self.nearest_distance / speed)
    }

    /// Start a step from `source` moving by `dir`, both in ellipsoid space.
    ///
    /// `epsilon` is the distance the response keeps between the sphere and
    /// the contact plane.
    pub fn initialize(&mut self, source: Vec3, dir: Vec3, epsilon: f32) {
        self.velocity = dir;
        self.normalized_velocity = dir.try_normalize(0.0).unwrap_or_else(Vec3::zeros);
        self.base_point = source;
        self.base_point_world = source.component_mul(&self.radius);
        self.velocity_world_length = dir.component_mul(&self.radius).magnitude();
        self.epsilon = epsilon;
        self.collision_found = false;
        self.nearest_distance = f32::INFINITY;
    }

    pub(crate) fn reset_for_query(&mut self) {
        self.retry = 0;
        self.collided_mesh = None;
        self.collision_found = false;
        self.nearest_distance = f32::INFINITY;
    }

    /// Broad phase: whether the world-space sweep can reach a bounding
    /// sphere and box
    pub fn can_do_collision(&self, sphere_center: &Vec3, sphere_radius: f32, min: &Vec3, max: &Vec3) -> bool {
        let reach = self.velocity_world_length + self.max_radius();
        if (self.base_point_world - sphere_center).magnitude() > reach + sphere_radius {
            return false;
        }
        intersect_box_aa_sphere(min, max, &self.base_point_world, reach)
    }

    /// Sweep the unit sphere against one counter-clockwise triangle.
    ///
    /// Back faces are skipped unless `has_material` is set. A contact
    /// nearer than the current one replaces it.
    pub fn test_triangle(
        &mut self,
        face_index: usize,
        planes: &mut TrianglePlaneCache,
        p1: &Vec3,
        p2: &Vec3,
        p3: &Vec3,
        has_material: bool,
        host_mesh: Option<MeshKey>,
    ) {
        let plane = planes.get_or_compute(face_index, p1, p2, p3);
        if plane.is_degenerate() {
            return;
        }
        if !has_material && !plane.is_front_facing_to(&self.normalized_velocity, 0.0) {
            return;
        }

        let signed_distance = plane.signed_distance_to(&self.base_point);
        let normal_dot_velocity = plane.normal.dot(&self.velocity);
        let Some(sweep) = sweep_plane(signed_distance, normal_dot_velocity) else {
            return;
        };

        let mut contact = None;
        let mut t = 1.0;

        if !sweep.embedded {
            let plane_point = self.base_point - plane.normal + self.velocity * sweep.t0;
            if check_point_in_triangle(&plane_point, p1, p2, p3, &plane.normal) {
                t = sweep.t0;
                contact = Some(plane_point);
            }
        }

        if contact.is_none() {
            let velocity_squared = self.velocity.magnitude_squared();

            for vertex in [p1, p2, p3] {
                let to_vertex = self.base_point - vertex;
                let b = 2.0 * self.velocity.dot(&to_vertex);
                let c = to_vertex.magnitude_squared() - 1.0;
                if let Some(root) = get_lowest_root(velocity_squared, b, c, t) {
                    t = root;
                    contact = Some(*vertex);
                }
            }

            for (start, end) in [(p1, p2), (p2, p3), (p3, p1)] {
                let edge = end - start;
                let base_to_vertex = start - self.base_point;
                let edge_squared = edge.magnitude_squared();
                let edge_dot_velocity = edge.dot(&self.velocity);
                let edge_dot_base_to_vertex = edge.dot(&base_to_vertex);

                let a = edge_squared * -velocity_squared + edge_dot_velocity * edge_dot_velocity;
                let b = edge_squared * (2.0 * self.velocity.dot(&base_to_vertex))
                    - 2.0 * edge_dot_velocity * edge_dot_base_to_vertex;
                let c = edge_squared * (1.0 - base_to_vertex.magnitude_squared())
                    + edge_dot_base_to_vertex * edge_dot_base_to_vertex;

                if let Some(root) = get_lowest_root(a, b, c, t) {
                    let f = (edge_dot_velocity * root - edge_dot_base_to_vertex) / edge_squared;
                    if (0.0..=1.0).contains(&f) {
                        t = root;
                        contact = Some(start + edge * f);
                    }
                }
            }
        }

        let Some(point) = contact else {
            return;
        };
        let distance = t * self.velocity.magnitude();
        if !self.collision_found || distance < self.nearest_distance {
            self.intersection_point = point;
            self.nearest_distance = distance;
            self.collision_found = true;
            self.collided_mesh = host_mesh;
        }
    }

    /// Test every triangle of `indices[index_start..index_end]`.
    ///
    /// `points` holds the submesh's vertices starting at vertex `decal`.
    pub fn collide(
        &mut self,
        planes: &mut TrianglePlaneCache,
        points: &[Vec3],
        indices: &[u32],
        index_start: usize,
        index_end: usize,
        decal: u32,
        has_material: bool,
        host_mesh: Option<MeshKey>,
    ) {
        let end = index_end.min(indices.len());
        let mut i = index_start;
        while i + 3 <= end {
            let corner = |k: usize| points.get(indices[i + k].checked_sub(decal)? as usize);
            if let (Some(p1), Some(p2), Some(p3)) = (corner(0), corner(1), corner(2)) {
                self.test_triangle((i - index_start) / 3, planes, p1, p2, p3, has_material, host_mesh);
            }
            i += 3;
        }
    }

    /// Slide `position` and `velocity` along the nearest contact plane.
    ///
    /// The sphere stops at the contact, is pushed off the plane by epsilon,
    /// and the remaining movement is projected onto the plane.
    pub fn get_response(&mut self, position: &mut Vec3, velocity: &mut Vec3) {
        let speed = velocity.magnitude();
        if !self.collision_found || speed <= 0.0 {
            return;
        }

        let mut destination = *position + *velocity;
        *velocity *= self.nearest_distance / speed;
        *position = self.base_point + *velocity;

        let slide_normal = (*position - self.intersection_point)
            .try_normalize(0.0)
            .unwrap_or_else(|| -self.normalized_velocity);
        let displacement = slide_normal * self.epsilon;
        *position += displacement;
        self.intersection_point += displacement;

        destination -= slide_normal * signed_distance_to_plane(&self.intersection_point, &slide_normal, &destination);
        *velocity = destination - self.intersection_point;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two triangles at y = 0 covering `[-h, h]` on x and z, facing +Y
    fn ground(h: f32) -> (Vec<Vec3>, Vec<u32>) {
        let points = vec![
            Vec3::new(-h, 0.0, -h),
            Vec3::new(-h, 0.0, h),
            Vec3::new(h, 0.0, h),
            Vec3::new(h, 0.0, -h),
        ];
        (points, vec![0, 1, 2, 0, 2, 3])
    }

    fn sweep(collider: &mut Collider, start: Vec3, velocity: Vec3, h: f32) {
        let (points, indices) = ground(h);
        let mut planes = TrianglePlaneCache::new();
        collider.initialize(start, velocity, 0.01);
        collider.collide(&mut planes, &points, &indices, 0, indices.len(), 0, false, None);
    }

    #[test]
    fn test_falling_sphere_hits_ground_face() {
        let mut collider = Collider::default();
        sweep(&mut collider, Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -10.0, 0.0), 5.0);

        assert!(collider.collision_found());
        assert_relative_eq!(collider.time_of_impact().unwrap(), 0.4, epsilon = 1e-5);
        assert_relative_eq!(collider.intersection_point().unwrap(), Vec3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn test_moving_away_misses() {
        let mut collider = Collider::default();
        sweep(&mut collider, Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 10.0, 0.0), 5.0);
        assert!(!collider.collision_found());
        assert!(collider.time_of_impact().is_none());
    }

    #[test]
    fn test_back_face_skipped_without_material() {
        let mut collider = Collider::default();
        sweep(&mut collider, Vec3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 10.0, 0.0), 5.0);
        assert!(!collider.collision_found());

        let (points, indices) = ground(5.0);
        let mut planes = TrianglePlaneCache::new();
        collider.initialize(Vec3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 10.0, 0.0), 0.01);
        collider.collide(&mut planes, &points, &indices, 0, 6, 0, true, None);
        assert!(collider.collision_found());
        assert_relative_eq!(collider.time_of_impact().unwrap(), 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_vertex_contact_beyond_the_face() {
        // Parallel to the plane and half a unit above it, heading for the
        // corner (5, 0, 5): only the vertex sphere can be hit
        let mut collider = Collider::default();
        let start = Vec3::new(7.0, 0.5, 7.0);
        sweep(&mut collider, start, Vec3::new(-4.0, 0.0, -4.0), 5.0);

        assert!(collider.collision_found());
        let distance = collider.nearest_distance().unwrap();
        let corner = Vec3::new(5.0, 0.0, 5.0);
        let stop = start + Vec3::new(-1.0, 0.0, -1.0).normalize() * distance;
        assert_relative_eq!((stop - corner).magnitude(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_response_slides_along_plane() {
        let mut collider = Collider::default();
        let start = Vec3::new(0.0, 2.0, 0.0);
        let velocity = Vec3::new(10.0, -2.0, 0.0);
        sweep(&mut collider, start, velocity, 100.0);
        assert!(collider.collision_found());

        let mut position = start;
        let mut residual = velocity;
        collider.get_response(&mut position, &mut residual);

        assert_relative_eq!(position, Vec3::new(5.0, 1.01, 0.0), epsilon = 1e-4);
        assert_relative_eq!(residual, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_nearest_contact_wins() {
        let mut collider = Collider::default();
        let mut planes = TrianglePlaneCache::new();
        collider.initialize(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -10.0, 0.0), 0.01);

        let (far, indices) = ground(5.0);
        let near: Vec<Vec3> = far.iter().map(|p| p + Vec3::new(0.0, 4.0, 0.0)).collect();
        collider.collide(&mut planes, &far, &indices, 0, 6, 0, false, None);
        let mut near_planes = TrianglePlaneCache::new();
        collider.collide(&mut near_planes, &near, &indices, 0, 6, 0, false, None);

        assert_relative_eq!(collider.nearest_distance().unwrap(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_broad_phase_rejects_distant_bounds() {
        let mut collider = Collider::default();
        collider.initialize(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 0.01);

        let far = Vec3::new(50.0, 0.0, 0.0);
        let extent = Vec3::new(1.0, 1.0, 1.0);
        assert!(!collider.can_do_collision(&far, 1.8, &(far - extent), &(far + extent)));

        let near = Vec3::new(2.5, 0.0, 0.0);
        assert!(collider.can_do_collision(&near, 1.8, &(near - extent), &(near + extent)));
    }
}
