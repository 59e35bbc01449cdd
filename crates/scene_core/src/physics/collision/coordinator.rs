//! Collide-and-slide driver over every registered mesh

use log::{debug, trace};
use slotmap::SlotMap;

use crate::core::config::CollisionSettings;
use crate::foundation::math::{Mat4, Vec3};
use crate::physics::collision::collidable::{CollidableMesh, MeshKey};
use crate::physics::collision::collider::Collider;

/// Outcome of [`CollisionCoordinator::get_new_position`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Final world position
    pub position: Vec3,
    /// World-space movement left over when the loop stopped
    pub velocity: Vec3,
    /// Whether any iteration hit something
    pub collision_found: bool,
    /// Last mesh hit
    pub collided_mesh: Option<MeshKey>,
    /// Iterations that ended in a slide
    pub retries: u32,
}

/// Owns the collidable meshes and resolves ellipsoid movement against them
#[derive(Debug, Default)]
pub struct CollisionCoordinator {
    meshes: SlotMap<MeshKey, CollidableMesh>,
    settings: CollisionSettings,
}

impl CollisionCoordinator {
    /// Create an empty coordinator
    pub fn new(settings: CollisionSettings) -> Self {
        Self {
            meshes: SlotMap::with_key(),
            settings,
        }
    }

    /// Active settings
    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    /// Register a mesh
    pub fn add_mesh(&mut self, mesh: CollidableMesh) -> MeshKey {
        debug!("collision: registered mesh '{}'", mesh.name);
        self.meshes.insert(mesh)
    }

    /// Unregister a mesh
    pub fn remove_mesh(&mut self, key: MeshKey) -> Option<CollidableMesh> {
        self.meshes.remove(key)
    }

    /// Registered mesh
    pub fn mesh(&self, key: MeshKey) -> Option<&CollidableMesh> {
        self.meshes.get(key)
    }

    /// Registered mesh, mutably
    pub fn mesh_mut(&mut self, key: MeshKey) -> Option<&mut CollidableMesh> {
        self.meshes.get_mut(key)
    }

    /// Number of registered meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Move a registered mesh; `false` for an unknown key
    pub fn update_world_matrix(&mut self, key: MeshKey, matrix: Mat4) -> bool {
        match self.meshes.get_mut(key) {
            Some(mesh) => {
                mesh.set_world_matrix(matrix);
                true
            }
            None => false,
        }
    }

    /// Move the collider's ellipsoid from `position` by `displacement`,
    /// sliding along whatever it hits.
    ///
    /// Runs at most `maximum_retry` slide iterations. `excluded_mesh` is
    /// never tested; when given, its collision mask replaces the collider's.
    pub fn get_new_position(
        &mut self,
        position: Vec3,
        displacement: Vec3,
        collider: &mut Collider,
        maximum_retry: u32,
        excluded_mesh: Option<MeshKey>,
    ) -> CollisionResult {
        let radius = collider.radius();
        let mut position = position.component_div(&radius);
        let mut velocity = displacement.component_div(&radius);
        collider.reset_for_query();

        let close_distance = self.settings.close_distance();
        let mask = excluded_mesh
            .and_then(|key| self.meshes.get(key))
            .map_or(collider.collision_mask, |mesh| mesh.collision_mask);
        let mut collision_found = false;
        let mut collided_mesh = None;

        let final_position = loop {
            if collider.retry >= maximum_retry {
                debug!("collision: gave up after {} retries", collider.retry);
                break position;
            }

            collider.initialize(position, velocity, close_distance);
            for (key, mesh) in &mut self.meshes {
                if Some(key) != excluded_mesh && mesh.accepts(mask) {
                    mesh.check_collision(collider, Some(key));
                }
            }

            if !collider.collision_found() {
                position += velocity;
                velocity = Vec3::zeros();
                break position;
            }
            collision_found = true;
            collided_mesh = collider.collided_mesh();

            if velocity != Vec3::zeros() {
                collider.get_response(&mut position, &mut velocity);
            }
            trace!(
                "collision: retry {} at {:?}, residual {:?}",
                collider.retry,
                position,
                velocity
            );
            if velocity.magnitude() <= close_distance {
                break position;
            }
            collider.retry += 1;
        };

        CollisionResult {
            position: final_position.component_mul(&radius),
            velocity: velocity.component_mul(&radius),
            collision_found,
            collided_mesh,
            retries: collider.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::geometry::MeshData;
    use crate::physics::collision_layers::CollisionLayers;
    use approx::assert_relative_eq;

    fn with_ground(half_extent: f32) -> (CollisionCoordinator, MeshKey) {
        let mut coordinator = CollisionCoordinator::new(CollisionSettings::default());
        let ground = CollidableMesh::from_source("ground", &MeshData::plane("ground", half_extent)).unwrap();
        let key = coordinator.add_mesh(ground);
        (coordinator, key)
    }

    #[test]
    fn test_free_movement_passes_through() {
        let (mut coordinator, _) = with_ground(5.0);
        let mut collider = Collider::default();

        let result = coordinator.get_new_position(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            &mut collider,
            5,
            None,
        );

        assert!(!result.collision_found);
        assert_relative_eq!(result.position, Vec3::new(1.0, 5.0, 0.0));
        assert_eq!(result.retries, 0);
    }

    #[test]
    fn test_falling_sphere_stops_above_ground() {
        let (mut coordinator, key) = with_ground(5.0);
        let mut collider = Collider::default();

        let result = coordinator.get_new_position(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            &mut collider,
            5,
            None,
        );

        assert!(result.collision_found);
        assert_eq!(result.collided_mesh, Some(key));
        assert_relative_eq!(result.position, Vec3::new(0.0, 1.01, 0.0), epsilon = 1e-4);
        assert_relative_eq!(collider.time_of_impact().unwrap(), 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_ellipsoid_radius_scales_contact() {
        let (mut coordinator, _) = with_ground(10.0);
        let mut collider = Collider::new(Vec3::new(1.0, 2.0, 1.0));

        let result = coordinator.get_new_position(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            &mut collider,
            5,
            None,
        );

        // Rests one y-radius above the ground plus the scaled push-out
        assert_relative_eq!(result.position.y, 2.02, epsilon = 1e-4);
    }

    #[test]
    fn test_excluded_and_filtered_meshes_are_ignored() {
        let (mut coordinator, key) = with_ground(5.0);
        let mut collider = Collider::default();
        let start = Vec3::new(0.0, 5.0, 0.0);
        let fall = Vec3::new(0.0, -10.0, 0.0);

        let excluded = coordinator.get_new_position(start, fall, &mut collider, 5, Some(key));
        assert!(!excluded.collision_found);

        coordinator.mesh_mut(key).unwrap().collision_group = CollisionLayers::ENVIRONMENT;
        collider.collision_mask = CollisionLayers::PLAYER;
        let filtered = coordinator.get_new_position(start, fall, &mut collider, 5, None);
        assert!(!filtered.collision_found);
        assert_relative_eq!(filtered.position, Vec3::new(0.0, -5.0, 0.0));
    }

    #[test]
    fn test_zero_retries_returns_start() {
        let (mut coordinator, _) = with_ground(5.0);
        let mut collider = Collider::default();

        let result = coordinator.get_new_position(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            &mut collider,
            0,
            None,
        );
        assert_relative_eq!(result.position, Vec3::new(0.0, 5.0, 0.0));
        assert!(!result.collision_found);
    }

    #[test]
    fn test_moved_mesh_is_hit_at_new_place() {
        let (mut coordinator, key) = with_ground(5.0);
        let raised = Transform::from_position(Vec3::new(0.0, 2.0, 0.0)).to_matrix();
        assert!(coordinator.update_world_matrix(key, raised));

        let mut collider = Collider::default();
        let result = coordinator.get_new_position(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            &mut collider,
            5,
            None,
        );
        assert_relative_eq!(result.position.y, 3.01, epsilon = 1e-4);

        coordinator.remove_mesh(key);
        assert!(!coordinator.update_world_matrix(key, Mat4::identity()));
    }
}
