//! Collision demo
//!
//! Drops an ellipsoid onto a floor with a ramp and walks it forward,
//! logging every resolved position.

mod common;

use scene_core::foundation::math::{Mat4, Mat4Ext, Vec3};
use scene_core::geometry::MeshData;
use scene_core::physics::{CollidableMesh, Collider, CollisionCoordinator, CollisionLayers};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = common::init();
    log::info!("Starting collision demo");

    let mut coordinator = CollisionCoordinator::new(settings.collision);

    let floor = MeshData::plane("floor", 20.0);
    coordinator.add_mesh(CollidableMesh::from_source("floor", &floor)?.with_group(CollisionLayers::ENVIRONMENT));

    let mut ramp = MeshData::plane("ramp", 2.0);
    ramp.set_world_matrix(Mat4::new_translation(&Vec3::new(6.0, 0.5, 0.0)) * Mat4::rotation_z(0.35));
    let ramp_key = coordinator.add_mesh(CollidableMesh::from_source("ramp", &ramp)?);

    let mut collider = Collider::new(Vec3::new(0.5, 1.0, 0.5));
    collider.collision_mask = CollisionLayers::ENVIRONMENT | CollisionLayers::DEFAULT;

    let gravity = Vec3::new(0.0, -9.81, 0.0);
    let walk = Vec3::new(3.0, 0.0, 0.0);
    let dt = 1.0 / 30.0;
    let mut position = Vec3::new(0.0, 4.0, 0.0);

    for step in 0..90 {
        let result = coordinator.get_new_position(
            position,
            (walk + gravity) * dt,
            &mut collider,
            settings.collision.maximum_retry,
            None,
        );
        position = result.position;

        if result.collided_mesh == Some(ramp_key) {
            log::debug!("step {step}: touching the ramp");
        }
        log::info!(
            "step {step:>2}: position ({:.3}, {:.3}, {:.3}), hit {}, retries {}",
            position.x,
            position.y,
            position.z,
            result.collision_found,
            result.retries
        );
    }

    log::info!("Collision demo completed successfully");
    Ok(())
}
