//! CSG demo
//!
//! Carves a notched block out of two boxes and reports the rebuilt mesh.

mod common;

use scene_core::csg::Csg;
use scene_core::foundation::math::{Transform, Vec3};
use scene_core::geometry::MeshData;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = common::init();
    log::info!("Starting CSG demo");

    let block = MeshData::cuboid("block", Vec3::new(2.0, 2.0, 2.0));
    let cutter = MeshData::cuboid("cutter", Vec3::new(1.0, 1.0, 3.0))
        .with_transform(Transform::from_position(Vec3::new(1.0, 1.0, 0.0)));

    let a = Csg::from_mesh(&block)?;
    let b = Csg::from_mesh(&cutter)?;

    for (label, result) in [
        ("union", a.union(&b)),
        ("subtract", a.subtract(&b)),
        ("intersect", a.intersect(&b)),
    ] {
        let mesh = result.to_mesh(label, &settings.csg);
        mesh.validate()?;
        let bounds = mesh.bounding_box();
        log::info!(
            "{label}: {} polygons -> {} triangles, {} submeshes, bounds {:?}",
            result.polygons().len(),
            mesh.triangle_count(),
            mesh.sub_meshes.len(),
            bounds.map(|b| (b.min, b.max))
        );
    }

    log::info!("CSG demo completed successfully");
    Ok(())
}
