//! Skinning demo
//!
//! Builds a three bone arm, plays a short wave animation and prints the
//! skinning buffer of every frame.

mod common;

use std::f32::consts::FRAC_PI_4;

use scene_core::animation::{AnimationTrack, Bone, Skeleton, MATRIX_STRIDE};
use scene_core::foundation::math::{Mat4, Mat4Ext, Vec3};

fn build_arm() -> Result<Skeleton, Box<dyn std::error::Error>> {
    let mut skeleton = Skeleton::new("arm", "arm-0");
    let shoulder = skeleton.add_bone(Bone::new("shoulder", Mat4::identity()), None)?;

    let rest = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
    let mut wave = AnimationTrack::new("wave");
    wave.add_key(0.0, rest);
    wave.add_key(15.0, Mat4::rotation_z(FRAC_PI_4) * rest);
    wave.add_key(30.0, rest);

    let elbow = skeleton.add_bone(Bone::new("elbow", rest).with_length(1.0).with_animation(wave), Some(shoulder))?;
    skeleton.add_bone(Bone::new("wrist", rest).with_length(1.0), Some(elbow))?;
    skeleton.create_animation_range("wave", 0.0, 30.0);
    Ok(skeleton)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    log::info!("Starting skinning demo");

    let mut skeleton = build_arm()?;
    log::info!("{skeleton}");

    let range = skeleton
        .get_animation_range("wave")
        .map(|r| (r.from, r.to))
        .unwrap_or_default();

    let mut frame = range.0;
    while frame <= range.1 {
        skeleton.apply_frame(frame);
        let matrices = skeleton.get_transform_matrices(None);
        for (slot, matrix) in matrices.chunks_exact(MATRIX_STRIDE).enumerate() {
            // Translation lives in the last column
            log::info!(
                "frame {frame:>4.1} bone {slot}: offset ({:.3}, {:.3}, {:.3})",
                matrix[12],
                matrix[13],
                matrix[14]
            );
        }
        frame += 5.0;
    }

    let wrist = skeleton.bone_id_by_name("wrist").and_then(|id| skeleton.bone(id));
    if let Some(wrist) = wrist {
        log::info!("wrist at {:?}", wrist.get_absolute_position(None));
    }

    println!("{}", skeleton.to_ron()?);
    log::info!("Skinning demo completed successfully");
    Ok(())
}
