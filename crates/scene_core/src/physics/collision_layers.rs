//! Collision groups and masks
//!
//! A mesh belongs to one or more groups. A mover carries a mask and only
//! tests meshes whose group shares at least one bit with it.

use bitflags::bitflags;

bitflags! {
    /// Collision group / mask bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        /// Default group of meshes with no explicit layer
        const DEFAULT = 1 << 0;
        /// Player-controlled movers
        const PLAYER = 1 << 1;
        /// Cameras moving with collisions enabled
        const CAMERA = 1 << 2;
        /// Static environment geometry
        const ENVIRONMENT = 1 << 3;
        /// Animated or moving props
        const DYNAMIC = 1 << 4;
        /// Volumes that only report contact
        const TRIGGER = 1 << 5;

        // User-defined layers occupy the remaining bits
        const _ = !0;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::all()
    }
}

impl CollisionLayers {
    /// Whether a mover with `mask` tests meshes in `group`
    pub fn should_collide(mask: Self, group: Self) -> bool {
        mask.intersects(group)
    }

    /// Layer for a user-defined bit in `6..32`
    pub fn custom(bit: u32) -> Option<Self> {
        (6..32).contains(&bit).then(|| Self::from_bits_retain(1 << bit))
    }
}
