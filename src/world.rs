use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::math::Aabb;

/// Numeric block identifier. 0 is air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: BlockId = BlockId(0);

    pub fn is_air(&self) -> bool {
        self.0 == 0
    }
}

/// Host-side queries and sinks the simulation consumes.
///
/// Queries serve particle collision and block expiration only. The sinks
/// are fire-and-forget: implementations must not error back into the
/// engine. Everything takes `&self`; hosts that record calls use interior
/// mutability.
pub trait ParticleWorld {
    /// Solid collision volumes overlapping `region`
    fn collision_volumes(&self, region: &Aabb) -> Vec<Aabb>;

    /// Block occupying the given world coordinate
    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId;

    /// Sound request raised by an effect event
    fn play_sound(&self, name: &str, pos: DVec3) {
        let _ = (name, pos);
    }

    /// Log request raised by an effect event
    fn log_message(&self, message: &str) {
        log::info!("[Particles] {}", message);
    }
}

/// World with no geometry: air everywhere, nothing to collide with.
/// Useful for headless runs and tests that only exercise motion.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoidWorld;

impl ParticleWorld for VoidWorld {
    fn collision_volumes(&self, _region: &Aabb) -> Vec<Aabb> {
        Vec::new()
    }

    fn block_at(&self, _x: i32, _y: i32, _z: i32) -> BlockId {
        BlockId::AIR
    }
}
