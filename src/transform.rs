use std::sync::Arc;

use glam::DVec3;
use parking_lot::RwLock;

use crate::math::{Aabb, Basis};

/// World transform of an emitter for one tick: position, yaw, uniform
/// scale and the orthonormal orientation basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterTransform {
    pub position: DVec3,
    pub yaw: f32,
    pub scale: f32,
    pub basis: Basis,
}

impl EmitterTransform {
    pub fn at(position: DVec3) -> Self {
        EmitterTransform {
            position,
            ..EmitterTransform::default()
        }
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self.basis = Basis::from_yaw_degrees(yaw);
        self
    }
}

impl Default for EmitterTransform {
    fn default() -> Self {
        EmitterTransform {
            position: DVec3::ZERO,
            yaw: 0.0,
            scale: 1.0,
            basis: Basis::IDENTITY,
        }
    }
}

/// Source of an emitter's transform, filled once per tick.
///
/// A provider may be a fixed point, a handle tracking another emitter, or
/// a host-side binding to an entity or locator. `bounds` publishes the
/// bound entity's local box for shapes that sample inside it.
pub trait TransformProvider: Send + Sync {
    fn fill(&self, out: &mut EmitterTransform, dt: f32);

    fn bounds(&self) -> Option<Aabb> {
        None
    }
}

/// Fixed transform: the emitter never moves
#[derive(Debug, Clone, Copy)]
pub struct StaticTransform(pub EmitterTransform);

impl StaticTransform {
    pub fn at(position: DVec3) -> Self {
        StaticTransform(EmitterTransform::at(position))
    }
}

impl TransformProvider for StaticTransform {
    fn fill(&self, out: &mut EmitterTransform, _dt: f32) {
        *out = self.0;
    }
}

/// Shareable live transform. The owner calls [`SharedTransform::set`]
/// each tick; any emitter using a clone as its provider follows along.
/// When the owner stops publishing the last written transform holds.
#[derive(Debug, Clone)]
pub struct SharedTransform {
    inner: Arc<RwLock<EmitterTransform>>,
}

impl SharedTransform {
    pub fn new(initial: EmitterTransform) -> Self {
        SharedTransform {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, transform: EmitterTransform) {
        *self.inner.write() = transform;
    }

    pub fn get(&self) -> EmitterTransform {
        *self.inner.read()
    }
}

impl TransformProvider for SharedTransform {
    fn fill(&self, out: &mut EmitterTransform, _dt: f32) {
        *out = self.get();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_transform_fill() {
        let provider = StaticTransform::at(DVec3::new(1.0, 2.0, 3.0));
        let mut out = EmitterTransform::default();
        provider.fill(&mut out, 0.05);
        assert_eq!(out.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(out.scale, 1.0);
    }

    #[test]
    fn test_shared_transform_follows_writes() {
        let shared = SharedTransform::new(EmitterTransform::at(DVec3::ZERO));
        let provider = shared.clone();
        shared.set(EmitterTransform::at(DVec3::new(0.0, 5.0, 0.0)));
        let mut out = EmitterTransform::default();
        provider.fill(&mut out, 0.05);
        assert_eq!(out.position.y, 5.0);
    }

    #[test]
    fn test_with_yaw_updates_basis() {
        let t = EmitterTransform::at(DVec3::ZERO).with_yaw(90.0);
        let rotated = t.basis.rotate(glam::Vec3::X);
        assert!((rotated.z + 1.0).abs() < 1e-5);
    }
}
