//! Bedrock-format particle simulation engine.
//!
//! Effects are described once as an [`EffectDefinition`] (rates, shapes,
//! motion, curves, events), then instantiated any number of times through
//! a [`ParticleSystem`], which owns every live emitter and particle and
//! advances them on a fixed 20 Hz tick. Hosts supply two seams: a
//! [`ParticleWorld`] for collision volumes and block queries, and a
//! [`TransformProvider`] per spawn that tells the emitter where it is.

pub mod constants;
pub mod curve;
pub mod effect;
pub mod emitter;
pub mod expr;
pub mod loader;
pub mod math;
pub mod particle;
pub(crate) mod pool;
pub mod system;
pub mod transform;
pub mod world;

pub use curve::{ChainTangents, Curve, CurveNode, CurveType};
pub use effect::{
    Appearance, BlockExpiration, DefinitionError, EffectDefinition, EffectEvent, EmitterLifetime,
    EmitterRate, EmitterShape, FacingMode, InitExpressions, InitialSpeed, InitialSpin, KillPlane,
    LifetimeEvents, LocalSpace, MotionCollision, MotionDynamic, MotionParametric, NamedCurve,
    ParticleLifetime, ShapeDirection, SpawnType, TimelineEntry, WeightedEvent,
};
pub use emitter::Emitter;
pub use expr::{resolve_vec3, Expression, ExpressionContext, RANDOM_SLOTS};
pub use loader::{normalize_effect_path, EffectLoader, MemoryEffectLoader};
pub use math::{Aabb, Basis};
pub use particle::Particle;
pub use system::{ParticleSystem, ParticleSystemConfig};
pub use transform::{EmitterTransform, SharedTransform, StaticTransform, TransformProvider};
pub use world::{BlockId, ParticleWorld, VoidWorld};
