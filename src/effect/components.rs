use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::expr::{Expression, ExpressionContext};
use crate::math::signum;
use crate::world::BlockId;

/// How many particles an emitter produces and when
#[derive(Debug, Clone)]
pub enum EmitterRate {
    /// One burst. `count` resolves per burst; a positive override count on
    /// the spawn request takes precedence.
    Instant { count: Expression },
    /// Continuous emission of `rate` particles per second, capped at
    /// `max_particles` simultaneously live ones.
    Steady {
        rate: Expression,
        max_particles: Expression,
    },
}

impl EmitterRate {
    pub fn instant(count: impl Into<Expression>) -> Self {
        EmitterRate::Instant {
            count: count.into(),
        }
    }

    pub fn steady(rate: impl Into<Expression>, max_particles: impl Into<Expression>) -> Self {
        EmitterRate::Steady {
            rate: rate.into(),
            max_particles: max_particles.into(),
        }
    }
}

/// When an emitter is active and when it expires
#[derive(Debug, Clone)]
pub enum EmitterLifetime {
    /// Active for `active_time` seconds, then expired for good
    Once { active_time: Expression },
    /// Cycles of `active_time` seconds on, `sleep_time` seconds off
    Looping {
        active_time: Expression,
        sleep_time: Expression,
    },
    /// Active while `activation` is nonzero; expired for good once
    /// `expiration` is nonzero
    Expression {
        activation: Expression,
        expiration: Expression,
    },
}

impl EmitterLifetime {
    pub fn once(active_time: impl Into<Expression>) -> Self {
        EmitterLifetime::Once {
            active_time: active_time.into(),
        }
    }

    pub fn looping(active_time: impl Into<Expression>, sleep_time: impl Into<Expression>) -> Self {
        EmitterLifetime::Looping {
            active_time: active_time.into(),
            sleep_time: sleep_time.into(),
        }
    }
}

/// Which particle properties stay rigidly bound to the emitter as it
/// moves. Unset axes put the particle fully in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSpace {
    pub position: bool,
    pub rotation: bool,
    pub velocity: bool,
}

/// Direction of particles leaving a volume shape
#[derive(Debug, Clone, Default)]
pub enum ShapeDirection {
    /// Away from the shape center
    #[default]
    Outwards,
    /// Toward the shape center
    Inwards,
    /// Explicit direction expressions
    Custom([Expression; 3]),
}

/// Where new particles start and which way they initially point
#[derive(Debug, Clone)]
pub enum EmitterShape {
    /// Single point at an expression offset
    Point {
        offset: [Expression; 3],
        direction: [Expression; 3],
    },
    /// Inside or on a sphere
    Sphere {
        offset: [Expression; 3],
        radius: Expression,
        surface_only: bool,
        direction: ShapeDirection,
    },
    /// Inside or on an axis-aligned box of given half dimensions
    Box {
        offset: [Expression; 3],
        half_dimensions: [Expression; 3],
        surface_only: bool,
        direction: ShapeDirection,
    },
    /// Inside or on a flat disc around a plane normal
    Disc {
        normal: [Expression; 3],
        offset: [Expression; 3],
        radius: Expression,
        surface_only: bool,
        direction: ShapeDirection,
    },
    /// Inside the bounds box published by the transform provider
    EntityBounds {
        surface_only: bool,
        direction: ShapeDirection,
    },
}

impl EmitterShape {
    /// Point shape with no offset and no direction
    pub fn origin() -> Self {
        EmitterShape::Point {
            offset: Default::default(),
            direction: Default::default(),
        }
    }
}

/// Expressions run for their side effects at creation and every tick
#[derive(Debug, Clone, Default)]
pub struct InitExpressions {
    pub creation: Option<Expression>,
    pub per_tick: Option<Expression>,
}

/// How long a particle lives and an optional per-tick escape hatch
#[derive(Debug, Clone)]
pub struct ParticleLifetime {
    /// Seconds a particle lives, resolved once per life; values <= 0
    /// fall back to 1.0
    pub max_lifetime: Expression,
    /// Kills the particle on any tick this resolves nonzero
    pub expiration: Expression,
}

impl Default for ParticleLifetime {
    fn default() -> Self {
        ParticleLifetime {
            max_lifetime: Expression::one(),
            expiration: Expression::zero(),
        }
    }
}

/// Starting speed along the sampled spawn direction, blocks per second
/// per axis
#[derive(Debug, Clone)]
pub struct InitialSpeed {
    pub speed: [Expression; 3],
}

impl InitialSpeed {
    /// The scalar form applies one speed to all three axes
    pub fn uniform(speed: impl Into<Expression>) -> Self {
        let speed = speed.into();
        InitialSpeed {
            speed: [speed.clone(), speed.clone(), speed],
        }
    }
}

/// Starting roll (degrees) and roll rate (degrees per second)
#[derive(Debug, Clone, Default)]
pub struct InitialSpin {
    pub rotation: Expression,
    pub rotation_rate: Expression,
}

/// Acceleration-driven motion. Accelerations are authored in blocks/s²,
/// drags in 1/s; both are normalized to per-tick units at evaluation.
#[derive(Debug, Clone, Default)]
pub struct MotionDynamic {
    pub linear_acceleration: [Expression; 3],
    pub linear_drag: Expression,
    pub rotation_acceleration: Expression,
    pub rotation_drag: Expression,
}

/// Position/direction dictated directly by expressions each tick,
/// overriding integration for the components present
#[derive(Debug, Clone, Default)]
pub struct MotionParametric {
    /// Offset from the emitter; requires an owning emitter to apply
    pub relative_position: Option<[Expression; 3]>,
    /// Direction of travel; speed is preserved
    pub direction: Option<[Expression; 3]>,
    /// Roll in degrees, set every tick the component is present
    pub rotation: Expression,
}

/// Collision response against world geometry
#[derive(Debug, Clone)]
pub struct MotionCollision {
    /// Collision is skipped on ticks this resolves zero
    pub enabled: Expression,
    /// Speed lost per contact tick (authored per second, stored per tick)
    pub drag: f32,
    /// Fraction of vertical speed kept, sign-flipped, on floor/ceiling
    /// contact
    pub restitution: f32,
    /// Half-size of the particle's collision cube; 0 disables collision
    pub radius: f32,
    /// Kill the particle on first contact, after contact events fire
    pub expire_on_contact: bool,
    /// Named events fired on contact
    pub events: Vec<String>,
}

impl MotionCollision {
    pub fn is_enabled(&self, ctx: &ExpressionContext) -> bool {
        self.enabled.resolve_bool(ctx)
    }
}

impl Default for MotionCollision {
    fn default() -> Self {
        MotionCollision {
            enabled: Expression::one(),
            drag: 0.0,
            restitution: 0.0,
            radius: 0.1,
            expire_on_contact: false,
            events: Vec::new(),
        }
    }
}

/// Plane `ax + by + cz + d = 0` in emitter-relative coordinates.
/// A particle dies the tick its movement segment crosses the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KillPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl KillPlane {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        KillPlane { a, b, c, d }
    }

    /// Horizontal plane at emitter-relative height `y`
    pub fn horizontal(y: f32) -> Self {
        KillPlane::new(0.0, 1.0, 0.0, -y)
    }

    fn value(&self, p: DVec3) -> f64 {
        f64::from(self.a) * p.x + f64::from(self.b) * p.y + f64::from(self.c) * p.z
            + f64::from(self.d)
    }

    /// True when the emitter-relative segment `prev -> next` changes side.
    /// Landing exactly on the plane counts as a crossing.
    pub fn crossed(&self, prev: DVec3, next: DVec3) -> bool {
        signum(self.value(prev)) != signum(self.value(next))
    }
}

/// Block-based expiration rules
#[derive(Debug, Clone, Default)]
pub struct BlockExpiration {
    /// Die when inside any of these blocks
    pub expire_in: Vec<BlockId>,
    /// Die when inside none of these blocks
    pub expire_not_in: Vec<BlockId>,
}

impl BlockExpiration {
    pub fn is_empty(&self) -> bool {
        self.expire_in.is_empty() && self.expire_not_in.is_empty()
    }
}

/// Billboard orientation modes a renderer can honor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    #[default]
    RotateXyz,
    RotateY,
    LookatXyz,
    LookatY,
    DirectionX,
    DirectionY,
    DirectionZ,
    EmitterTransformXy,
    EmitterTransformXz,
    EmitterTransformYz,
}

/// Render-facing parameters. The simulation carries these untouched; a
/// renderer resolves them against each particle's context.
#[derive(Debug, Clone)]
pub struct Appearance {
    /// Billboard width/height in blocks
    pub size: [Expression; 2],
    pub facing: FacingMode,
    /// RGBA tint, each channel in [0, 1]
    pub tint: [Expression; 4],
}

impl Default for Appearance {
    fn default() -> Self {
        Appearance {
            size: [Expression::one(), Expression::one()],
            facing: FacingMode::default(),
            tint: [
                Expression::one(),
                Expression::one(),
                Expression::one(),
                Expression::one(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_plane_crossing() {
        let plane = KillPlane::horizontal(0.0);
        let above = DVec3::new(0.0, 1.0, 0.0);
        let below = DVec3::new(0.0, -0.5, 0.0);
        let on = DVec3::new(3.0, 0.0, -2.0);
        assert!(plane.crossed(above, below));
        assert!(plane.crossed(below, above));
        // Landing exactly on the plane is a crossing
        assert!(plane.crossed(above, on));
        // Staying on one side is not
        assert!(!plane.crossed(above, DVec3::new(5.0, 0.1, 5.0)));
    }

    #[test]
    fn test_kill_plane_offset() {
        let plane = KillPlane::horizontal(2.0);
        assert!(plane.crossed(DVec3::new(0.0, 2.5, 0.0), DVec3::new(0.0, 1.5, 0.0)));
        assert!(!plane.crossed(DVec3::new(0.0, 1.5, 0.0), DVec3::new(0.0, 0.5, 0.0)));
    }

    #[test]
    fn test_uniform_speed_replicates() {
        let speed = InitialSpeed::uniform(4.0);
        let ctx = ExpressionContext::new();
        for axis in &speed.speed {
            assert_eq!(axis.resolve(&ctx), 4.0);
        }
    }
}
