// World interaction tests: floor collision response, kill planes,
// block-based expiration and curve-driven parametric motion.

use std::sync::Arc;

use glam::DVec3;

use bedrock_particles::{
    Aabb, BlockExpiration, BlockId, Curve, CurveNode, CurveType, EffectDefinition, EmitterRate,
    EmitterShape, EmitterTransform, Expression, InitialSpeed, KillPlane, MemoryEffectLoader,
    MotionCollision, MotionDynamic, MotionParametric, NamedCurve, ParticleLifetime,
    ParticleSystem, ParticleSystemConfig, ParticleWorld, SharedTransform, VoidWorld,
};

/// Solid floor filling y < 0, stone below the surface
struct FloorWorld;

impl ParticleWorld for FloorWorld {
    fn collision_volumes(&self, region: &Aabb) -> Vec<Aabb> {
        let floor = Aabb::new(DVec3::new(-64.0, -4.0, -64.0), DVec3::new(64.0, 0.0, 64.0));
        if floor.intersects(region) {
            vec![floor]
        } else {
            Vec::new()
        }
    }

    fn block_at(&self, _x: i32, y: i32, _z: i32) -> BlockId {
        if y < 0 {
            BlockId(1)
        } else {
            BlockId::AIR
        }
    }
}

/// Stone below y < 0 with no collision volumes, so particles sink in
struct SoftStoneWorld;

impl ParticleWorld for SoftStoneWorld {
    fn collision_volumes(&self, _region: &Aabb) -> Vec<Aabb> {
        Vec::new()
    }

    fn block_at(&self, _x: i32, y: i32, _z: i32) -> BlockId {
        if y < 0 {
            BlockId(1)
        } else {
            BlockId::AIR
        }
    }
}

fn system_for(def: EffectDefinition) -> ParticleSystem {
    let mut loader = MemoryEffectLoader::new();
    loader.register(def.validated().unwrap());
    let config = ParticleSystemConfig {
        seed: Some(3),
        ..ParticleSystemConfig::default()
    };
    ParticleSystem::with_config(Arc::new(loader), config)
}

/// Burst of particles launched straight along `direction`
fn launched_def(identifier: &str, count: f32, direction: [f32; 3], speed: f32) -> EffectDefinition {
    let mut def = EffectDefinition::new(identifier);
    def.emitter_rate = Some(EmitterRate::instant(count));
    def.emitter_shape = Some(EmitterShape::Point {
        offset: Default::default(),
        direction: [
            Expression::constant(direction[0]),
            Expression::constant(direction[1]),
            Expression::constant(direction[2]),
        ],
    });
    def.initial_speed = Some(InitialSpeed::uniform(speed));
    def.particle_lifetime = Some(ParticleLifetime {
        max_lifetime: Expression::constant(10.0),
        expiration: Expression::zero(),
    });
    def
}

#[test]
fn test_falling_particles_bounce_and_stay_above_floor() {
    let mut def = launched_def("mtest:drop", 6.0, [0.0, -1.0, 0.0], 5.0);
    def.motion_collision = Some(MotionCollision {
        restitution: 0.6,
        radius: 0.1,
        ..MotionCollision::default()
    });

    let world = FloorWorld;
    let mut system = system_for(def);
    system.spawn_at(&world, "mtest:drop", DVec3::new(0.0, 1.0, 0.0));
    assert_eq!(system.active_count(), 6);

    let mut bounced = false;
    for _ in 0..30 {
        system.tick(&world);
        for particle in system.particles() {
            // Centers never sink below the contact height
            assert!(particle.position().y >= 0.0999, "fell through the floor");
            if particle.velocity().y > 0.0 {
                bounced = true;
            }
        }
    }
    assert!(bounced, "no particle ever bounced upward");
    assert_eq!(system.active_count(), 6);
}

#[test]
fn test_contact_expiry_removes_particles_at_floor() {
    let mut def = launched_def("mtest:splat", 5.0, [0.0, -1.0, 0.0], 5.0);
    def.motion_collision = Some(MotionCollision {
        expire_on_contact: true,
        ..MotionCollision::default()
    });

    let world = FloorWorld;
    let mut system = system_for(def);
    system.spawn_at(&world, "mtest:splat", DVec3::new(0.0, 1.0, 0.0));
    for _ in 0..30 {
        system.tick(&world);
    }
    assert_eq!(system.active_count(), 0);
}

#[test]
fn test_contact_drag_stops_sliding_particles() {
    let mut def = launched_def("mtest:slide", 1.0, [1.0, 0.0, 0.0], 4.0);
    def.motion_dynamic = Some(MotionDynamic {
        linear_acceleration: [
            Expression::zero(),
            Expression::constant(-8.0),
            Expression::zero(),
        ],
        ..MotionDynamic::default()
    });
    def.motion_collision = Some(MotionCollision {
        drag: 0.05,
        radius: 0.25,
        ..MotionCollision::default()
    });

    let world = FloorWorld;
    let mut system = system_for(def);
    // Resting on the floor, moving sideways. The spawn height equals the
    // collision radius so the box bottom starts flush with the surface.
    system.spawn_at(&world, "mtest:slide", DVec3::new(0.0, 0.25, 0.0));
    for _ in 0..10 {
        system.tick(&world);
    }
    let particle = system.particles().next().unwrap();
    assert!(
        particle.velocity().x.abs() < 1e-9,
        "drag never stopped the slide: {}",
        particle.velocity().x
    );
    assert!((particle.position().y - 0.25).abs() < 1e-9);
}

#[test]
fn test_kill_plane_removes_crossing_particles() {
    let mut def = launched_def("mtest:plane", 4.0, [0.0, -1.0, 0.0], 5.0);
    // Half a block below the emitter
    def.kill_plane = Some(KillPlane::horizontal(-0.5));

    let mut system = system_for(def);
    system.spawn_at(&VoidWorld, "mtest:plane", DVec3::new(0.0, 2.0, 0.0));
    assert_eq!(system.active_count(), 4);
    for _ in 0..3 {
        system.tick(&VoidWorld);
    }
    assert_eq!(system.active_count(), 0);
}

#[test]
fn test_block_expiration_inside_listed_block() {
    let mut def = launched_def("mtest:sink", 3.0, [0.0, -1.0, 0.0], 5.0);
    def.block_expiration = BlockExpiration {
        expire_in: vec![BlockId(1)],
        expire_not_in: Vec::new(),
    };

    let world = SoftStoneWorld;
    let mut system = system_for(def);
    system.spawn_at(&world, "mtest:sink", DVec3::new(0.0, 1.0, 0.0));
    for _ in 0..8 {
        system.tick(&world);
    }
    // All particles sank below y=0 into stone and expired there
    assert_eq!(system.active_count(), 0);
}

#[test]
fn test_parametric_position_tracks_moving_emitter() {
    let mut def = EffectDefinition::new("mtest:track");
    def.emitter_rate = Some(EmitterRate::instant(1.0));
    def.particle_lifetime = Some(ParticleLifetime {
        max_lifetime: Expression::constant(10.0),
        expiration: Expression::zero(),
    });
    def.motion_parametric = Some(MotionParametric {
        relative_position: Some([
            Expression::zero(),
            Expression::new(|ctx| ctx.particle_age),
            Expression::zero(),
        ]),
        ..MotionParametric::default()
    });

    let handle = SharedTransform::new(EmitterTransform::at(DVec3::ZERO));
    let mut system = system_for(def);
    system.spawn(&VoidWorld, "mtest:track", Box::new(handle.clone()), 0);

    for step in 1..=4 {
        handle.set(EmitterTransform::at(DVec3::new(step as f64 * 0.5, 0.0, 0.0)));
        system.tick(&VoidWorld);
    }
    let particle = system.particles().next().unwrap();
    // Parametric offsets are re-rooted at the emitter's current position
    assert_eq!(particle.position().x, 2.0);
    // Age was 0.15 when the last offset was applied
    assert!((particle.position().y - 0.15).abs() < 1e-6);
}

#[test]
fn test_curve_drives_parametric_roll() {
    let mut def = EffectDefinition::new("mtest:sweep");
    def.emitter_rate = Some(EmitterRate::instant(1.0));
    def.particle_lifetime = Some(ParticleLifetime {
        max_lifetime: Expression::constant(2.0),
        expiration: Expression::zero(),
    });
    def.curves.push(NamedCurve {
        name: "sweep".into(),
        curve: Curve::new(
            CurveType::Linear,
            vec![CurveNode::value(0.0, 0.0), CurveNode::value(1.0, 90.0)],
            Expression::new(|ctx| ctx.particle_age),
        ),
    });
    def.motion_parametric = Some(MotionParametric {
        rotation: Expression::new(|ctx| ctx.curve("sweep")),
        ..MotionParametric::default()
    });

    let mut system = system_for(def);
    system.spawn_at(&VoidWorld, "mtest:sweep", DVec3::ZERO);
    for _ in 0..10 {
        system.tick(&VoidWorld);
    }
    let particle = system.particles().next().unwrap();
    // Roll was last set at age 0.45: 45% of the way to 90 degrees
    assert!((particle.roll() - 40.5).abs() < 1e-3, "roll {}", particle.roll());
}
