/// Fountain simulation demo
/// Spawns a steady fountain effect over a solid floor and runs it
/// headless at the fixed 20 Hz tick, printing a JSON summary at the end.
/// Set RUST_LOG=debug for per-tick spawn/expire logging.
use anyhow::Result;
use glam::DVec3;
use serde::Serialize;

use bedrock_particles::constants::tick::TICK_SECONDS;
use bedrock_particles::{
    Aabb, BlockId, EffectDefinition, EmitterRate, EmitterShape, Expression, InitialSpeed,
    MemoryEffectLoader, MotionCollision, MotionDynamic, ParticleLifetime, ParticleSystem,
    ParticleSystemConfig, ParticleWorld, ShapeDirection,
};

/// Flat stone floor filling y < 0
struct FloorWorld;

impl ParticleWorld for FloorWorld {
    fn collision_volumes(&self, region: &Aabb) -> Vec<Aabb> {
        let floor = Aabb::new(DVec3::new(-64.0, -1.0, -64.0), DVec3::new(64.0, 0.0, 64.0));
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

/// Water droplets rising from a small disc, pulled back down by
/// gravity and bouncing off the floor until they expire.
fn fountain_effect() -> EffectDefinition {
    let mut def = EffectDefinition::new("demo:fountain");
    def.emitter_rate = Some(EmitterRate::steady(120.0, 600.0));
    def.emitter_shape = Some(EmitterShape::Disc {
        normal: [Expression::zero(), Expression::one(), Expression::zero()],
        offset: Default::default(),
        radius: Expression::constant(0.25),
        surface_only: false,
        direction: ShapeDirection::Custom([
            Expression::new(|ctx| ctx.randoms[1] * 0.8 - 0.4),
            Expression::one(),
            Expression::new(|ctx| ctx.randoms[2] * 0.8 - 0.4),
        ]),
    });
    def.particle_lifetime = Some(ParticleLifetime {
        max_lifetime: Expression::new(|ctx| 3.0 + ctx.random),
        expiration: Expression::zero(),
    });
    def.initial_speed = Some(InitialSpeed::uniform(7.0));
    def.motion_dynamic = Some(MotionDynamic {
        linear_acceleration: [
            Expression::zero(),
            Expression::constant(-16.0),
            Expression::zero(),
        ],
        linear_drag: Expression::constant(0.4),
        ..MotionDynamic::default()
    });
    def.motion_collision = Some(MotionCollision {
        drag: 0.02,
        restitution: 0.6,
        radius: 0.05,
        ..MotionCollision::default()
    });
    def
}

#[derive(Serialize)]
struct RunSummary {
    ticks: u32,
    simulated_seconds: f32,
    peak_particles: usize,
    final_particles: usize,
    pooled_slots: u32,
    mean_height: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let world = FloorWorld;
    let mut loader = MemoryEffectLoader::new();
    loader.register(fountain_effect().validated()?);

    let config = ParticleSystemConfig {
        seed: Some(42),
        ..ParticleSystemConfig::default()
    };
    let mut system = ParticleSystem::with_config(std::sync::Arc::new(loader), config);
    if !system.spawn_at(&world, "demo:fountain", DVec3::new(0.0, 1.0, 0.0)) {
        anyhow::bail!("fountain effect failed to spawn");
    }

    let ticks = 200u32;
    let mut peak = 0usize;
    for tick in 0..ticks {
        system.tick(&world);
        peak = peak.max(system.active_count());
        if tick % 20 == 19 {
            log::info!(
                "[Fountain] t={:.1}s particles={} pooled={}",
                (tick + 1) as f32 * TICK_SECONDS,
                system.active_count(),
                system.pooled_count()
            );
        }
    }

    let count = system.active_count();
    let mean_height = if count > 0 {
        system.particles().map(|p| p.position().y).sum::<f64>() / count as f64
    } else {
        0.0
    };
    let summary = RunSummary {
        ticks,
        simulated_seconds: ticks as f32 * TICK_SECONDS,
        peak_particles: peak,
        final_particles: count,
        pooled_slots: system.pooled_count(),
        mean_height,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
