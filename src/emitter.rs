//! Live emitters: transform tracking, lifetime cycling, spawn rates and
//! shape-driven particle emission.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::{DVec3, EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::Rng;

use crate::constants::budget::DEFAULT_PARTICLE_POOL_LIMIT;
use crate::constants::motion::PER_SECOND_SCALE;
use crate::constants::tick::TICK_SECONDS;
use crate::effect::components::{EmitterLifetime, EmitterRate, EmitterShape, ShapeDirection};
use crate::effect::events::{fire_named, EventAnchor, EventScope, SpawnRequest};
use crate::effect::{self, EffectDefinition};
use crate::expr::{resolve_vec3, ExpressionContext, RANDOM_SLOTS};
use crate::math::Basis;
use crate::particle::Particle;
use crate::pool::{ParticleArena, ParticlePool};
use crate::transform::{EmitterTransform, SharedTransform, TransformProvider};
use crate::world::ParticleWorld;

/// Snapshot of the emitter state a particle reads while ticking:
/// transform, the per-tick movement delta, and the context slots the
/// particle mirrors into its own expression context.
pub(crate) struct EmitterView {
    pub transform: EmitterTransform,
    pub last_basis: Basis,
    pub delta: DVec3,
    pub age: f32,
    pub lifetime: f32,
    pub randoms: [f32; RANDOM_SLOTS],
}

/// System-side state an emitter touches while ticking or emitting:
/// the particle arena, the output list for new slots, budgets, and the
/// shared event plumbing.
pub(crate) struct EmitterCtx<'a> {
    pub world: &'a dyn ParticleWorld,
    pub arena: &'a mut ParticleArena,
    /// New particle slots land here; the system splices them into its
    /// live list once the current phase completes.
    pub out: &'a mut Vec<usize>,
    /// Live particles not counted by `out`
    pub live_count: usize,
    pub max_active: u32,
    pub pooled: &'a mut u32,
    pub max_pooled: u32,
    pub requests: &'a mut Vec<SpawnRequest>,
    pub rng: &'a mut StdRng,
}

impl EmitterCtx<'_> {
    /// Global particle budget left, counting slots emitted this phase
    pub(crate) fn remaining_room(&self) -> i32 {
        let used = (self.live_count + self.out.len()) as i64;
        (i64::from(self.max_active) - used).max(0) as i32
    }

    pub(crate) fn scope(&mut self) -> EventScope<'_> {
        EventScope {
            world: self.world,
            requests: &mut *self.requests,
            rng: &mut *self.rng,
        }
    }

    fn on_pool_borrow(&mut self) {
        *self.pooled = self.pooled.saturating_sub(1);
    }
}

/// A live emitter driving one effect instance.
pub struct Emitter {
    id: u64,
    def: Arc<EffectDefinition>,
    provider: Box<dyn TransformProvider>,
    /// Live handle bound children follow; republished every tick
    shared: SharedTransform,
    transform: EmitterTransform,
    last_position: DVec3,
    last_basis: Basis,
    delta: DVec3,
    age: f32,
    lifetime: f32,
    active_time: f32,
    sleep_time: f32,
    sleep_remaining: f32,
    /// Cached steady max-particles resolve; zero means unresolved
    max_particles_eval: i32,
    steady_remainder: f32,
    instant_emitted: bool,
    expired: bool,
    expiration_fired: bool,
    timeline_cursor: usize,
    active_particles: u32,
    spawned_any: bool,
    override_count: i32,
    pool: ParticlePool,
    ctx: ExpressionContext,
}

impl Emitter {
    pub(crate) fn new(
        id: u64,
        def: Arc<EffectDefinition>,
        provider: Box<dyn TransformProvider>,
        override_count: i32,
        ctx: &mut EmitterCtx<'_>,
    ) -> Self {
        let mut transform = EmitterTransform::default();
        provider.fill(&mut transform, 0.0);

        let base_limit = def.pool_limit.unwrap_or(DEFAULT_PARTICLE_POOL_LIMIT);
        let pool_limit = if override_count > 0 {
            base_limit.min(override_count as u32)
        } else {
            base_limit
        };

        let mut expr_ctx = ExpressionContext::new();
        expr_ctx.seed_randoms(ctx.rng);
        expr_ctx.emitter_randoms = expr_ctx.randoms;
        expr_ctx.entity_scale = transform.scale;

        let mut emitter = Emitter {
            id,
            def,
            provider,
            shared: SharedTransform::new(transform),
            transform,
            last_position: transform.position,
            last_basis: transform.basis,
            delta: DVec3::ZERO,
            age: 0.0,
            lifetime: f32::MAX,
            active_time: 0.0,
            sleep_time: 0.0,
            sleep_remaining: 0.0,
            max_particles_eval: 0,
            steady_remainder: 0.0,
            instant_emitted: false,
            expired: false,
            expiration_fired: false,
            timeline_cursor: 0,
            active_particles: 0,
            spawned_any: false,
            override_count,
            pool: ParticlePool::new(pool_limit as usize),
            ctx: expr_ctx,
        };
        emitter.evaluate_lifetime_on_create();
        emitter.update_context(0.0);

        let def = Arc::clone(&emitter.def);
        if let Some(init) = &def.emitter_init {
            if let Some(expr) = &init.creation {
                expr.resolve(&emitter.ctx);
            }
        }
        let mut scope = ctx.scope();
        let anchor = EventAnchor::Emitter {
            transform: &emitter.transform,
            shared: &emitter.shared,
        };
        fire_named(
            &def,
            &def.emitter_events.creation,
            &anchor,
            &emitter.ctx,
            &mut scope,
        );
        emitter
    }

    /// The construction-time burst: instant rates fire here when room
    /// allows, and a definition with no rate component at all emits its
    /// legacy single burst and expires on the spot.
    pub(crate) fn emit_initial(&mut self, ctx: &mut EmitterCtx<'_>) {
        if self.expired {
            return;
        }
        if matches!(
            self.def.emitter_lifetime,
            Some(EmitterLifetime::Expression { .. })
        ) {
            return;
        }
        if !self.is_active() {
            return;
        }
        let def = Arc::clone(&self.def);
        let room = ctx.remaining_room();
        match &def.emitter_rate {
            Some(EmitterRate::Instant { .. }) => {
                let count = self.resolve_instant_count();
                self.emit_particles(count, room, ctx);
                self.instant_emitted = true;
            }
            Some(EmitterRate::Steady { .. }) => {}
            None => {
                let count = if self.override_count > 0 {
                    self.override_count
                } else {
                    1
                };
                self.emit_particles(count, room, ctx);
                self.instant_emitted = true;
                self.expire(ctx);
            }
        }
    }

    /// Advance one tick. Returns `false` once the emitter is expired
    /// and has no live particles left.
    pub(crate) fn tick(&mut self, ctx: &mut EmitterCtx<'_>) -> bool {
        self.update_transform(TICK_SECONDS);
        self.shared.set(self.transform);
        self.update_context(self.age);

        let def = Arc::clone(&self.def);
        if let Some(init) = &def.emitter_init {
            if let Some(expr) = &init.per_tick {
                expr.resolve(&self.ctx);
            }
        }
        if !self.expired {
            self.tick_timeline(ctx);
            self.apply_lifetime_logic(ctx);
            self.update_context(self.age);
            if !self.expired && self.is_active() {
                match &def.emitter_rate {
                    Some(EmitterRate::Instant { .. }) => {
                        if !self.instant_emitted {
                            let room = ctx.remaining_room();
                            let count = self.resolve_instant_count();
                            self.emit_particles(count, room, ctx);
                            self.instant_emitted = true;
                        }
                    }
                    Some(EmitterRate::Steady { .. }) => self.emit_steady(ctx),
                    None => {}
                }
            }
        }
        self.age += TICK_SECONDS;
        self.update_context(self.age);
        !self.expired || self.active_particles > 0
    }

    fn emit_steady(&mut self, ctx: &mut EmitterCtx<'_>) {
        let def = Arc::clone(&self.def);
        let Some(EmitterRate::Steady { rate, .. }) = &def.emitter_rate else {
            return;
        };
        let max_count = self.max_particles() - self.active_particles as i32;
        if max_count <= 0 {
            return;
        }
        let spawn_rate = rate.resolve(&self.ctx);
        if spawn_rate <= 0.0 {
            return;
        }
        let room = ctx.remaining_room();
        if room <= 0 {
            return;
        }
        self.steady_remainder += spawn_rate * PER_SECOND_SCALE;
        let count = self.steady_remainder as i32;
        if count <= 0 {
            return;
        }
        let actual = count.min(max_count).min(room);
        if actual <= 0 {
            self.steady_remainder -= count as f32;
            return;
        }
        self.emit_particles(actual, room, ctx);
        self.steady_remainder -= count as f32;
    }

    fn resolve_instant_count(&self) -> i32 {
        if self.override_count > 0 {
            return self.override_count;
        }
        match &self.def.emitter_rate {
            Some(EmitterRate::Instant { count }) => (count.resolve(&self.ctx) as i32).max(0),
            _ => 0,
        }
    }

    /// Steady cap on simultaneously live particles, resolved once per
    /// cycle and clamped to the override count when one is set.
    fn max_particles(&mut self) -> i32 {
        let def = Arc::clone(&self.def);
        let Some(EmitterRate::Steady { max_particles, .. }) = &def.emitter_rate else {
            return i32::MAX;
        };
        if self.max_particles_eval <= 0 {
            let max = max_particles.resolve(&self.ctx);
            self.max_particles_eval = (max as i32).max(1);
        }
        if self.override_count > 0 {
            self.max_particles_eval.min(self.override_count)
        } else {
            self.max_particles_eval
        }
    }

    fn emit_particles(&mut self, count: i32, room: i32, ctx: &mut EmitterCtx<'_>) {
        if count <= 0 || room <= 0 {
            return;
        }
        let actual = count.min(room);
        let def = Arc::clone(&self.def);
        match &def.emitter_shape {
            // No shape component: particles appear at the emitter with
            // no sampled direction and no inherited movement.
            None => {
                for _ in 0..actual {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let view = self.view();
                    if let Some(particle) = ctx.arena.get_mut(slot) {
                        particle.apply_initial_speed(&view);
                    }
                    ctx.out.push(slot);
                    self.on_particle_spawned();
                }
            }
            Some(shape) => self.emit_shaped(shape, actual, ctx),
        }
    }

    fn emit_shaped(&mut self, shape: &EmitterShape, count: i32, ctx: &mut EmitterCtx<'_>) {
        match shape {
            EmitterShape::Point { offset, direction } => {
                for _ in 0..count {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let (pos, dir) = match ctx.arena.get(slot) {
                        Some(particle) => (
                            resolve_vec3(offset, particle.context()),
                            resolve_vec3(direction, particle.context()),
                        ),
                        None => (Vec3::ZERO, Vec3::ZERO),
                    };
                    self.spawn_sampled(slot, pos.as_dvec3(), dir.as_dvec3(), ctx);
                }
            }
            EmitterShape::Sphere {
                offset,
                radius,
                surface_only,
                direction,
            } => {
                for _ in 0..count {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let (offset_v, radius_v, custom) = match ctx.arena.get(slot) {
                        Some(particle) => (
                            resolve_vec3(offset, particle.context()),
                            radius.resolve(particle.context()),
                            resolve_custom(direction, particle.context()),
                        ),
                        None => (Vec3::ZERO, 0.0, None),
                    };
                    let r = if *surface_only {
                        radius_v
                    } else {
                        radius_v * ctx.rng.gen::<f32>().cbrt()
                    };
                    let theta = TAU * ctx.rng.gen::<f32>();
                    let cos_phi = 2.0 * ctx.rng.gen::<f32>() - 1.0;
                    let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
                    let local =
                        Vec3::new(sin_phi * theta.cos(), cos_phi, sin_phi * theta.sin()) * r;
                    let dir = directed(custom, local, direction);
                    self.spawn_sampled(slot, (offset_v + local).as_dvec3(), dir.as_dvec3(), ctx);
                }
            }
            EmitterShape::Box {
                offset,
                half_dimensions,
                surface_only,
                direction,
            } => {
                for _ in 0..count {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let (offset_v, half, custom) = match ctx.arena.get(slot) {
                        Some(particle) => (
                            resolve_vec3(offset, particle.context()),
                            resolve_vec3(half_dimensions, particle.context()),
                            resolve_custom(direction, particle.context()),
                        ),
                        None => (Vec3::ZERO, Vec3::ZERO, None),
                    };
                    let local = sample_box(half, *surface_only, ctx.rng);
                    let dir = directed(custom, local, direction);
                    self.spawn_sampled(slot, (offset_v + local).as_dvec3(), dir.as_dvec3(), ctx);
                }
            }
            EmitterShape::Disc {
                normal,
                offset,
                radius,
                surface_only,
                direction,
            } => {
                // The plane normal resolves once against the emitter
                // context; everything else is per particle.
                let mut n = resolve_vec3(normal, &self.ctx);
                let len = n.length();
                if len > 0.0 {
                    n /= len;
                }
                let quat = Quat::from_euler(EulerRot::ZYX, n.z.atan(), n.y.atan(), n.x.atan());
                for _ in 0..count {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let (offset_v, radius_v, custom) = match ctx.arena.get(slot) {
                        Some(particle) => (
                            resolve_vec3(offset, particle.context()),
                            radius.resolve(particle.context()),
                            resolve_custom(direction, particle.context()),
                        ),
                        None => (Vec3::ZERO, 0.0, None),
                    };
                    let r = if *surface_only {
                        radius_v
                    } else {
                        radius_v * ctx.rng.gen::<f32>().sqrt()
                    };
                    let theta = TAU * ctx.rng.gen::<f32>();
                    let local = quat * Vec3::new(r * theta.cos(), 0.0, r * theta.sin());
                    let dir = match custom {
                        Some(d) => quat * d,
                        None => match direction {
                            ShapeDirection::Inwards => -local,
                            _ => local,
                        },
                    };
                    self.spawn_sampled(slot, (offset_v + local).as_dvec3(), dir.as_dvec3(), ctx);
                }
            }
            EmitterShape::EntityBounds {
                surface_only,
                direction,
            } => {
                let bounds = self.provider.bounds();
                for _ in 0..count {
                    let slot = self.obtain_particle(self.transform.position, ctx);
                    let custom = match ctx.arena.get(slot) {
                        Some(particle) => resolve_custom(direction, particle.context()),
                        None => None,
                    };
                    match bounds {
                        Some(bounds) => {
                            let radius = (bounds.max - bounds.min) * 0.5;
                            let center = bounds.min + radius;
                            let half = radius.as_vec3();
                            let local = sample_box(half, *surface_only, ctx.rng);
                            let dir = directed(custom, local, direction);
                            self.spawn_sampled(
                                slot,
                                center + local.as_dvec3(),
                                dir.as_dvec3(),
                                ctx,
                            );
                        }
                        None => {
                            let dir = custom.unwrap_or(Vec3::ZERO);
                            self.spawn_sampled(slot, DVec3::ZERO, dir.as_dvec3(), ctx);
                        }
                    }
                }
            }
        }
    }

    /// Shared tail of every shaped spawn: place, launch, apply initial
    /// speed, snap the render anchor, and hand the slot to the system.
    fn spawn_sampled(
        &mut self,
        slot: usize,
        local_pos: DVec3,
        local_dir: DVec3,
        ctx: &mut EmitterCtx<'_>,
    ) {
        let view = self.view();
        if let Some(particle) = ctx.arena.get_mut(slot) {
            self.place_particle(particle, local_pos);
            self.launch_particle(particle, local_dir);
            particle.apply_initial_speed(&view);
            particle.sync_prev();
        }
        ctx.out.push(slot);
        self.on_particle_spawned();
    }

    /// Sampled offsets scale with the emitter and rotate into its frame
    /// when position or rotation is emitter-local.
    fn place_particle(&self, particle: &mut Particle, local: DVec3) {
        let scaled = local * f64::from(self.transform.scale);
        let space = self.def.local_space;
        let rotated = if space.position || space.rotation {
            self.transform.basis.rotate_dvec(scaled)
        } else {
            scaled
        };
        particle.set_position(self.transform.position + rotated);
    }

    /// Sampled directions scale and rotate like offsets, then inherit
    /// the emitter's movement this tick.
    fn launch_particle(&self, particle: &mut Particle, local: DVec3) {
        let scaled = local * f64::from(self.transform.scale);
        let space = self.def.local_space;
        let rotated = if space.velocity || space.rotation {
            self.transform.basis.rotate_dvec(scaled)
        } else {
            scaled
        };
        particle.set_velocity(rotated + self.delta);
    }

    /// Pull a slot from the recycling pool, or create a fresh particle
    /// in the arena. Either way the particle starts a new life at
    /// `position`.
    fn obtain_particle(&mut self, position: DVec3, ctx: &mut EmitterCtx<'_>) -> usize {
        let view = self.view();
        if let Some(slot) = self.pool.pop() {
            ctx.on_pool_borrow();
            let world = ctx.world;
            let mut scope = EventScope {
                world,
                requests: &mut *ctx.requests,
                rng: &mut *ctx.rng,
            };
            if let Some(particle) = ctx.arena.get_mut(slot) {
                particle.reset(position, &view, &mut scope);
                return slot;
            }
        }
        let particle = {
            let mut scope = ctx.scope();
            Particle::new(
                Arc::clone(&self.def),
                self.id,
                position,
                &view,
                &mut scope,
            )
        };
        ctx.arena.insert(particle)
    }

    fn apply_lifetime_logic(&mut self, ctx: &mut EmitterCtx<'_>) {
        let def = Arc::clone(&self.def);
        match &def.emitter_lifetime {
            Some(EmitterLifetime::Expression {
                activation,
                expiration,
            }) => {
                let active = activation.resolve_bool(&self.ctx);
                self.lifetime = if active { f32::MAX } else { 0.0 };
                if expiration.resolve_bool(&self.ctx) {
                    self.expire(ctx);
                }
            }
            Some(EmitterLifetime::Looping { .. }) => {
                self.lifetime = self.active_time;
                if !self.is_active() {
                    if self.sleep_remaining > 0.0 {
                        self.sleep_remaining -= TICK_SECONDS;
                    } else {
                        self.restart_loop(ctx);
                    }
                }
            }
            Some(EmitterLifetime::Once { active_time }) => {
                if self.active_time <= 0.0 {
                    self.active_time = active_time.resolve(&self.ctx).max(0.0);
                }
                self.lifetime = self.active_time;
                if !self.is_active() {
                    self.expire(ctx);
                }
            }
            None => {}
        }
    }

    /// Begin a new looping cycle: age rewinds, cycle values re-resolve,
    /// randoms reseed, and the creation hooks fire again. This is the
    /// only path that brings an expired emitter back.
    fn restart_loop(&mut self, ctx: &mut EmitterCtx<'_>) {
        let def = Arc::clone(&self.def);
        let Some(EmitterLifetime::Looping {
            active_time,
            sleep_time,
        }) = &def.emitter_lifetime
        else {
            return;
        };
        self.age = 0.0;
        self.active_time = active_time.resolve(&self.ctx).max(0.0);
        self.sleep_time = sleep_time.resolve(&self.ctx).max(0.0);
        self.sleep_remaining = self.sleep_time;
        self.ctx.seed_randoms(ctx.rng);
        self.ctx.emitter_randoms = self.ctx.randoms;
        self.instant_emitted = false;
        self.expired = false;
        self.max_particles_eval = 0;
        self.steady_remainder = 0.0;
        self.timeline_cursor = 0;
        self.update_context(0.0);
        if let Some(init) = &def.emitter_init {
            if let Some(expr) = &init.creation {
                expr.resolve(&self.ctx);
            }
        }
        let mut scope = ctx.scope();
        let anchor = EventAnchor::Emitter {
            transform: &self.transform,
            shared: &self.shared,
        };
        fire_named(
            &def,
            &def.emitter_events.creation,
            &anchor,
            &self.ctx,
            &mut scope,
        );
    }

    fn evaluate_lifetime_on_create(&mut self) {
        let def = Arc::clone(&self.def);
        match &def.emitter_lifetime {
            Some(EmitterLifetime::Once { active_time }) => {
                self.active_time = active_time.resolve(&self.ctx).max(0.0);
                self.lifetime = self.active_time;
            }
            Some(EmitterLifetime::Looping {
                active_time,
                sleep_time,
            }) => {
                self.active_time = active_time.resolve(&self.ctx).max(0.0);
                self.sleep_time = sleep_time.resolve(&self.ctx).max(0.0);
                self.sleep_remaining = self.sleep_time;
                self.lifetime = self.active_time;
            }
            _ => {}
        }
    }

    fn tick_timeline(&mut self, ctx: &mut EmitterCtx<'_>) {
        let def = Arc::clone(&self.def);
        while let Some(entry) = def.emitter_events.timeline.get(self.timeline_cursor) {
            if self.age < entry.time {
                break;
            }
            let mut scope = ctx.scope();
            let anchor = EventAnchor::Emitter {
                transform: &self.transform,
                shared: &self.shared,
            };
            fire_named(&def, &entry.events, &anchor, &self.ctx, &mut scope);
            self.timeline_cursor += 1;
        }
    }

    fn expire(&mut self, ctx: &mut EmitterCtx<'_>) {
        if self.expired {
            return;
        }
        self.expired = true;
        if !self.expiration_fired {
            self.expiration_fired = true;
            let def = Arc::clone(&self.def);
            let mut scope = ctx.scope();
            let anchor = EventAnchor::Emitter {
                transform: &self.transform,
                shared: &self.shared,
            };
            fire_named(
                &def,
                &def.emitter_events.expiration,
                &anchor,
                &self.ctx,
                &mut scope,
            );
        }
    }

    fn update_transform(&mut self, dt: f32) {
        self.last_position = self.transform.position;
        self.last_basis = self.transform.basis;
        self.provider.fill(&mut self.transform, dt);
        self.delta = self.transform.position - self.last_position;
    }

    /// Emitter context mirrors its own age into the particle slots so
    /// emitter-level expressions can use either name.
    fn update_context(&mut self, age: f32) {
        self.ctx.emitter_age = age;
        self.ctx.emitter_lifetime = self.lifetime;
        self.ctx.particle_age = age;
        self.ctx.particle_lifetime = self.lifetime;
        self.ctx.entity_scale = self.transform.scale;
        effect::evaluate_curves(&self.def.curves, &mut self.ctx);
    }

    fn is_active(&self) -> bool {
        self.age < self.lifetime
    }

    fn on_particle_spawned(&mut self) {
        self.active_particles += 1;
        self.spawned_any = true;
    }

    pub(crate) fn on_particle_expired(&mut self) {
        if self.active_particles > 0 {
            self.active_particles -= 1;
        }
    }

    /// Take a dying particle's slot into the pool. Returns `false` when
    /// either the per-emitter limit or the global pooled budget is full,
    /// leaving the slot to be released.
    pub(crate) fn try_recycle(&mut self, slot: usize, pooled: &mut u32, max_pooled: u32) -> bool {
        if !self.pool.has_room() || *pooled >= max_pooled {
            return false;
        }
        self.pool.push(slot);
        *pooled += 1;
        true
    }

    /// Give up every pooled slot; called when the emitter is removed
    pub(crate) fn drain_pool(&mut self) -> Vec<usize> {
        self.pool.drain()
    }

    pub(crate) fn view(&self) -> EmitterView {
        EmitterView {
            transform: self.transform,
            last_basis: self.last_basis,
            delta: self.delta,
            age: self.ctx.emitter_age,
            lifetime: self.ctx.emitter_lifetime,
            randoms: self.ctx.emitter_randoms,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.expired || self.active_particles > 0
    }

    pub(crate) fn has_spawned_particles(&self) -> bool {
        self.spawned_any
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn position(&self) -> DVec3 {
        self.transform.position
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn active_particles(&self) -> u32 {
        self.active_particles
    }

    pub fn definition(&self) -> &Arc<EffectDefinition> {
        &self.def
    }
}

fn resolve_custom(direction: &ShapeDirection, ctx: &ExpressionContext) -> Option<Vec3> {
    match direction {
        ShapeDirection::Custom(exprs) => Some(resolve_vec3(exprs, ctx)),
        _ => None,
    }
}

fn directed(custom: Option<Vec3>, radial: Vec3, direction: &ShapeDirection) -> Vec3 {
    match custom {
        Some(dir) => dir,
        None => match direction {
            ShapeDirection::Inwards => -radial,
            _ => radial,
        },
    }
}

/// Sample a point in an axis-aligned box. With `surface_only` the full
/// half-extents are kept, biasing samples toward the faces. Extents
/// draw before coordinates.
fn sample_box(half: Vec3, surface_only: bool, rng: &mut StdRng) -> Vec3 {
    let extent = if surface_only {
        half
    } else {
        Vec3::new(
            half.x * rng.gen::<f32>(),
            half.y * rng.gen::<f32>(),
            half.z * rng.gen::<f32>(),
        )
    };
    Vec3::new(
        (rng.gen::<f32>() * 2.0 - 1.0) * extent.x,
        (rng.gen::<f32>() * 2.0 - 1.0) * extent.y,
        (rng.gen::<f32>() * 2.0 - 1.0) * extent.z,
    )
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::effect::components::InitialSpeed;
    use crate::effect::events::{EffectEvent, SpawnType};
    use crate::expr::Expression;
    use crate::transform::StaticTransform;
    use crate::world::VoidWorld;

    struct Harness {
        arena: ParticleArena,
        out: Vec<usize>,
        requests: Vec<SpawnRequest>,
        pooled: u32,
        rng: StdRng,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                arena: ParticleArena::new(),
                out: Vec::new(),
                requests: Vec::new(),
                pooled: 0,
                rng: StdRng::seed_from_u64(21),
            }
        }

        fn ctx<'a>(&'a mut self, world: &'a VoidWorld) -> EmitterCtx<'a> {
            EmitterCtx {
                world,
                arena: &mut self.arena,
                out: &mut self.out,
                live_count: 0,
                max_active: 2000,
                pooled: &mut self.pooled,
                max_pooled: 768,
                requests: &mut self.requests,
                rng: &mut self.rng,
            }
        }
    }

    fn make_emitter(def: EffectDefinition, harness: &mut Harness, world: &VoidWorld) -> Emitter {
        let def = def.validated().unwrap();
        let mut ctx = harness.ctx(world);
        Emitter::new(
            1,
            def,
            Box::new(StaticTransform::at(DVec3::new(1.0, 2.0, 3.0))),
            0,
            &mut ctx,
        )
    }

    #[test]
    fn test_instant_burst_fires_once() {
        let mut def = EffectDefinition::new("test:burst");
        def.emitter_rate = Some(EmitterRate::instant(5.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        emitter.emit_initial(&mut ctx);
        assert_eq!(harness.out.len(), 5);
        assert_eq!(emitter.active_particles(), 5);
        assert!(emitter.has_spawned_particles());

        // Further ticks do not re-fire the burst
        let mut ctx = harness.ctx(&world);
        emitter.tick(&mut ctx);
        assert_eq!(harness.out.len(), 5);
    }

    #[test]
    fn test_missing_rate_bursts_once_and_expires() {
        let def = EffectDefinition::new("test:legacy");
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        emitter.emit_initial(&mut ctx);
        assert_eq!(harness.out.len(), 1);
        // Expired, but alive while its one particle is
        assert!(emitter.is_alive());
    }

    #[test]
    fn test_steady_rate_accumulates_fractional_spawns() {
        let mut def = EffectDefinition::new("test:steady");
        def.emitter_rate = Some(EmitterRate::steady(5.0, 50.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        // 5 per second at 20 Hz is one particle every 4 ticks
        for _ in 0..4 {
            let mut ctx = harness.ctx(&world);
            emitter.tick(&mut ctx);
        }
        assert_eq!(harness.out.len(), 1);
        for _ in 0..16 {
            let mut ctx = harness.ctx(&world);
            emitter.tick(&mut ctx);
        }
        assert_eq!(harness.out.len(), 5);
    }

    #[test]
    fn test_once_lifetime_expires_after_active_window() {
        let mut def = EffectDefinition::new("test:once");
        def.emitter_lifetime = Some(EmitterLifetime::once(0.2));
        def.emitter_rate = Some(EmitterRate::steady(0.0, 10.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        for _ in 0..4 {
            let mut ctx = harness.ctx(&world);
            assert!(emitter.tick(&mut ctx));
        }
        let mut ctx = harness.ctx(&world);
        assert!(!emitter.tick(&mut ctx));
    }

    #[test]
    fn test_looping_lifetime_restarts_burst_and_creation_events() {
        let mut def = EffectDefinition::new("test:loop");
        def.emitter_lifetime = Some(EmitterLifetime::looping(0.1, 0.05));
        def.emitter_rate = Some(EmitterRate::instant(2.0));
        def.events.insert(
            "announce".into(),
            EffectEvent::spawn("other:effect", SpawnType::Emitter),
        );
        def.emitter_events.creation = vec!["announce".into()];
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);
        // Creation events fired once at construction
        assert_eq!(harness.requests.len(), 1);

        // Active 2 ticks, asleep 1, restart on the 4th
        for _ in 0..4 {
            let mut ctx = harness.ctx(&world);
            emitter.tick(&mut ctx);
        }
        assert_eq!(harness.out.len(), 4);
        assert_eq!(harness.requests.len(), 2);
    }

    #[test]
    fn test_recycled_slot_is_reused() {
        let mut def = EffectDefinition::new("test:recycle");
        def.emitter_rate = Some(EmitterRate::instant(1.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        emitter.emit_initial(&mut ctx);
        let slot = harness.out[0];
        assert_eq!(harness.arena.occupied(), 1);

        emitter.on_particle_expired();
        assert!(emitter.try_recycle(slot, &mut harness.pooled, 768));
        assert_eq!(harness.pooled, 1);

        // The next emission reuses the pooled slot instead of growing
        // the arena.
        let mut ctx = harness.ctx(&world);
        emitter.emit_particles(1, 10, &mut ctx);
        assert_eq!(harness.out.last(), Some(&slot));
        assert_eq!(harness.arena.occupied(), 1);
        assert_eq!(harness.pooled, 0);
    }

    #[test]
    fn test_shape_samples_stay_inside_sphere() {
        let mut def = EffectDefinition::new("test:sphere");
        def.emitter_rate = Some(EmitterRate::instant(32.0));
        def.emitter_shape = Some(EmitterShape::Sphere {
            offset: Default::default(),
            radius: Expression::constant(2.0),
            surface_only: false,
            direction: ShapeDirection::Outwards,
        });
        def.initial_speed = Some(InitialSpeed::uniform(1.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        emitter.emit_initial(&mut ctx);
        assert_eq!(harness.out.len(), 32);
        let center = DVec3::new(1.0, 2.0, 3.0);
        for &slot in harness.out.iter() {
            let particle = harness.arena.get(slot).unwrap();
            let distance = (particle.position() - center).length();
            assert!(distance <= 2.0 + 1e-5, "distance {distance} out of range");
        }
    }

    #[test]
    fn test_emitter_budget_clamps_emission() {
        let mut def = EffectDefinition::new("test:clamp");
        def.emitter_rate = Some(EmitterRate::instant(50.0));
        let world = VoidWorld;
        let mut harness = Harness::new();
        let mut emitter = make_emitter(def, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        ctx.live_count = 1995;
        ctx.max_active = 2000;
        emitter.emit_initial(&mut ctx);
        assert_eq!(harness.out.len(), 5);
    }
}
