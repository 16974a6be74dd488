//! A single live particle: kinematic state, its expression context, and
//! the per-tick motion pipeline.
//!
//! Particles integrate at a fixed 20 Hz step. Velocities and
//! accelerations are stored per tick; definition-level values in
//! per-second units are scaled once at resolve time.

use std::sync::Arc;

use glam::DVec3;

use crate::constants::motion::{ACCELERATION_SCALE, PER_SECOND_SCALE};
use crate::constants::tick::TICK_SECONDS;
use crate::effect::events::{fire_named, EventAnchor, EventScope};
use crate::effect::{self, EffectDefinition};
use crate::emitter::EmitterView;
use crate::expr::{resolve_vec3, ExpressionContext};
use crate::math::Aabb;
use crate::world::ParticleWorld;

/// Live particle state. Created by an emitter, owned by the system's
/// arena, and reset in place when drawn from a recycling pool.
#[derive(Debug)]
pub struct Particle {
    def: Arc<EffectDefinition>,
    emitter_id: u64,
    position: DVec3,
    prev_position: DVec3,
    velocity: DVec3,
    direction: DVec3,
    acceleration: DVec3,
    age: f32,
    lifetime: f32,
    roll: f32,
    prev_roll: f32,
    roll_velocity: f32,
    roll_acceleration: f32,
    timeline_cursor: usize,
    ctx: ExpressionContext,
}

impl Particle {
    pub(crate) fn new(
        def: Arc<EffectDefinition>,
        emitter_id: u64,
        position: DVec3,
        view: &EmitterView,
        scope: &mut EventScope<'_>,
    ) -> Self {
        let mut particle = Particle {
            def,
            emitter_id,
            position,
            prev_position: position,
            velocity: DVec3::ZERO,
            direction: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            age: 0.0,
            lifetime: 0.0,
            roll: 0.0,
            prev_roll: 0.0,
            roll_velocity: 0.0,
            roll_acceleration: 0.0,
            timeline_cursor: 0,
            ctx: ExpressionContext::new(),
        };
        particle.reset(position, view, scope);
        particle
    }

    /// Rewind this particle to a fresh life at `position`: kinematics
    /// zeroed, randoms reseeded, curve cache cleared, lifetime and spin
    /// re-resolved, creation hooks fired. Pool recycling funnels
    /// through here so a reused slot carries nothing over.
    pub(crate) fn reset(
        &mut self,
        position: DVec3,
        view: &EmitterView,
        scope: &mut EventScope<'_>,
    ) {
        self.position = position;
        self.prev_position = position;
        self.velocity = DVec3::ZERO;
        self.direction = DVec3::ZERO;
        self.acceleration = DVec3::ZERO;
        self.age = 0.0;
        self.roll = 0.0;
        self.prev_roll = 0.0;
        self.roll_velocity = 0.0;
        self.roll_acceleration = 0.0;
        self.timeline_cursor = 0;

        self.ctx.seed_randoms(scope.rng);
        self.ctx.clear_curves();
        self.ctx.particle_age = 0.0;
        self.copy_emitter_slots(view);

        // Lifetime resolves against the fresh randoms before the first
        // curve pass; missing or non-positive lifetimes become one second.
        self.lifetime = match &self.def.particle_lifetime {
            Some(lifetime) => {
                let value = lifetime.max_lifetime.resolve(&self.ctx);
                if value > 0.0 {
                    value
                } else {
                    1.0
                }
            }
            None => 1.0,
        };
        self.ctx.particle_lifetime = self.lifetime;
        self.update_context(0.0, view);

        let def = Arc::clone(&self.def);
        if let Some(init) = &def.particle_init {
            if let Some(expr) = &init.creation {
                expr.resolve(&self.ctx);
            }
        }
        let anchor = EventAnchor::Particle {
            position: self.position,
            emitter: Some(&view.transform),
        };
        fire_named(&def, &def.particle_events.creation, &anchor, &self.ctx, scope);

        if let Some(spin) = &def.initial_spin {
            self.roll = spin.rotation.resolve(&self.ctx);
            self.roll_velocity = spin.rotation_rate.resolve(&self.ctx) * PER_SECOND_SCALE;
        }
    }

    /// Scale the spawn direction by the initial speed expressions. The
    /// shape sampler sets the direction first; a particle spawned with
    /// no shape keeps zero velocity.
    pub(crate) fn apply_initial_speed(&mut self, view: &EmitterView) {
        let def = Arc::clone(&self.def);
        let Some(speed) = &def.initial_speed else {
            return;
        };
        self.update_context(self.age, view);
        let per_tick = (resolve_vec3(&speed.speed, &self.ctx) * PER_SECOND_SCALE).as_dvec3();
        let velocity = self.direction * per_tick;
        self.set_velocity(velocity);
    }

    /// Advance one tick. Returns `false` once the particle should be
    /// removed; the caller fires expiration through [`Particle::on_expired`].
    pub(crate) fn tick(&mut self, view: &EmitterView, scope: &mut EventScope<'_>) -> bool {
        let def = Arc::clone(&self.def);
        self.prev_position = self.position;
        self.prev_roll = self.roll;

        let local = def.local_space;
        if local.position {
            self.position += view.delta;
        }
        if local.rotation {
            self.apply_delta_rotation(view);
        }
        if local.velocity {
            self.apply_delta_rotation_to_velocity(view);
        }

        self.update_context(self.age, view);
        if let Some(init) = &def.particle_init {
            if let Some(expr) = &init.per_tick {
                expr.resolve(&self.ctx);
            }
        }
        if let Some(lifetime) = &def.particle_lifetime {
            if lifetime.expiration.resolve_bool(&self.ctx) {
                return false;
            }
        }
        self.tick_timeline(&def, view, scope);

        self.apply_parametric_motion(&def, view);
        self.apply_dynamic_motion(&def, view);
        self.velocity += self.acceleration;
        self.roll_velocity += self.roll_acceleration;
        self.roll += self.roll_velocity;

        let mut next = self.position + self.velocity;
        if let Some(collision) = &def.motion_collision {
            if collision.is_enabled(&self.ctx) && collision.radius > 0.0 {
                let radius = f64::from(collision.radius);
                let wanted = self.velocity;
                let mut moving = Aabb::from_center_radius(self.position, radius);
                let volumes = scope.world.collision_volumes(&moving.expand_towards(wanted));

                // Axis order matters: Y first so floor contact resolves
                // before sliding along walls.
                let mut d = wanted;
                for volume in &volumes {
                    d.y = volume.clip_y_offset(&moving, d.y);
                }
                moving = moving.offset(DVec3::new(0.0, d.y, 0.0));
                for volume in &volumes {
                    d.z = volume.clip_z_offset(&moving, d.z);
                }
                moving = moving.offset(DVec3::new(0.0, 0.0, d.z));
                for volume in &volumes {
                    d.x = volume.clip_x_offset(&moving, d.x);
                }

                let collide_y = d.y != wanted.y;
                let collided = d.x != wanted.x || collide_y || d.z != wanted.z;
                next = self.position + d;
                self.velocity = d;

                if collided {
                    let speed = self.velocity.length();
                    if speed > 0.0 {
                        let slowed = (speed - f64::from(collision.drag)).max(0.0);
                        self.velocity *= slowed / speed;
                    }
                    if collide_y {
                        self.velocity.y = -self.velocity.y * f64::from(collision.restitution);
                    }
                    let anchor = EventAnchor::Particle {
                        position: self.position,
                        emitter: Some(&view.transform),
                    };
                    fire_named(&def, &collision.events, &anchor, &self.ctx, scope);
                    if collision.expire_on_contact {
                        return false;
                    }
                }
            }
        }

        if let Some(plane) = &def.kill_plane {
            let base = view.transform.position;
            if plane.crossed(self.prev_position - base, next - base) {
                return false;
            }
        }
        self.position = next;
        if self.expires_in_current_block(&def, scope.world) {
            return false;
        }

        self.age += TICK_SECONDS;
        self.update_context(self.age, view);
        self.age < self.lifetime
    }

    /// Fires the expiration events. Called by the system after `tick`
    /// returns `false`, before the slot is recycled or released.
    pub(crate) fn on_expired(&self, view: &EmitterView, scope: &mut EventScope<'_>) {
        let anchor = EventAnchor::Particle {
            position: self.position,
            emitter: Some(&view.transform),
        };
        fire_named(
            &self.def,
            &self.def.particle_events.expiration,
            &anchor,
            &self.ctx,
            scope,
        );
    }

    fn tick_timeline(
        &mut self,
        def: &EffectDefinition,
        view: &EmitterView,
        scope: &mut EventScope<'_>,
    ) {
        while let Some(entry) = def.particle_events.timeline.get(self.timeline_cursor) {
            if self.age < entry.time {
                break;
            }
            let anchor = EventAnchor::Particle {
                position: self.position,
                emitter: Some(&view.transform),
            };
            fire_named(def, &entry.events, &anchor, &self.ctx, scope);
            self.timeline_cursor += 1;
        }
    }

    fn apply_parametric_motion(&mut self, def: &EffectDefinition, view: &EmitterView) {
        let Some(parametric) = &def.motion_parametric else {
            return;
        };
        if let Some(relative) = &parametric.relative_position {
            let local = resolve_vec3(relative, &self.ctx).as_dvec3();
            let offset = if def.local_space.position {
                view.transform.basis.rotate_dvec(local)
            } else {
                local
            };
            self.set_position(view.transform.position + offset);
        }
        if let Some(direction) = &parametric.direction {
            let local = resolve_vec3(direction, &self.ctx).as_dvec3();
            let direction = if def.local_space.velocity {
                view.transform.basis.rotate_dvec(local)
            } else {
                local
            };
            self.set_direction(direction);
        }
        self.roll = parametric.rotation.resolve(&self.ctx);
    }

    fn apply_dynamic_motion(&mut self, def: &EffectDefinition, view: &EmitterView) {
        let Some(dynamic) = &def.motion_dynamic else {
            self.acceleration = DVec3::ZERO;
            self.roll_acceleration = 0.0;
            return;
        };
        let mut accel = resolve_vec3(&dynamic.linear_acceleration, &self.ctx) * ACCELERATION_SCALE;
        if def.local_space.rotation {
            accel = view.transform.basis.rotate(accel);
        }
        let drag = f64::from(dynamic.linear_drag.resolve(&self.ctx) * PER_SECOND_SCALE);
        self.acceleration = accel.as_dvec3() - self.velocity * drag;

        let rot_accel = dynamic.rotation_acceleration.resolve(&self.ctx) * ACCELERATION_SCALE;
        let rot_drag = dynamic.rotation_drag.resolve(&self.ctx) * PER_SECOND_SCALE;
        self.roll_acceleration = rot_accel - rot_drag * self.roll_velocity;
    }

    /// Re-anchor after the emitter rotated: position orbits around the
    /// emitter by the delta between last tick's basis and this tick's.
    fn apply_delta_rotation(&mut self, view: &EmitterView) {
        let offset = self.position - view.transform.position;
        let local = view.last_basis.rotate_inverse_dvec(offset);
        self.position = view.transform.position + view.transform.basis.rotate_dvec(local);
    }

    fn apply_delta_rotation_to_velocity(&mut self, view: &EmitterView) {
        let local = view.last_basis.rotate_inverse_dvec(self.velocity);
        let rotated = view.transform.basis.rotate_dvec(local);
        self.set_velocity(rotated);
    }

    fn expires_in_current_block(&self, def: &EffectDefinition, world: &dyn ParticleWorld) -> bool {
        let rules = &def.block_expiration;
        if rules.is_empty() {
            return false;
        }
        let p = self.position.floor();
        let block = world.block_at(p.x as i32, p.y as i32, p.z as i32);
        if rules.expire_in.contains(&block) {
            return true;
        }
        !rules.expire_not_in.is_empty() && !rules.expire_not_in.contains(&block)
    }

    fn update_context(&mut self, age: f32, view: &EmitterView) {
        self.ctx.particle_age = age;
        self.copy_emitter_slots(view);
        effect::evaluate_curves(&self.def.curves, &mut self.ctx);
    }

    fn copy_emitter_slots(&mut self, view: &EmitterView) {
        self.ctx.emitter_age = view.age;
        self.ctx.emitter_lifetime = view.lifetime;
        self.ctx.emitter_randoms = view.randoms;
        self.ctx.entity_scale = view.transform.scale;
    }

    pub(crate) fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    /// Replace the velocity; direction follows the new vector.
    pub(crate) fn set_velocity(&mut self, velocity: DVec3) {
        self.velocity = velocity;
        self.set_direction(velocity);
    }

    /// Replace the travel direction, keeping the current speed.
    pub(crate) fn set_direction(&mut self, direction: DVec3) {
        let len = direction.length();
        self.direction = if len > 0.0 {
            direction / len
        } else {
            DVec3::ZERO
        };
        let speed = self.velocity.length();
        self.velocity = self.direction * speed;
    }

    /// Snap the interpolation anchor to the current state. Called right
    /// after spawn so the first rendered frame does not lerp from stale
    /// coordinates.
    pub(crate) fn sync_prev(&mut self) {
        self.prev_position = self.position;
        self.prev_roll = self.roll;
    }

    pub(crate) fn emitter_id(&self) -> u64 {
        self.emitter_id
    }

    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Position at the previous tick, for render interpolation
    pub fn prev_position(&self) -> DVec3 {
        self.prev_position
    }

    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Camera-plane rotation in degrees
    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn prev_roll(&self) -> f32 {
        self.prev_roll
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    /// Expression context as of the latest tick. Renderers resolve
    /// appearance expressions against this.
    pub fn context(&self) -> &ExpressionContext {
        &self.ctx
    }

    pub fn definition(&self) -> &Arc<EffectDefinition> {
        &self.def
    }
}
