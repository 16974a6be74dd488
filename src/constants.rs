// Engine-wide constants. Every timing and budget rule in the simulation
// reads from here; do not define tick or budget constants anywhere else.

/// Fixed-timestep scheduling
pub mod tick {
    /// Simulation rate (ticks per second)
    pub const TICKS_PER_SECOND: f32 = 20.0;

    /// Seconds advanced per tick
    pub const TICK_SECONDS: f32 = 1.0 / TICKS_PER_SECOND;
}

/// Particle and pool budgets
pub mod budget {
    /// Hard cap on live particles across the whole system
    pub const MAX_ACTIVE_PARTICLES: u32 = 2000;

    /// Hard cap on pooled (retired, reusable) particle slots system-wide
    pub const MAX_POOLED_PARTICLES: u32 = 768;

    /// Per-emitter pool cap when the spawn request gives no override count
    pub const DEFAULT_PARTICLE_POOL_LIMIT: u32 = 96;
}

/// Normalization applied to expression-resolved motion values.
/// Definitions author accelerations in blocks/s^2 and drags in 1/s; the
/// simulation integrates in per-tick units.
pub mod motion {
    use super::tick::TICKS_PER_SECOND;

    /// blocks/s^2 -> blocks/tick^2 (divide by 400 at 20 Hz)
    pub const ACCELERATION_SCALE: f32 = 1.0 / (TICKS_PER_SECOND * TICKS_PER_SECOND);

    /// 1/s -> 1/tick (divide by 20 at 20 Hz)
    pub const PER_SECOND_SCALE: f32 = 1.0 / TICKS_PER_SECOND;
}
