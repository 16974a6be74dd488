use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use rand::Rng;
use rustc_hash::FxHashMap;

/// Number of independent `random_N` slots exposed per scope
pub const RANDOM_SLOTS: usize = 16;

/// An opaque numeric expression.
///
/// Compilation lives outside this crate; an expression is just something
/// that yields a float for a given [`ExpressionContext`]. Effect loaders
/// hand the engine compiled expressions, tests build them from closures.
#[derive(Clone)]
pub struct Expression(Repr);

#[derive(Clone)]
enum Repr {
    Constant(f32),
    Dynamic(Arc<dyn Fn(&ExpressionContext) -> f32 + Send + Sync>),
}

impl Expression {
    /// Expression that always yields `value`
    pub fn constant(value: f32) -> Self {
        Expression(Repr::Constant(value))
    }

    /// Expression computed from the context at every resolve
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ExpressionContext) -> f32 + Send + Sync + 'static,
    {
        Expression(Repr::Dynamic(Arc::new(f)))
    }

    pub fn zero() -> Self {
        Expression::constant(0.0)
    }

    pub fn one() -> Self {
        Expression::constant(1.0)
    }

    /// Evaluate against a context. Never fails; a misbehaving expression
    /// is expected to return its own safe default.
    pub fn resolve(&self, ctx: &ExpressionContext) -> f32 {
        match &self.0 {
            Repr::Constant(v) => *v,
            Repr::Dynamic(f) => f(ctx),
        }
    }

    /// Nonzero test, the boolean convention of the expression language
    pub fn resolve_bool(&self, ctx: &ExpressionContext) -> bool {
        self.resolve(ctx) != 0.0
    }
}

impl Default for Expression {
    fn default() -> Self {
        Expression::zero()
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Constant(v) => write!(f, "Expression({v})"),
            Repr::Dynamic(_) => write!(f, "Expression(<dynamic>)"),
        }
    }
}

impl From<f32> for Expression {
    fn from(value: f32) -> Self {
        Expression::constant(value)
    }
}

/// Resolve an expression triple into a vector
pub fn resolve_vec3(exprs: &[Expression; 3], ctx: &ExpressionContext) -> Vec3 {
    Vec3::new(
        exprs[0].resolve(ctx),
        exprs[1].resolve(ctx),
        exprs[2].resolve(ctx),
    )
}

/// Everything an expression may read, owned by the particle or emitter it
/// describes and passed by reference to every resolve. There is no hidden
/// shared environment; whoever triggers a resolve is responsible for
/// having refreshed the slots first.
#[derive(Debug, Clone)]
pub struct ExpressionContext {
    /// Seconds this particle has lived (emitters mirror their own age here)
    pub particle_age: f32,
    /// Seconds this particle will live
    pub particle_lifetime: f32,
    /// Seconds the owning emitter has lived
    pub emitter_age: f32,
    /// Seconds the owning emitter will live in its current cycle
    pub emitter_lifetime: f32,
    /// Primary per-life random draw, equal to `random[0]`
    pub random: f32,
    /// Per-life random draws, seeded at creation/reset
    pub randoms: [f32; RANDOM_SLOTS],
    /// Emitter-scoped random draws, copied from the owning emitter
    pub emitter_randoms: [f32; RANDOM_SLOTS],
    /// Scale of the bound entity (1.0 when unbound)
    pub entity_scale: f32,
    /// Last evaluated value per named curve
    curve_values: FxHashMap<String, f32>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        ExpressionContext {
            particle_age: 0.0,
            particle_lifetime: 0.0,
            emitter_age: 0.0,
            emitter_lifetime: 0.0,
            random: 0.0,
            randoms: [0.0; RANDOM_SLOTS],
            emitter_randoms: [0.0; RANDOM_SLOTS],
            entity_scale: 1.0,
            curve_values: FxHashMap::default(),
        }
    }

    /// Draw fresh values for every per-life random slot
    pub fn seed_randoms(&mut self, rng: &mut impl Rng) {
        for slot in self.randoms.iter_mut() {
            *slot = rng.gen::<f32>();
        }
        self.random = self.randoms[0];
    }

    /// Last computed value of a named curve (0.0 before first evaluation)
    pub fn curve(&self, name: &str) -> f32 {
        self.curve_values.get(name).copied().unwrap_or(0.0)
    }

    pub fn set_curve(&mut self, name: &str, value: f32) {
        // A definition's curve names are fixed, so after the first tick
        // every set is an in-place update.
        if let Some(slot) = self.curve_values.get_mut(name) {
            *slot = value;
        } else {
            self.curve_values.insert(name.to_owned(), value);
        }
    }

    pub fn clear_curves(&mut self) {
        self.curve_values.clear();
    }
}

impl Default for ExpressionContext {
    fn default() -> Self {
        ExpressionContext::new()
    }
}
