use glam::DVec3;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::effect::EffectDefinition;
use crate::expr::{Expression, ExpressionContext};
use crate::transform::{EmitterTransform, SharedTransform, StaticTransform, TransformProvider};
use crate::world::ParticleWorld;

/// Where an event-spawned sub-effect is anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnType {
    /// Snapshot of the firing emitter's transform at fire time
    Emitter,
    /// Live handle to the firing emitter's transform
    EmitterBound,
    /// Fixed point at the firing particle's position
    Particle,
    /// Same anchoring as `Particle`; velocity is not inherited
    ParticleWithVelocity,
}

/// One action a named event can perform. Events compose through
/// `Sequence` and `Random`.
#[derive(Debug, Clone)]
pub enum EffectEvent {
    /// Spawn another effect at the firing site. The optional expression
    /// is resolved against the firing context before the request is made.
    SpawnEffect {
        effect: String,
        spawn_type: SpawnType,
        pre_expression: Option<Expression>,
    },
    /// Request a sound at the firing site
    Sound { name: String },
    /// Resolve an expression for its side effects
    Expression(Expression),
    /// Emit a log line through the world sink
    Log(String),
    /// Run every entry in order
    Sequence(Vec<EffectEvent>),
    /// Run one entry picked by weight; a zero total weight runs nothing
    Random(Vec<WeightedEvent>),
}

impl EffectEvent {
    pub fn spawn(effect: impl Into<String>, spawn_type: SpawnType) -> Self {
        EffectEvent::SpawnEffect {
            effect: effect.into(),
            spawn_type,
            pre_expression: None,
        }
    }

    pub fn sound(name: impl Into<String>) -> Self {
        EffectEvent::Sound { name: name.into() }
    }
}

/// Entry of a `Random` event
#[derive(Debug, Clone)]
pub struct WeightedEvent {
    pub event: EffectEvent,
    pub weight: u32,
}

impl WeightedEvent {
    pub fn new(event: EffectEvent, weight: u32) -> Self {
        WeightedEvent { event, weight }
    }
}

/// Event hooks over a lifetime: names fired at creation, at expiration,
/// and along a timeline as age advances.
#[derive(Debug, Clone, Default)]
pub struct LifetimeEvents {
    pub creation: Vec<String>,
    pub expiration: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

/// Events fired once the owner's age reaches `time`
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub time: f32,
    pub events: Vec<String>,
}

impl TimelineEntry {
    pub fn new(time: f32, events: Vec<String>) -> Self {
        TimelineEntry { time, events }
    }
}

/// Spawn produced by an event. Queued on the system and serviced after
/// the tick loop releases the emitter and particle tables.
pub(crate) struct SpawnRequest {
    pub effect: String,
    pub provider: Box<dyn TransformProvider>,
}

/// Mutable surroundings available while an event runs.
pub(crate) struct EventScope<'a> {
    pub world: &'a dyn ParticleWorld,
    pub requests: &'a mut Vec<SpawnRequest>,
    pub rng: &'a mut StdRng,
}

/// The site an event fires from. Spawn anchoring and sound positions
/// derive from it.
pub(crate) enum EventAnchor<'a> {
    Emitter {
        transform: &'a EmitterTransform,
        shared: &'a SharedTransform,
    },
    Particle {
        position: DVec3,
        emitter: Option<&'a EmitterTransform>,
    },
}

impl EventAnchor<'_> {
    fn position(&self) -> DVec3 {
        match self {
            EventAnchor::Emitter { transform, .. } => transform.position,
            EventAnchor::Particle { position, .. } => *position,
        }
    }

    /// Transform provider for the requested spawn anchoring, or `None`
    /// when the anchoring cannot be satisfied from this site.
    ///
    /// Only an emitter site can hand out a live binding; a particle site
    /// downgrades emitter anchoring to a snapshot of its owner.
    fn provider_for(&self, spawn_type: SpawnType) -> Option<Box<dyn TransformProvider>> {
        match self {
            EventAnchor::Emitter { transform, shared } => match spawn_type {
                SpawnType::EmitterBound => Some(Box::new((*shared).clone())),
                _ => Some(Box::new(StaticTransform(**transform))),
            },
            EventAnchor::Particle { position, emitter } => match spawn_type {
                SpawnType::Emitter | SpawnType::EmitterBound => {
                    emitter.map(|t| Box::new(StaticTransform(*t)) as Box<dyn TransformProvider>)
                }
                SpawnType::Particle | SpawnType::ParticleWithVelocity => Some(Box::new(
                    StaticTransform(EmitterTransform::at(*position)),
                )),
            },
        }
    }
}

/// Runs every named event found in the definition's event table.
/// Unknown names are skipped.
pub(crate) fn fire_named(
    def: &EffectDefinition,
    names: &[String],
    anchor: &EventAnchor<'_>,
    ctx: &ExpressionContext,
    scope: &mut EventScope<'_>,
) {
    for name in names {
        if let Some(event) = def.events.get(name) {
            execute(event, anchor, ctx, scope);
        }
    }
}

pub(crate) fn execute(
    event: &EffectEvent,
    anchor: &EventAnchor<'_>,
    ctx: &ExpressionContext,
    scope: &mut EventScope<'_>,
) {
    match event {
        EffectEvent::SpawnEffect {
            effect,
            spawn_type,
            pre_expression,
        } => {
            if let Some(expr) = pre_expression {
                expr.resolve(ctx);
            }
            if let Some(provider) = anchor.provider_for(*spawn_type) {
                scope.requests.push(SpawnRequest {
                    effect: effect.clone(),
                    provider,
                });
            }
        }
        EffectEvent::Sound { name } => scope.world.play_sound(name, anchor.position()),
        EffectEvent::Expression(expr) => {
            expr.resolve(ctx);
        }
        EffectEvent::Log(message) => scope.world.log_message(message),
        EffectEvent::Sequence(entries) => {
            for entry in entries {
                execute(entry, anchor, ctx, scope);
            }
        }
        EffectEvent::Random(entries) => {
            let total: u64 = entries.iter().map(|e| u64::from(e.weight)).sum();
            if total == 0 {
                return;
            }
            let mut roll = scope.rng.gen_range(0..total);
            for entry in entries {
                let weight = u64::from(entry.weight);
                if roll < weight {
                    execute(&entry.event, anchor, ctx, scope);
                    break;
                }
                roll -= weight;
            }
        }
    }
}
