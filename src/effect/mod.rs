//! Effect definitions: the immutable description of a particle effect
//! that emitters and particles are instantiated from.

pub mod components;
pub mod events;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::curve::{Curve, CurveType};
use crate::expr::ExpressionContext;

pub use components::{
    Appearance, BlockExpiration, EmitterLifetime, EmitterRate, EmitterShape, FacingMode,
    InitExpressions, InitialSpeed, InitialSpin, KillPlane, LocalSpace, MotionCollision,
    MotionDynamic, MotionParametric, ParticleLifetime, ShapeDirection,
};
pub use events::{EffectEvent, LifetimeEvents, SpawnType, TimelineEntry, WeightedEvent};

/// A curve bound to the context slot `name`
#[derive(Debug, Clone)]
pub struct NamedCurve {
    pub name: String,
    pub curve: Curve,
}

/// Definition rejected by [`EffectDefinition::validated`]
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("curve '{name}': bezier curves need exactly 4 nodes, got {count}")]
    BezierNodeCount { name: String, count: usize },
    #[error("curve '{name}': bezier chain node at t={time} has no tangents")]
    MissingChainTangents { name: String, time: f32 },
}

/// Complete description of one effect. Definitions are built once,
/// validated, and shared between every emitter spawned from them.
#[derive(Debug, Clone, Default)]
pub struct EffectDefinition {
    /// Identifier the effect is registered and spawned under
    pub identifier: String,
    pub emitter_rate: Option<EmitterRate>,
    pub emitter_lifetime: Option<EmitterLifetime>,
    pub emitter_shape: Option<EmitterShape>,
    pub emitter_init: Option<InitExpressions>,
    pub local_space: LocalSpace,
    pub particle_init: Option<InitExpressions>,
    pub particle_lifetime: Option<ParticleLifetime>,
    pub initial_speed: Option<InitialSpeed>,
    pub initial_spin: Option<InitialSpin>,
    pub motion_dynamic: Option<MotionDynamic>,
    pub motion_parametric: Option<MotionParametric>,
    pub motion_collision: Option<MotionCollision>,
    pub kill_plane: Option<KillPlane>,
    pub block_expiration: BlockExpiration,
    pub appearance: Option<Appearance>,
    /// Evaluated in order each tick; later curves see earlier values
    pub curves: Vec<NamedCurve>,
    /// Named events referenced by timelines, collision and spawn events
    pub events: FxHashMap<String, EffectEvent>,
    pub emitter_events: LifetimeEvents,
    pub particle_events: LifetimeEvents,
    /// Particles drawn per emitter before pool recycling kicks in
    pub pool_limit: Option<u32>,
}

impl EffectDefinition {
    pub fn new(identifier: impl Into<String>) -> Self {
        EffectDefinition {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Checks structural rules, sorts curve nodes and timelines, and
    /// freezes the definition behind an [`Arc`] for sharing.
    pub fn validated(mut self) -> Result<Arc<Self>, DefinitionError> {
        for named in &mut self.curves {
            // Curve variables live in a namespace prefix that the
            // context drops, e.g. "variable.swirl" binds slot "swirl".
            if let Some(dot) = named.name.find('.') {
                named.name = named.name[dot + 1..].to_string();
            }
            named
                .curve
                .nodes
                .sort_by(|a, b| a.time.total_cmp(&b.time));
            match named.curve.kind {
                CurveType::Bezier if named.curve.nodes.len() != 4 => {
                    return Err(DefinitionError::BezierNodeCount {
                        name: named.name.clone(),
                        count: named.curve.nodes.len(),
                    });
                }
                CurveType::BezierChain => {
                    for node in &named.curve.nodes {
                        if node.tangents.is_none() {
                            return Err(DefinitionError::MissingChainTangents {
                                name: named.name.clone(),
                                time: node.time,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        self.emitter_events
            .timeline
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        self.particle_events
            .timeline
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Arc::new(self))
    }
}

/// Evaluates every curve against the context and writes the result into
/// its slot. Order matters: a curve may read slots written before it.
pub(crate) fn evaluate_curves(curves: &[NamedCurve], ctx: &mut ExpressionContext) {
    for named in curves {
        let value = named.curve.evaluate(ctx);
        ctx.set_curve(&named.name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Curve, CurveNode};
    use crate::expr::Expression;

    #[test]
    fn test_validated_sorts_curve_nodes() {
        let mut def = EffectDefinition::new("test:sorted");
        def.curves.push(NamedCurve {
            name: "variable.wave".into(),
            curve: Curve::new(
                CurveType::Linear,
                vec![
                    CurveNode::value(1.0, 3.0),
                    CurveNode::value(0.0, 1.0),
                    CurveNode::value(0.5, 2.0),
                ],
                Expression::constant(0.5),
            ),
        });
        let def = def.validated().unwrap();
        let times: Vec<f32> = def.curves[0].curve.nodes.iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        // Namespace prefix dropped from the slot name
        assert_eq!(def.curves[0].name, "wave");
    }

    #[test]
    fn test_validated_rejects_short_bezier() {
        let mut def = EffectDefinition::new("test:bad_bezier");
        def.curves.push(NamedCurve {
            name: "variable.b".into(),
            curve: Curve::new(
                CurveType::Bezier,
                vec![CurveNode::value(0.0, 0.0), CurveNode::value(1.0, 1.0)],
                Expression::constant(0.0),
            ),
        });
        assert!(matches!(
            def.validated(),
            Err(DefinitionError::BezierNodeCount { count: 2, .. })
        ));
    }

    #[test]
    fn test_validated_sorts_timelines() {
        let mut def = EffectDefinition::new("test:timeline");
        def.particle_events.timeline = vec![
            TimelineEntry {
                time: 0.8,
                events: vec!["late".into()],
            },
            TimelineEntry {
                time: 0.2,
                events: vec!["early".into()],
            },
        ];
        let def = def.validated().unwrap();
        assert_eq!(def.particle_events.timeline[0].events, vec!["early"]);
        assert_eq!(def.particle_events.timeline[1].events, vec!["late"]);
    }
}
