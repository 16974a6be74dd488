use serde::{Deserialize, Serialize};

use crate::expr::{Expression, ExpressionContext};

/// Interpolation scheme of a curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    Linear,
    Bezier,
    BezierChain,
    CatmullRom,
}

/// Tangent data carried by bezier-chain nodes
#[derive(Debug, Clone)]
pub struct ChainTangents {
    pub left_value: Expression,
    pub right_value: Expression,
    pub left_slope: Expression,
    pub right_slope: Expression,
}

/// One control point. `value` doubles as the left value for chain nodes.
#[derive(Debug, Clone)]
pub struct CurveNode {
    pub time: f32,
    pub value: Expression,
    pub tangents: Option<ChainTangents>,
}

impl CurveNode {
    pub fn value(time: f32, value: impl Into<Expression>) -> Self {
        CurveNode {
            time,
            value: value.into(),
            tangents: None,
        }
    }

    pub fn chain(
        time: f32,
        left_value: impl Into<Expression>,
        right_value: impl Into<Expression>,
        left_slope: impl Into<Expression>,
        right_slope: impl Into<Expression>,
    ) -> Self {
        let left_value = left_value.into();
        CurveNode {
            time,
            value: left_value.clone(),
            tangents: Some(ChainTangents {
                left_value,
                right_value: right_value.into(),
                left_slope: left_slope.into(),
                right_slope: right_slope.into(),
            }),
        }
    }
}

/// A named piecewise function over a normalized input.
///
/// `input` and `horizontal_range` are resolved per evaluation; node values
/// are expressions too, so a curve can track live context state.
#[derive(Debug, Clone)]
pub struct Curve {
    pub kind: CurveType,
    pub nodes: Vec<CurveNode>,
    pub input: Expression,
    pub horizontal_range: Expression,
}

impl Curve {
    pub fn new(kind: CurveType, nodes: Vec<CurveNode>, input: impl Into<Expression>) -> Self {
        Curve {
            kind,
            nodes,
            input: input.into(),
            horizontal_range: Expression::one(),
        }
    }

    pub fn with_horizontal_range(mut self, range: impl Into<Expression>) -> Self {
        self.horizontal_range = range.into();
        self
    }

    /// Synthesized node time for position `i` of `len` equally spaced
    /// nodes, matching the array form of curve definitions. Catmull-Rom
    /// pads one node at each end; the leading pad clamps to time 0, the
    /// trailing pad runs past 1. Padding times are never read during
    /// evaluation, only their values are.
    pub fn uniform_node_time(kind: CurveType, i: usize, len: usize) -> f32 {
        let offset = if kind == CurveType::CatmullRom { 1 } else { 0 };
        let denom = len as i32 - offset * 2 - 1;
        if denom <= 0 {
            return 0.0;
        }
        (i as i32 - offset).max(0) as f32 / denom as f32
    }

    /// Evaluate this curve against `ctx`. Stateless: the result depends
    /// only on the curve and the context slots.
    pub fn evaluate(&self, ctx: &ExpressionContext) -> f32 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let range = self.horizontal_range.resolve(ctx);
        if range == 0.0 {
            // Degenerate curve reads as constant max
            return 1.0;
        }
        let input = self.input.resolve(ctx) / range;
        let index = self.node_index(input);
        match self.kind {
            CurveType::Linear => self.eval_linear(ctx, index, input),
            CurveType::Bezier => self.eval_bezier(ctx, input),
            CurveType::BezierChain => self.eval_bezier_chain(ctx, index, input),
            CurveType::CatmullRom => self.eval_catmull_rom(ctx, index, input),
        }
    }

    /// Last node whose time is <= input, scanning ascending. Catmull-Rom
    /// skips the padding node at each end.
    fn node_index(&self, input: f32) -> usize {
        let offset = if self.kind == CurveType::CatmullRom { 1 } else { 0 };
        let mut best = offset;
        let end = self.nodes.len().saturating_sub(offset * 2);
        for (i, node) in self.nodes.iter().enumerate().take(end).skip(offset) {
            if node.time > input {
                break;
            }
            best = i;
        }
        best
    }

    fn eval_linear(&self, ctx: &ExpressionContext, index: usize, input: f32) -> f32 {
        if self.nodes.len() == 1 {
            return self.nodes[0].value.resolve(ctx);
        }
        let current = &self.nodes[index];
        let next = self.nodes.get(index + 1).unwrap_or(current);
        let a = current.value.resolve(ctx);
        let b = next.value.resolve(ctx);
        let denom = next.time - current.time;
        let progress = if denom == 0.0 {
            0.0
        } else {
            (input - current.time) / denom
        };
        lerp(progress, a, b)
    }

    fn eval_bezier(&self, ctx: &ExpressionContext, input: f32) -> f32 {
        if self.nodes.len() < 4 {
            return input;
        }
        bezier(
            self.nodes[0].value.resolve(ctx),
            self.nodes[1].value.resolve(ctx),
            self.nodes[2].value.resolve(ctx),
            self.nodes[3].value.resolve(ctx),
            input,
        )
    }

    fn eval_bezier_chain(&self, ctx: &ExpressionContext, index: usize, input: f32) -> f32 {
        let current = match self.nodes[index].tangents.as_ref() {
            Some(tangents) => tangents,
            None => return input,
        };
        let (next_time, next) = match self.nodes.get(index + 1) {
            Some(node) => match node.tangents.as_ref() {
                Some(tangents) => (node.time, tangents),
                None => return current.right_value.resolve(ctx),
            },
            None => return current.right_value.resolve(ctx),
        };
        let current_time = self.nodes[index].time;
        // Hermite tangents become bezier control points at a third of the
        // segment span
        let step = (next_time - current_time) / 3.0;
        let a = current.right_value.resolve(ctx);
        let b = a + step * current.right_slope.resolve(ctx);
        let d = next.left_value.resolve(ctx);
        let c = d - step * next.left_slope.resolve(ctx);
        let denom = next_time - current_time;
        let progress = if denom == 0.0 {
            0.0
        } else {
            (input - current_time) / denom
        };
        bezier(a, b, c, d, progress)
    }

    fn eval_catmull_rom(&self, ctx: &ExpressionContext, index: usize, input: f32) -> f32 {
        if self.nodes.len() < 4 || index < 1 || index + 2 >= self.nodes.len() {
            return input;
        }
        let a = self.nodes[index - 1].value.resolve(ctx);
        let b = self.nodes[index].value.resolve(ctx);
        let c = self.nodes[index + 1].value.resolve(ctx);
        let d = self.nodes[index + 2].value.resolve(ctx);
        let denom = self.nodes[index + 1].time - self.nodes[index].time;
        let progress = if denom == 0.0 {
            0.0
        } else {
            (input - self.nodes[index].time) / denom
        };
        catmull_rom(a, b, c, d, progress.clamp(0.0, 1.0))
    }
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + (b - a) * t
}

fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let inv = 1.0 - t;
    inv * inv * inv * p0 + 3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t * p3
}

fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t * t * t)
}
