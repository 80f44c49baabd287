//! Forward and reverse passes over fixed node sets.
//!
//! An [`ExpressionGraph`] is the topologically sorted list of non-leaf nodes
//! reachable from a set of roots, computed once and replayed every time the
//! leaves change. [`RowGraph`] is the per-root variant used by the reverse
//! pass of a Jacobian row: it records the nodes to sweep and where each
//! reachable leaf's adjoint lands in the row's value buffer.
//!
//! [`symbolic_gradient`] runs the reverse pass on expressions instead of
//! numbers, which is how Hessians are obtained (as the Jacobian of a
//! gradient).

use std::collections::HashMap;

use super::context::{Arena, Context, NodeId};
use super::expression_type::ExpressionType;
use super::opcode::{self, OpCode};
use super::variable::Variable;

/// Replayable forward pass over every non-leaf node reachable from a set of roots.
#[derive(Debug)]
pub struct ExpressionGraph {
    ctx: Context,
    nodes: Vec<NodeId>,
    // Keeps every node in `nodes` alive.
    _roots: Vec<Variable>,
}

impl ExpressionGraph {
    /// Build the graph for `roots`. All roots must share one context.
    pub fn new(ctx: &Context, roots: &[Variable]) -> Self {
        let ids: Vec<NodeId> = roots.iter().map(Variable::id).collect();
        let nodes = {
            let arena = ctx.arena();
            arena
                .topological_subgraph(&ids)
                .into_iter()
                .filter(|&id| !arena.node(id).op.is_leaf())
                .collect()
        };
        Self {
            ctx: ctx.clone(),
            nodes,
            _roots: roots.to_vec(),
        }
    }

    /// Recompute every node value from the current leaf values.
    pub fn update_values(&self) {
        let mut arena = self.ctx.arena_mut();
        arena.invalidate();
        for &id in &self.nodes {
            arena.evaluate(id);
        }
    }

    /// Number of non-leaf nodes swept per pass.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Reverse-pass plan for a single root.
#[derive(Debug, Clone)]
pub(crate) struct RowGraph {
    pub root: NodeId,
    /// Every reachable node, operands first.
    pub nodes: Vec<NodeId>,
    /// `(leaf, index into the output buffer)` for each differentiated leaf.
    pub leaves: Vec<(NodeId, usize)>,
    pub ty: ExpressionType,
}

impl RowGraph {
    /// Plan the reverse pass of `root`, keeping leaves that `column_of` maps
    /// to a column accepted by `keep`. Returns the plan and the kept columns
    /// in ascending order; output slots are numbered from `first_slot`.
    pub fn new(
        arena: &Arena,
        root: NodeId,
        column_of: &HashMap<NodeId, usize>,
        keep: impl Fn(usize) -> bool,
        first_slot: usize,
    ) -> (Self, Vec<usize>) {
        let nodes = arena.topological_subgraph(&[root]);
        let mut cols: Vec<(usize, NodeId)> = nodes
            .iter()
            .filter_map(|id| column_of.get(id).map(|&col| (col, *id)))
            .filter(|&(col, _)| keep(col))
            .collect();
        cols.sort_unstable();
        cols.dedup_by_key(|c| c.0);

        let leaves = cols
            .iter()
            .enumerate()
            .map(|(k, &(_, id))| (id, first_slot + k))
            .collect();
        let graph = Self {
            root,
            nodes,
            leaves,
            ty: arena.node(root).ty,
        };
        (graph, cols.into_iter().map(|(col, _)| col).collect())
    }

    /// Numeric reverse pass. Node values must be current.
    pub fn reverse(&self, arena: &mut Arena, out: &mut [f64]) {
        for &id in &self.nodes {
            arena.node_mut(id).adjoint = 0.0;
        }
        arena.node_mut(self.root).adjoint = 1.0;

        for &id in self.nodes.iter().rev() {
            let node = arena.node(id);
            if node.op.is_leaf() || node.adjoint == 0.0 {
                continue;
            }
            let (op, args, r, adjoint) = (node.op, node.args, node.value, node.adjoint);
            let a = args[0].map_or(0.0, |a| arena.value(a));
            let b = args[1].map_or(0.0, |b| arena.value(b));
            let (da, db) = opcode::reverse_partials(op, a, b, r);
            if let Some(a) = args[0] {
                arena.node_mut(a).adjoint += adjoint * da;
            }
            if let Some(b) = args[1] {
                arena.node_mut(b).adjoint += adjoint * db;
            }
        }

        for &(leaf, slot) in &self.leaves {
            out[slot] = arena.node(leaf).adjoint;
        }
    }
}

/// Local partials of `r = op(a, b)` as expressions; `None` means zero.
fn symbolic_partials(
    ctx: &Context,
    op: OpCode,
    a: &Variable,
    b: Option<&Variable>,
    r: &Variable,
) -> [Option<Variable>; 2] {
    let one = || ctx.constant(1.0);
    let b_or_zero = || b.cloned().unwrap_or_else(|| ctx.constant(0.0));
    match op {
        OpCode::Input | OpCode::Const | OpCode::Signum => [None, None],

        OpCode::Add => [Some(one()), Some(one())],
        OpCode::Sub => [Some(one()), Some(ctx.constant(-1.0))],
        OpCode::Mul => [Some(b_or_zero()), Some(a.clone())],
        OpCode::Div => {
            let b = b_or_zero();
            [Some(1.0 / &b), Some(-(r / &b))]
        }
        OpCode::Pow => {
            let b = b_or_zero();
            let da = &b * a.pow(&(&b - 1.0));
            let db = b.const_value().is_none().then(|| r * a.ln());
            [Some(da), db]
        }
        OpCode::Atan2 => {
            let b = b_or_zero();
            let denom = a * a + &b * &b;
            [Some(&b / &denom), Some(-(a / &denom))]
        }
        OpCode::Hypot => [Some(a / r), Some(b_or_zero() / r)],

        OpCode::Neg => [Some(ctx.constant(-1.0)), None],
        OpCode::Abs => [Some(a.signum()), None],
        OpCode::Sqrt => [Some(0.5 / r), None],
        OpCode::Exp => [Some(r.clone()), None],
        OpCode::Ln => [Some(1.0 / a), None],
        OpCode::Log10 => [Some(1.0 / (a * std::f64::consts::LN_10)), None],
        OpCode::Erf => [
            Some(std::f64::consts::FRAC_2_SQRT_PI * (-(a * a)).exp()),
            None,
        ],
        OpCode::Sin => [Some(a.cos()), None],
        OpCode::Cos => [Some(-a.sin()), None],
        OpCode::Tan => [Some(1.0 + r * r), None],
        OpCode::Asin => [Some(1.0 / (1.0 - a * a).sqrt()), None],
        OpCode::Acos => [Some(-1.0 / (1.0 - a * a).sqrt()), None],
        OpCode::Atan => [Some(1.0 / (1.0 + a * a)), None],
        OpCode::Sinh => [Some(a.cosh()), None],
        OpCode::Cosh => [Some(a.sinh()), None],
        OpCode::Tanh => [Some(1.0 - r * r), None],
    }
}

/// Gradient of `expr` with respect to `wrt`, as expressions.
///
/// Runs one reverse pass that builds adjoint nodes instead of numbers.
/// Operands classified `Constant` are skipped, and the trivial-operand
/// elision in the arithmetic operators keeps adjoints of linear parts as
/// shared constants, so the result stays as sparse as the original graph.
pub fn symbolic_gradient(expr: &Variable, wrt: &[Variable]) -> Vec<Variable> {
    let ctx = expr.context().clone();

    struct Entry {
        id: NodeId,
        op: OpCode,
        args: [Option<NodeId>; 2],
        arg_types: [ExpressionType; 2],
    }

    let topo: Vec<Entry> = {
        let arena = ctx.arena();
        arena
            .topological_subgraph(&[expr.id()])
            .into_iter()
            .map(|id| {
                let node = arena.node(id);
                let ty = |arg: Option<NodeId>| arg.map_or(ExpressionType::None, |a| arena.node(a).ty);
                Entry {
                    id,
                    op: node.op,
                    args: node.args,
                    arg_types: [ty(node.args[0]), ty(node.args[1])],
                }
            })
            .collect()
    };
    let position: HashMap<NodeId, usize> = topo.iter().enumerate().map(|(k, e)| (e.id, k)).collect();

    let mut adjoints: Vec<Option<Variable>> = vec![None; topo.len()];
    if let Some(last) = adjoints.last_mut() {
        *last = Some(ctx.constant(1.0));
    }

    for k in (0..topo.len()).rev() {
        let entry = &topo[k];
        if entry.op.is_leaf() {
            continue;
        }
        let Some(adjoint) = adjoints[k].clone() else {
            continue;
        };

        let Some(a) = entry.args[0].map(|id| Variable::from_existing(&ctx, id)) else {
            continue;
        };
        let b = entry.args[1].map(|id| Variable::from_existing(&ctx, id));
        let r = Variable::from_existing(&ctx, entry.id);
        let partials = symbolic_partials(&ctx, entry.op, &a, b.as_ref(), &r);

        for (slot, partial) in partials.into_iter().enumerate() {
            let (Some(arg), Some(partial)) = (entry.args[slot], partial) else {
                continue;
            };
            if entry.arg_types[slot] == ExpressionType::Constant {
                continue;
            }
            let contribution = &adjoint * &partial;
            let p = position[&arg];
            adjoints[p] = Some(match adjoints[p].take() {
                Some(acc) => acc + contribution,
                None => contribution,
            });
        }
    }

    wrt.iter()
        .map(|w| {
            position
                .get(&w.id())
                .and_then(|&p| adjoints[p].clone())
                .unwrap_or_else(|| ctx.constant(0.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_pass_refreshes_values() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        let f = &x * &y + x.exp();
        let graph = ExpressionGraph::new(&ctx, &[f.clone()]);
        assert_eq!(graph.len(), 3);

        x.set_value(0.0);
        y.set_value(5.0);
        graph.update_values();
        assert_eq!(ctx.arena().value(f.id()), 1.0);
    }

    #[test]
    fn test_symbolic_gradient_values() {
        let ctx = Context::new();
        let x = ctx.input(0.7);
        let y = ctx.input(-1.3);
        let f = x.sin() * &y + (&x * &x).exp() / &y;
        let g = symbolic_gradient(&f, &[x.clone(), y.clone()]);

        let (xv, yv) = (0.7f64, -1.3f64);
        let dfdx = xv.cos() * yv + 2.0 * xv * (xv * xv).exp() / yv;
        let dfdy = xv.sin() - (xv * xv).exp() / (yv * yv);
        assert!((g[0].value() - dfdx).abs() < 1e-12);
        assert!((g[1].value() - dfdy).abs() < 1e-12);
    }

    #[test]
    fn test_symbolic_gradient_of_linear_is_constant() {
        let ctx = Context::new();
        let x = ctx.input(3.0);
        let y = ctx.input(4.0);
        let f = 2.0 * &x - &y + 7.0;
        let g = symbolic_gradient(&f, &[x.clone(), y.clone()]);
        assert_eq!(g[0].expression_type(), ExpressionType::Constant);
        assert_eq!(g[0].value(), 2.0);
        assert_eq!(g[1].value(), -1.0);
    }

    #[test]
    fn test_gradient_wrt_unrelated_leaf_is_zero() {
        let ctx = Context::new();
        let x = ctx.input(3.0);
        let z = ctx.input(4.0);
        let f = &x * &x;
        let g = symbolic_gradient(&f, &[z]);
        assert_eq!(g[0].value(), 0.0);
    }
}
