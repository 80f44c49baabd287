//! Numeric evaluation of an NLP built from expressions.
//!
//! The evaluator owns the multiplier leaves `y` and `z`, the Lagrangian
//! `L = f − yᵀce − zᵀci`, and the derivative objects built once from it.
//! Two forward graphs exist: a primal one over `f`, `ce`, `ci` for line
//! search trials, and a full one that also covers the Lagrangian gradient
//! expressions differentiated by the Hessian.

use crate::autodiff::{sum_of, Context, ExpressionGraph, Gradient, Hessian, Jacobian, Variable};

pub(crate) struct NlpEvaluator {
    x: Vec<Variable>,
    y: Vec<Variable>,
    z: Vec<Variable>,
    cost: Variable,
    eq: Vec<Variable>,
    ineq: Vec<Variable>,

    primal_graph: ExpressionGraph,
    full_graph: ExpressionGraph,

    gradient: Gradient,
    eq_jacobian: Jacobian,
    ineq_jacobian: Jacobian,
    hessian: Hessian,
}

/// Values of cost and constraints at one point.
#[derive(Debug, Clone, Default)]
pub(crate) struct PrimalValues {
    pub cost: f64,
    pub eq: Vec<f64>,
    pub ineq: Vec<f64>,
}

impl PrimalValues {
    pub fn is_finite(&self) -> bool {
        self.cost.is_finite() && self.eq.iter().all(|v| v.is_finite()) && self.ineq.iter().all(|v| v.is_finite())
    }
}

impl NlpEvaluator {
    pub fn new(ctx: &Context, x: &[Variable], cost: &Variable, eq: &[Variable], ineq: &[Variable]) -> Self {
        let y: Vec<Variable> = eq.iter().map(|_| ctx.input(0.0)).collect();
        let z: Vec<Variable> = ineq.iter().map(|_| ctx.input(0.0)).collect();

        let lagrangian = {
            let terms = std::iter::once(cost.clone())
                .chain(y.iter().zip(eq).map(|(yi, ci)| -(yi * ci)))
                .chain(z.iter().zip(ineq).map(|(zi, ci)| -(zi * ci)));
            sum_of(ctx, terms)
        };

        let gradient = Gradient::new(cost, x);
        let eq_jacobian = Jacobian::new(eq, x);
        let ineq_jacobian = Jacobian::new(ineq, x);
        let hessian = Hessian::new(&lagrangian, x);

        let primal_roots: Vec<Variable> = std::iter::once(cost.clone())
            .chain(eq.iter().cloned())
            .chain(ineq.iter().cloned())
            .collect();
        let mut full_roots = primal_roots.clone();
        full_roots.extend(hessian.gradient().iter().cloned());

        Self {
            x: x.to_vec(),
            y,
            z,
            cost: cost.clone(),
            eq: eq.to_vec(),
            ineq: ineq.to_vec(),
            primal_graph: ExpressionGraph::new(ctx, &primal_roots),
            full_graph: ExpressionGraph::new(ctx, &full_roots),
            gradient,
            eq_jacobian,
            ineq_jacobian,
            hessian,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.x.len()
    }

    pub fn set_primal(&self, x: &[f64]) {
        for (v, &val) in self.x.iter().zip(x) {
            v.set_value(val);
        }
    }

    pub fn set_duals(&self, y: &[f64], z: &[f64]) {
        for (v, &val) in self.y.iter().zip(y) {
            v.set_value(val);
        }
        for (v, &val) in self.z.iter().zip(z) {
            v.set_value(val);
        }
    }

    fn read_values(&self) -> PrimalValues {
        PrimalValues {
            cost: self.cost.value(),
            eq: self.eq.iter().map(Variable::value).collect(),
            ineq: self.ineq.iter().map(Variable::value).collect(),
        }
    }

    /// Cost and constraints at the current leaf values.
    pub fn evaluate_primal(&self) -> PrimalValues {
        self.primal_graph.update_values();
        self.read_values()
    }

    /// Values plus gradient, both Jacobians and the Lagrangian Hessian at
    /// the current primal and dual leaf values.
    pub fn evaluate_all(&mut self) -> PrimalValues {
        self.full_graph.update_values();
        self.gradient.update_derivatives();
        self.eq_jacobian.update_derivatives();
        self.ineq_jacobian.update_derivatives();
        self.hessian.update_derivatives();
        self.read_values()
    }

    /// Values plus both constraint Jacobians; the Hessian is left stale.
    pub fn evaluate_constraints(&mut self) -> PrimalValues {
        self.primal_graph.update_values();
        self.eq_jacobian.update_derivatives();
        self.ineq_jacobian.update_derivatives();
        self.read_values()
    }

    pub fn gradient_into(&self, out: &mut [f64]) {
        self.gradient.scatter_into(out);
    }

    pub fn eq_jacobian(&self) -> &Jacobian {
        &self.eq_jacobian
    }

    pub fn ineq_jacobian(&self) -> &Jacobian {
        &self.ineq_jacobian
    }

    pub fn hessian(&self) -> &Hessian {
        &self.hessian
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lagrangian_hessian_includes_multipliers() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        let cost = &x * &x + &y;
        let eq = vec![&x * &y - 1.0];
        let ineq = vec![y.clone()];
        let xs = vec![x.clone(), y.clone()];

        let mut ev = NlpEvaluator::new(&ctx, &xs, &cost, &eq, &ineq);
        ev.set_primal(&[1.0, 2.0]);
        ev.set_duals(&[3.0], &[0.5]);
        let values = ev.evaluate_all();
        assert_eq!(values.cost, 3.0);
        assert_eq!(values.eq, vec![1.0]);
        assert_eq!(values.ineq, vec![2.0]);

        let mut g = vec![0.0; 2];
        ev.gradient_into(&mut g);
        assert_eq!(g, vec![2.0, 1.0]);

        // ∇²L = [[2, -y], [-y, 0]] with y = 3
        let h = ev.hessian();
        let mut dense = [[0.0; 2]; 2];
        for (&(i, j), &v) in h.entries().iter().zip(h.data()) {
            dense[i][j] += v;
        }
        assert_eq!(dense[0][0], 2.0);
        assert_eq!(dense[1][0], -3.0);
        assert_eq!(dense[1][1], 0.0);

        let a = ev.eq_jacobian();
        assert_eq!(a.entries(), &[(0, 0), (0, 1)]);
        assert_eq!(a.data(), &[2.0, 1.0]);
    }

    #[test]
    fn test_primal_pass_tracks_trial_points() {
        let ctx = Context::new();
        let x = ctx.input(0.0);
        let cost = x.exp();
        let ev = NlpEvaluator::new(&ctx, std::slice::from_ref(&x), &cost, &[], &[]);
        ev.set_primal(&[1.0]);
        let values = ev.evaluate_primal();
        assert!((values.cost - std::f64::consts::E).abs() < 1e-15);
        assert!(values.is_finite());
    }
}
