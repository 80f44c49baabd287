//! End-to-end checks of the expression graph and its derivatives.

use approx::assert_relative_eq;
use trajopt_core::autodiff::{Context, ExpressionType, Gradient, Hessian, Jacobian, Variable, VariableMatrix};

/// Small deterministic generator so samples are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }
}

fn mixed_expression(x: &Variable, y: &Variable, z: &Variable) -> Variable {
    let a = x.sin() * y.exp() + z.powf(3.0) / (1.0 + x * x);
    let b = x.atan2(y) + (y * z).tanh() + x.hypot(z).ln();
    let c = (x - y).cos() * z.sqrt() + y.erf();
    a + b * c
}

#[test]
fn test_gradient_matches_central_differences() {
    let ctx = Context::new();
    let x = ctx.input(0.0);
    let y = ctx.input(0.0);
    let z = ctx.input(1.0);
    let f = mixed_expression(&x, &y, &z);
    let wrt = vec![x.clone(), y.clone(), z.clone()];
    let mut gradient = Gradient::new(&f, &wrt);

    let mut rng = Lcg(7);
    for _ in 0..20 {
        let point = [rng.next(), rng.next(), 0.5 + rng.next().abs()];
        for (v, &p) in wrt.iter().zip(&point) {
            v.set_value(p);
        }
        let analytic = gradient.value();

        for i in 0..3 {
            let h = 1e-6;
            wrt[i].set_value(point[i] + h);
            let plus = f.value();
            wrt[i].set_value(point[i] - h);
            let minus = f.value();
            wrt[i].set_value(point[i]);
            let numeric = (plus - minus) / (2.0 * h);
            assert_relative_eq!(analytic[i], numeric, epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

#[test]
fn test_jacobian_pattern_is_stable() {
    let ctx = Context::new();
    let x = ctx.input(1.0);
    let y = ctx.input(2.0);
    let z = ctx.input(3.0);
    let rows = vec![&x * &y, y.sin() + 2.0 * &z, &z * 3.0];
    let wrt = vec![x.clone(), y.clone(), z.clone()];
    let mut jacobian = Jacobian::new(&rows, &wrt);
    let pattern: Vec<(usize, usize)> = jacobian.entries().to_vec();
    assert_eq!(pattern, vec![(0, 0), (0, 1), (1, 1), (1, 2), (2, 2)]);

    let mut rng = Lcg(11);
    for _ in 0..10 {
        for v in &wrt {
            v.set_value(rng.next());
        }
        let j = jacobian.value();
        assert_eq!(jacobian.entries(), pattern.as_slice());
        assert_relative_eq!(*j.get(0, 0).unwrap(), y.value());
        assert_relative_eq!(*j.get(0, 1).unwrap(), x.value());
        assert_relative_eq!(*j.get(1, 1).unwrap(), y.value().cos());
        assert_relative_eq!(*j.get(1, 2).unwrap(), 2.0);
        assert!(j.get(1, 0).is_none());
    }
}

#[test]
fn test_hessian_of_quadratic_form() {
    // f = ½ vᵀ Q v with Q = [[4, 1], [1, 2]]
    let ctx = Context::new();
    let v = VariableMatrix::from_variables(&ctx, 2, 1, vec![ctx.input(0.3), ctx.input(-0.7)]);
    let q = VariableMatrix::from_rows(&ctx, &[vec![4.0, 1.0], vec![1.0, 2.0]]);
    let f = (v.transpose() * (&q * &v)).into_scalar() * 0.5;
    assert_eq!(f.expression_type(), ExpressionType::Quadratic);

    let wrt = v.as_slice().to_vec();
    let mut hessian = Hessian::new(&f, &wrt);
    let h = hessian.value();
    assert_relative_eq!(*h.get(0, 0).unwrap(), 4.0);
    assert_relative_eq!(*h.get(1, 0).unwrap(), 1.0);
    assert_relative_eq!(*h.get(1, 1).unwrap(), 2.0);
    assert!(h.get(0, 1).is_none(), "only the lower triangle is stored");
}

#[test]
fn test_shared_subexpression_is_counted_once() {
    let ctx = Context::new();
    let x = ctx.input(2.0);
    let shared = &x * &x;
    let f = &shared + &shared;
    let mut g = Gradient::new(&f, std::slice::from_ref(&x));
    assert_relative_eq!(g.value()[0], 8.0);
}

#[test]
fn test_pool_is_balanced_after_drop() {
    let ctx = Context::new();
    {
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        let f = mixed_expression(&x, &y, &ctx.input(3.0));
        let mut g = Gradient::new(&f, &[x.clone(), y.clone()]);
        let mut h = Hessian::new(&f, &[x, y]);
        let _ = g.value();
        let _ = h.value();
        assert!(ctx.blocks_in_use() > 0);
    }
    assert_eq!(ctx.blocks_in_use(), 0);
}

#[test]
fn test_lazy_values_follow_leaf_updates() {
    let ctx = Context::new();
    let x = ctx.input(1.0);
    let f = x.exp() * 2.0;
    assert_relative_eq!(f.value(), 2.0 * 1f64.exp());
    x.set_value(0.0);
    assert_relative_eq!(f.value(), 2.0);
}

#[test]
fn test_division_by_zero_propagates_non_finite() {
    let ctx = Context::new();
    let x = ctx.input(0.0);
    let f = 1.0 / &x;
    assert!(!f.value().is_finite());
}
