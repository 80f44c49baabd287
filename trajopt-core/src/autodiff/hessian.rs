//! Sparse Hessian of a scalar expression.

use super::expression_graph::symbolic_gradient;
use super::jacobian::Jacobian;
use super::variable::Variable;
use crate::linalg::sparse::SparseCsc;

/// Hessian of a scalar expression, lower triangle only.
///
/// Built as the Jacobian of the symbolic gradient, so second derivatives
/// reuse the first-derivative machinery and inherit its fixed pattern.
#[derive(Debug)]
pub struct Hessian {
    gradient: Vec<Variable>,
    jacobian: Jacobian,
}

impl Hessian {
    pub fn new(expr: &Variable, wrt: &[Variable]) -> Self {
        let gradient = symbolic_gradient(expr, wrt);
        let jacobian = Jacobian::build(&gradient, wrt, |i, j| j <= i);
        Self { gradient, jacobian }
    }

    pub fn dim(&self) -> usize {
        self.jacobian.cols()
    }

    /// Lower-triangle structural nonzeros `(row, col)` with `col <= row`.
    pub fn entries(&self) -> &[(usize, usize)] {
        self.jacobian.entries()
    }

    pub fn data(&self) -> &[f64] {
        self.jacobian.data()
    }

    pub fn nnz(&self) -> usize {
        self.jacobian.nnz()
    }

    /// The gradient expressions this Hessian differentiates.
    pub fn gradient(&self) -> &[Variable] {
        &self.gradient
    }

    pub fn update(&mut self) {
        self.jacobian.update();
    }

    pub(crate) fn update_derivatives(&mut self) {
        self.jacobian.update_derivatives();
    }

    /// Current lower triangle as a CSC matrix.
    pub fn value(&mut self) -> SparseCsc {
        self.jacobian.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Context;

    #[test]
    fn test_hessian_lower_triangle() {
        let ctx = Context::new();
        let x = ctx.input(1.5);
        let y = ctx.input(-0.5);
        let f = &x * &x * &y + y.sin();
        let mut h = Hessian::new(&f, &[x.clone(), y.clone()]);
        h.update();

        let mut dense = [[0.0; 2]; 2];
        for (&(i, j), &v) in h.entries().iter().zip(h.data()) {
            assert!(j <= i);
            dense[i][j] = v;
        }
        assert!((dense[0][0] - 2.0 * -0.5).abs() < 1e-14);
        assert!((dense[1][0] - 2.0 * 1.5).abs() < 1e-14);
        assert!((dense[1][1] + (-0.5f64).sin()).abs() < 1e-14);
    }

    #[test]
    fn test_quadratic_hessian_is_cached() {
        let ctx = Context::new();
        let x = ctx.input(3.0);
        let y = ctx.input(4.0);
        let f = &x * &x + 3.0 * &x * &y;
        let mut h = Hessian::new(&f, &[x.clone(), y.clone()]);
        assert_eq!(h.jacobian.active_rows(), 0);
        x.set_value(-10.0);
        h.update();
        assert_eq!(h.entries(), &[(0, 0), (1, 0)]);
        assert_eq!(h.data(), &[2.0, 3.0]);
    }
}
