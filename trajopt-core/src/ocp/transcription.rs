//! Symbolic integration steps and collocation defects.

use super::DynamicsType;
use crate::autodiff::{Variable, VariableMatrix};
use crate::error::{Result, TrajoptError};

/// User dynamics `(t, x, u, dt) -> ẋ or x_{k+1}`.
pub(crate) type DynamicsFn<'f> = dyn Fn(&Variable, &VariableMatrix, &VariableMatrix, &Variable) -> VariableMatrix + 'f;

/// Dynamics callback with its output shape checked on every call.
pub(crate) struct Dynamics<'f> {
    f: &'f DynamicsFn<'f>,
    num_states: usize,
    kind: DynamicsType,
}

impl<'f> Dynamics<'f> {
    pub fn new(f: &'f DynamicsFn<'f>, num_states: usize, kind: DynamicsType) -> Self {
        Self { f, num_states, kind }
    }

    pub fn eval(&self, t: &Variable, x: &VariableMatrix, u: &VariableMatrix, dt: &Variable) -> Result<VariableMatrix> {
        let out = (self.f)(t, x, u, dt);
        if out.shape() != (self.num_states, 1) {
            return Err(TrajoptError::dimension(
                "dynamics output",
                format!("{}x1", self.num_states),
                format!("{}x{}", out.rows(), out.cols()),
            ));
        }
        Ok(out)
    }

    /// Classical RK4 over `h` with the input held constant.
    pub fn rk4(&self, t: &Variable, x: &VariableMatrix, u: &VariableMatrix, h: &Variable) -> Result<VariableMatrix> {
        let half = h * 0.5;
        let t_mid = t + &half;
        let t_end = t + h;

        let k1 = self.eval(t, x, u, h)?;
        let k2 = self.eval(&t_mid, &(x + &k1 * &half), u, h)?;
        let k3 = self.eval(&t_mid, &(x + &k2 * &half), u, h)?;
        let k4 = self.eval(&t_end, &(x + &k3 * h), u, h)?;

        let sum = &k1 + &(&k2 * 2.0) + &k3 * 2.0 + k4;
        Ok(x + &sum * &(h / 6.0))
    }

    /// State after one interval: an RK4 step for ODEs, the map itself for
    /// discrete dynamics.
    pub fn step(&self, t: &Variable, x: &VariableMatrix, u: &VariableMatrix, h: &Variable) -> Result<VariableMatrix> {
        match self.kind {
            DynamicsType::ExplicitOde => self.rk4(t, x, u, h),
            DynamicsType::Discrete => self.eval(t, x, u, h),
        }
    }

    /// Hermite–Simpson defect of the interval `[t0, t0 + h]`:
    ///
    /// ```text
    /// x_c = (x0 + x1)/2 + h/8 (f0 − f1)
    /// x1 − x0 − h/6 (f0 + 4 f(x_c) + f1)
    /// ```
    pub fn hermite_simpson_defect(
        &self,
        t0: &Variable,
        x0: &VariableMatrix,
        x1: &VariableMatrix,
        u: &VariableMatrix,
        h: &Variable,
    ) -> Result<VariableMatrix> {
        let t_mid = t0 + &(h * 0.5);
        let t1 = t0 + h;

        let f0 = self.eval(t0, x0, u, h)?;
        let f1 = self.eval(&t1, x1, u, h)?;
        let xc = (x0 + x1) * 0.5 + &(&f0 - &f1) * &(h / 8.0);
        let fc = self.eval(&t_mid, &xc, u, h)?;

        let slope = &f0 + &(&fc * 4.0) + f1;
        Ok(x1 - x0 - &slope * &(h / 6.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Context;

    fn decay(_t: &Variable, x: &VariableMatrix, _u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
        -x
    }

    #[test]
    fn test_symbolic_rk4_matches_numeric() {
        let ctx = Context::new();
        let x = VariableMatrix::from_column(&ctx, &[1.0]);
        let u = VariableMatrix::new(&ctx, 0, 1);
        let t = ctx.constant(0.0);
        let h = ctx.constant(0.1);
        let dynamics = Dynamics::new(&decay, 1, DynamicsType::ExplicitOde);

        let next = dynamics.rk4(&t, &x, &u, &h).unwrap();
        let expected = crate::util::rk4_step(&|x: &[f64], _u: &[f64]| vec![-x[0]], &[1.0], &[], 0.1);
        assert!((next.value(0, 0) - expected[0]).abs() < 1e-14);
    }

    #[test]
    fn test_hermite_simpson_defect_vanishes_on_exact_solution() {
        // ẋ = 1 is integrated exactly by Simpson's rule
        let ctx = Context::new();
        let ones = |_t: &Variable, x: &VariableMatrix, _u: &VariableMatrix, _dt: &Variable| {
            VariableMatrix::filled(x.context(), 1, 1, 1.0)
        };
        let dynamics = Dynamics::new(&ones, 1, DynamicsType::ExplicitOde);
        let x0 = VariableMatrix::from_column(&ctx, &[2.0]);
        let x1 = VariableMatrix::from_column(&ctx, &[2.5]);
        let u = VariableMatrix::new(&ctx, 0, 1);
        let defect = dynamics
            .hermite_simpson_defect(&ctx.constant(0.0), &x0, &x1, &u, &ctx.constant(0.5))
            .unwrap();
        assert!(defect.value(0, 0).abs() < 1e-15);
    }

    #[test]
    fn test_wrong_output_shape_is_reported() {
        let ctx = Context::new();
        let two = |_t: &Variable, x: &VariableMatrix, _u: &VariableMatrix, _dt: &Variable| {
            VariableMatrix::filled(x.context(), 2, 1, 0.0)
        };
        let dynamics = Dynamics::new(&two, 1, DynamicsType::Discrete);
        let x = VariableMatrix::from_column(&ctx, &[0.0]);
        let u = VariableMatrix::new(&ctx, 0, 1);
        let err = dynamics.step(&ctx.constant(0.0), &x, &u, &ctx.constant(0.1));
        assert!(matches!(err, Err(TrajoptError::DimensionMismatch { .. })));
    }
}
