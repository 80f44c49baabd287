use super::jacobian::Jacobian;
use super::variable::Variable;

/// Gradient of a scalar expression, stored as a one-row [`Jacobian`].
#[derive(Debug)]
pub struct Gradient {
    jacobian: Jacobian,
}

impl Gradient {
    pub fn new(expr: &Variable, wrt: &[Variable]) -> Self {
        Self {
            jacobian: Jacobian::new(std::slice::from_ref(expr), wrt),
        }
    }

    /// Columns with a structural nonzero.
    pub fn pattern(&self) -> impl Iterator<Item = usize> + '_ {
        self.jacobian.entries().iter().map(|&(_, j)| j)
    }

    /// Current dense gradient.
    pub fn value(&mut self) -> Vec<f64> {
        self.jacobian.update();
        let mut out = vec![0.0; self.jacobian.cols()];
        self.scatter_into(&mut out);
        out
    }

    pub(crate) fn update_derivatives(&mut self) {
        self.jacobian.update_derivatives();
    }

    /// Write the last computed gradient into a dense buffer.
    pub(crate) fn scatter_into(&self, out: &mut [f64]) {
        out.fill(0.0);
        for (&(_, j), &v) in self.jacobian.entries().iter().zip(self.jacobian.data()) {
            out[j] = v;
        }
    }
}
