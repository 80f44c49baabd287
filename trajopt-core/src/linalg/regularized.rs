//! Inertia-correcting regularization for the primal-dual KKT matrix.
//!
//! The barrier subproblem has a well-defined Newton step only if the KKT
//! matrix has exactly `n` positive and `m` negative eigenvalues. When the
//! factorization reports anything else, a multiple `δI` of the identity is
//! added to the Hessian block and the matrix refactored, growing `δ`
//! geometrically until the inertia is right or `δ` exceeds its bound.

use super::ldlt::{Inertia, LdltError, LdltSolver};
use super::sparse::SparseCsc;

/// Inertia-correction constants.
#[derive(Debug, Clone)]
pub struct RegularizationPolicy {
    /// First trial δ when the previous iteration needed none
    pub delta_init: f64,
    /// Smallest δ ever tried
    pub delta_min: f64,
    /// Give up once δ exceeds this
    pub delta_max: f64,
    /// Decrease factor applied to the previous δ for the first trial
    pub kappa_minus: f64,
    /// Growth factor when a previous δ exists
    pub kappa_plus: f64,
    /// Growth factor when no previous δ exists
    pub kappa_plus_bar: f64,
    /// Fixed negative regularization on the equality-multiplier block
    pub gamma: f64,
}

impl Default for RegularizationPolicy {
    fn default() -> Self {
        Self {
            delta_init: 1e-4,
            delta_min: 1e-20,
            delta_max: 1e20,
            kappa_minus: 1.0 / 3.0,
            kappa_plus: 8.0,
            kappa_plus_bar: 100.0,
            gamma: 1e-8,
        }
    }
}

/// Outcome of one regularized factorization.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularizationState {
    /// δ applied to the Hessian block
    pub delta: f64,
    /// Number of factorizations performed
    pub factorizations: usize,
    pub inertia: Inertia,
}

/// LDLᵀ solver that enforces the expected inertia.
pub struct RegularizedLdlt {
    ldlt: LdltSolver,
    policy: RegularizationPolicy,
    /// Dimensions of the primal block and of the constraint block
    n: usize,
    m: usize,
    /// Number of equality rows directly after the primal block
    m_eq: usize,
    last_delta: f64,
    shift: Vec<f64>,
}

impl RegularizedLdlt {
    /// KKT of `n` primal unknowns, `m_eq` equality and `m_ineq` inequality rows.
    pub fn new(n: usize, m_eq: usize, m_ineq: usize, policy: RegularizationPolicy) -> Self {
        let dim = n + m_eq + m_ineq;
        Self {
            ldlt: LdltSolver::new(dim),
            policy,
            n,
            m: m_eq + m_ineq,
            m_eq,
            last_delta: 0.0,
            shift: vec![0.0; dim],
        }
    }

    pub fn policy(&self) -> &RegularizationPolicy {
        &self.policy
    }

    /// δ accepted by the most recent successful factorization.
    pub fn last_delta(&self) -> f64 {
        self.last_delta
    }

    pub fn symbolic_factorization(&mut self, mat: &SparseCsc) -> Result<(), LdltError> {
        self.ldlt.symbolic_factorization(mat)
    }

    fn set_shift(&mut self, delta: f64) {
        let (n, m_eq, gamma) = (self.n, self.m_eq, self.policy.gamma);
        for (i, s) in self.shift.iter_mut().enumerate() {
            *s = if i < n {
                delta
            } else if i < n + m_eq {
                -gamma
            } else {
                0.0
            };
        }
    }

    /// Map the shift from KKT order to the permuted order of `mat`.
    fn permuted_shift(&self, perm: Option<&[usize]>) -> Vec<f64> {
        match perm {
            Some(p) => p.iter().map(|&old| self.shift[old]).collect(),
            None => self.shift.clone(),
        }
    }

    #[inline]
    fn inertia_ok(&self, inertia: &Inertia) -> bool {
        inertia.positive == self.n && inertia.negative == self.m && inertia.zero == 0
    }

    fn try_factor(&mut self, mat: &SparseCsc, perm: Option<&[usize]>, delta: f64) -> Option<Inertia> {
        self.set_shift(delta);
        let shift = self.permuted_shift(perm);
        match self.ldlt.numeric_factorization(mat, &shift) {
            Ok(inertia) => Some(inertia),
            Err(e) => {
                log::trace!("factorization with delta {:.1e} failed: {}", delta, e);
                None
            }
        }
    }

    /// Factor `mat` (given in permuted order, `perm` maps new to old
    /// indices) with the smallest δ in the escalation sequence that yields
    /// the correct inertia.
    pub fn factor(&mut self, mat: &SparseCsc, perm: Option<&[usize]>) -> Result<RegularizationState, LdltError> {
        let mut state = RegularizationState::default();

        state.factorizations += 1;
        if let Some(inertia) = self.try_factor(mat, perm, 0.0) {
            state.inertia = inertia;
            if self.inertia_ok(&inertia) {
                return Ok(state);
            }
        }

        let p = &self.policy;
        let mut delta = if self.last_delta == 0.0 {
            p.delta_init
        } else {
            (p.kappa_minus * self.last_delta).max(p.delta_min)
        };
        let growth = if self.last_delta == 0.0 {
            p.kappa_plus_bar
        } else {
            p.kappa_plus
        };
        let delta_max = p.delta_max;

        while delta <= delta_max {
            state.factorizations += 1;
            if let Some(inertia) = self.try_factor(mat, perm, delta) {
                state.inertia = inertia;
                if self.inertia_ok(&inertia) {
                    self.last_delta = delta;
                    state.delta = delta;
                    return Ok(state);
                }
            }
            delta *= growth;
        }

        log::debug!(
            "inertia correction gave up after {} factorizations (last inertia {:?})",
            state.factorizations,
            state.inertia
        );
        Err(LdltError::ZeroPivot)
    }

    pub fn solve(&self, b: &[f64], x: &mut [f64]) {
        self.ldlt.solve(b, x);
    }

    /// Shift applied by the last factorization, in KKT order.
    pub fn shift(&self) -> &[f64] {
        &self.shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    #[test]
    fn test_correct_inertia_needs_no_regularization() {
        // [[2, 1], [1, 0]]: n = 1, m_eq = 1
        let mat = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 1, 0.0)]);
        let mut reg = RegularizedLdlt::new(1, 1, 0, RegularizationPolicy::default());
        reg.symbolic_factorization(&mat).unwrap();
        let state = reg.factor(&mat, None).unwrap();
        assert_eq!(state.delta, 0.0);
        assert_eq!(state.factorizations, 1);
    }

    #[test]
    fn test_indefinite_hessian_is_corrected() {
        // H = [[-1, 0], [0, 1]], one equality row [0, 1]
        let mat = sparse::from_triplets(
            3,
            3,
            vec![(0, 0, -1.0), (1, 1, 1.0), (1, 2, 1.0), (2, 2, 0.0)],
        );
        let mut reg = RegularizedLdlt::new(2, 1, 0, RegularizationPolicy::default());
        reg.symbolic_factorization(&mat).unwrap();
        let state = reg.factor(&mat, None).unwrap();
        assert!(state.delta > 1.0, "delta = {}", state.delta);
        assert_eq!(state.inertia.positive, 2);
        assert_eq!(state.inertia.negative, 1);
        assert_eq!(reg.last_delta(), state.delta);

        // A second factorization starts from a fraction of the last δ
        let again = reg.factor(&mat, None).unwrap();
        assert!(again.delta > 1.0);
        assert!(again.delta <= state.delta * 8.0 / 3.0 + 1e-12);
    }
}
