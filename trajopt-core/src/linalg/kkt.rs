//! Fixed-pattern primal-dual KKT system.
//!
//! With `n` primal unknowns, `m_e` equality rows and `m_i` inequality rows
//! the (reduced) Newton system of the interior-point method is
//!
//! ```text
//! [ H + δI   Aeᵀ    Aiᵀ  ] [  px ]     [ -(∇f - Aeᵀy - Aiᵀz) ]
//! [ Ae      -γI     0    ] [ -py ]  =  [ -ce                 ]
//! [ Ai       0     -Σ⁻¹  ] [ -pz ]     [ -ci + μ/z           ]
//! ```
//!
//! where `Σ = diag(z / s)`. The slack step follows as `ps = Ai px + ci - s`.
//!
//! The sparsity pattern is fixed when the system is created. The upper
//! triangle is stored in CSC, permuted once by a fill-reducing ordering,
//! and each block entry is mapped to its slot in the CSC data array, so an
//! iteration only writes values and reuses the elimination tree.

use std::fmt;
use std::str::FromStr;

use super::ldlt::LdltError;
use super::regularized::{RegularizationPolicy, RegularizationState, RegularizedLdlt};
use super::sparse::{symm_matvec_upper, SparseCsc};
use sprs::TriMat;
use thiserror::Error;

/// KKT errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KktError {
    /// Factorization failed even at maximum regularization
    #[error("Factorization failed: {0}")]
    Factorization(#[from] LdltError),

    /// An entry of the fixed pattern could not be located
    #[error("Entry ({row}, {col}) is not part of the KKT pattern")]
    MissingEntry {
        /// Row in the permuted matrix
        row: usize,
        /// Column in the permuted matrix
        col: usize,
    },

    /// Values passed to assembly do not match the pattern
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Block being assembled
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}

/// Symmetric fill-reducing ordering applied to the KKT matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KktOrdering {
    /// Keep the natural `[x; y; z]` order
    Natural,
    /// Reverse Cuthill–McKee on the full symmetric pattern
    #[default]
    ReverseCuthillMckee,
}

impl fmt::Display for KktOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KktOrdering::Natural => write!(f, "natural"),
            KktOrdering::ReverseCuthillMckee => write!(f, "rcm"),
        }
    }
}

impl FromStr for KktOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "natural" | "none" => Ok(KktOrdering::Natural),
            "rcm" | "reverse_cuthill_mckee" => Ok(KktOrdering::ReverseCuthillMckee),
            other => Err(format!("unknown KKT ordering '{}'", other)),
        }
    }
}

/// Structural description of the blocks of a KKT system.
#[derive(Debug, Clone, Default)]
pub struct KktStructure<'a> {
    pub n: usize,
    pub m_eq: usize,
    pub m_ineq: usize,
    /// Hessian lower triangle `(row, col)`, `col <= row`
    pub hessian: &'a [(usize, usize)],
    /// Equality Jacobian `(row, col)`
    pub eq_jacobian: &'a [(usize, usize)],
    /// Inequality Jacobian `(row, col)`
    pub ineq_jacobian: &'a [(usize, usize)],
}

/// Primal-dual KKT system with a fixed sparsity pattern.
pub struct KktSystem {
    n: usize,
    m_eq: usize,
    m_ineq: usize,

    /// Upper triangle of the permuted matrix
    matrix: SparseCsc,

    /// Fill-reducing permutation (new index -> old index)
    perm: Option<Vec<usize>>,
    /// Inverse permutation (old index -> new index)
    perm_inv: Option<Vec<usize>>,

    /// Data slots of the Hessian, Jacobian and diagonal entries
    hess_pos: Vec<usize>,
    eq_pos: Vec<usize>,
    ineq_pos: Vec<usize>,
    ineq_rows: Vec<usize>,
    diag_pos: Vec<usize>,

    /// Structural upper-triangle entries in natural order, for inspection
    natural_entries: Vec<(usize, usize)>,

    solver: RegularizedLdlt,
    refine_iters: usize,
}

impl KktSystem {
    pub fn new(
        structure: &KktStructure<'_>,
        ordering: KktOrdering,
        policy: RegularizationPolicy,
        refine_iters: usize,
    ) -> Result<Self, KktError> {
        let (n, m_eq, m_ineq) = (structure.n, structure.m_eq, structure.m_ineq);
        let dim = n + m_eq + m_ineq;

        // Natural-order upper-triangle coordinates of every block entry
        let hess: Vec<(usize, usize)> = structure.hessian.iter().map(|&(i, j)| (j.min(i), j.max(i))).collect();
        let eq: Vec<(usize, usize)> = structure.eq_jacobian.iter().map(|&(r, c)| (c, n + r)).collect();
        let ineq: Vec<(usize, usize)> = structure
            .ineq_jacobian
            .iter()
            .map(|&(r, c)| (c, n + m_eq + r))
            .collect();
        let diag: Vec<(usize, usize)> = (0..dim).map(|k| (k, k)).collect();

        let mut natural_entries: Vec<(usize, usize)> = hess.iter().chain(&eq).chain(&ineq).chain(&diag).copied().collect();
        natural_entries.sort_unstable();
        natural_entries.dedup();

        let (perm, perm_inv) = match ordering {
            KktOrdering::Natural => (None, None),
            KktOrdering::ReverseCuthillMckee => {
                let (perm, perm_inv) = rcm_permutation(dim, &natural_entries);
                if perm.iter().enumerate().all(|(i, &p)| i == p) {
                    (None, None)
                } else {
                    (Some(perm), Some(perm_inv))
                }
            }
        };

        let map_index = |idx: usize| perm_inv.as_ref().map_or(idx, |p| p[idx]);
        let permuted = |&(r, c): &(usize, usize)| {
            let (r, c) = (map_index(r), map_index(c));
            (r.min(c), r.max(c))
        };

        let mut tri = TriMat::new((dim, dim));
        for entry in &natural_entries {
            let (r, c) = permuted(entry);
            tri.add_triplet(r, c, 0.0);
        }
        let matrix: SparseCsc = tri.to_csc();

        let locate = |entries: &[(usize, usize)]| -> Result<Vec<usize>, KktError> {
            entries
                .iter()
                .map(|e| {
                    let (row, col) = permuted(e);
                    matrix
                        .nnz_index(row, col)
                        .map(|idx| idx.0)
                        .ok_or(KktError::MissingEntry { row, col })
                })
                .collect()
        };
        let hess_pos = locate(&hess)?;
        let eq_pos = locate(&eq)?;
        let ineq_pos = locate(&ineq)?;
        let diag_pos = locate(&diag)?;

        let mut solver = RegularizedLdlt::new(n, m_eq, m_ineq, policy);
        solver.symbolic_factorization(&matrix)?;

        log::debug!(
            "KKT system: dim {} nnz {} ordering {}",
            dim,
            matrix.nnz(),
            ordering
        );

        Ok(Self {
            n,
            m_eq,
            m_ineq,
            matrix,
            perm,
            perm_inv,
            hess_pos,
            eq_pos,
            ineq_pos,
            ineq_rows: structure.ineq_jacobian.iter().map(|&(r, _)| r).collect(),
            diag_pos,
            natural_entries,
            solver,
            refine_iters,
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n + self.m_eq + self.m_ineq
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Upper-triangle structural entries in natural `[x; y; z]` order.
    pub fn natural_entries(&self) -> &[(usize, usize)] {
        &self.natural_entries
    }

    pub fn last_delta(&self) -> f64 {
        self.solver.last_delta()
    }

    fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), KktError> {
        if expected != actual {
            return Err(KktError::DimensionMismatch { what, expected, actual });
        }
        Ok(())
    }

    /// Write the interior-point matrix: Hessian, Jacobians and `-Σ⁻¹` on
    /// the inequality diagonal (`sigma_inv[i] = s_i / z_i`).
    pub fn assemble(&mut self, hess: &[f64], eq_jac: &[f64], ineq_jac: &[f64], sigma_inv: &[f64]) -> Result<(), KktError> {
        Self::check_len("Hessian", self.hess_pos.len(), hess.len())?;
        Self::check_len("equality Jacobian", self.eq_pos.len(), eq_jac.len())?;
        Self::check_len("inequality Jacobian", self.ineq_pos.len(), ineq_jac.len())?;
        Self::check_len("inequality diagonal", self.m_ineq, sigma_inv.len())?;

        let data = self.matrix.data_mut();
        data.fill(0.0);
        for (&pos, &v) in self.hess_pos.iter().zip(hess) {
            data[pos] += v;
        }
        for (&pos, &v) in self.eq_pos.iter().zip(eq_jac) {
            data[pos] += v;
        }
        for (&pos, &v) in self.ineq_pos.iter().zip(ineq_jac) {
            data[pos] += v;
        }
        let offset = self.n + self.m_eq;
        for (i, &v) in sigma_inv.iter().enumerate() {
            data[self.diag_pos[offset + i]] -= v;
        }
        Ok(())
    }

    /// Write the Gauss–Newton matrix of feasibility restoration:
    /// `λI` in the primal block, `-I` in both constraint blocks, and only
    /// the inequality rows flagged in `ineq_active`.
    pub fn assemble_restoration(
        &mut self,
        lambda: f64,
        eq_jac: &[f64],
        ineq_jac: &[f64],
        ineq_active: &[bool],
    ) -> Result<(), KktError> {
        Self::check_len("equality Jacobian", self.eq_pos.len(), eq_jac.len())?;
        Self::check_len("inequality Jacobian", self.ineq_pos.len(), ineq_jac.len())?;
        Self::check_len("inequality activity", self.m_ineq, ineq_active.len())?;

        let data = self.matrix.data_mut();
        data.fill(0.0);
        for &pos in &self.diag_pos[..self.n] {
            data[pos] += lambda;
        }
        for &pos in &self.diag_pos[self.n..] {
            data[pos] -= 1.0;
        }
        for (&pos, &v) in self.eq_pos.iter().zip(eq_jac) {
            data[pos] += v;
        }
        for ((&pos, &row), &v) in self.ineq_pos.iter().zip(&self.ineq_rows).zip(ineq_jac) {
            if ineq_active[row] {
                data[pos] += v;
            }
        }
        Ok(())
    }

    /// Factor the assembled matrix with inertia correction.
    pub fn factor(&mut self) -> Result<RegularizationState, KktError> {
        Ok(self.solver.factor(&self.matrix, self.perm.as_deref())?)
    }

    /// Solve `K sol = rhs` (both in natural order) with the last
    /// factorization, followed by iterative refinement against the
    /// regularized matrix.
    pub fn solve(&self, rhs: &[f64], sol: &mut [f64]) {
        let dim = self.dim();
        assert_eq!(rhs.len(), dim);
        assert_eq!(sol.len(), dim);

        let mut rhs_perm = vec![0.0; dim];
        let mut shift_perm = vec![0.0; dim];
        let shift = self.solver.shift();
        match &self.perm {
            Some(p) => {
                for (i, &src) in p.iter().enumerate() {
                    rhs_perm[i] = rhs[src];
                    shift_perm[i] = shift[src];
                }
            }
            None => {
                rhs_perm.copy_from_slice(rhs);
                shift_perm.copy_from_slice(shift);
            }
        }

        let mut sol_perm = vec![0.0; dim];
        self.solver.solve(&rhs_perm, &mut sol_perm);

        if self.refine_iters > 0 {
            let mut kx = vec![0.0; dim];
            let mut res = vec![0.0; dim];
            let mut delta = vec![0.0; dim];
            for _ in 0..self.refine_iters {
                symm_matvec_upper(&self.matrix, &sol_perm, &mut kx);
                for i in 0..dim {
                    res[i] = rhs_perm[i] - kx[i] - shift_perm[i] * sol_perm[i];
                }
                let res_norm = res.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                if !res_norm.is_finite() || res_norm < 1e-14 {
                    break;
                }
                self.solver.solve(&res, &mut delta);
                for i in 0..dim {
                    sol_perm[i] += delta[i];
                }
            }
        }

        match &self.perm_inv {
            Some(p_inv) => {
                for (i, s) in sol.iter_mut().enumerate() {
                    *s = sol_perm[p_inv[i]];
                }
            }
            None => sol.copy_from_slice(&sol_perm),
        }
    }
}

/// Reverse Cuthill–McKee permutation of a symmetric pattern given by its
/// upper triangle. Returns `(new -> old, old -> new)`.
fn rcm_permutation(dim: usize, upper: &[(usize, usize)]) -> (Vec<usize>, Vec<usize>) {
    let mut tri = TriMat::new((dim, dim));
    for &(r, c) in upper {
        tri.add_triplet(r, c, 1.0);
        if r != c {
            tri.add_triplet(c, r, 1.0);
        }
    }
    let full: SparseCsc = tri.to_csc();
    let ordering = sprs::linalg::reverse_cuthill_mckee(full.view());
    (ordering.perm.vec(), ordering.perm.inv_vec())
}
