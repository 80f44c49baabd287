//! Sparse LDLᵀ factorization with inertia reporting.
//!
//! Thin wrapper over the `ldl` crate. The elimination tree is computed once
//! per sparsity pattern; every numeric factorization reuses it. A per-index
//! diagonal shift is applied on the fly, so the caller can regularize the
//! matrix without rebuilding it.
//!
//! No pivoting is performed. The signs of `D` give the inertia of the
//! (shifted) matrix, which is what inertia-correcting regularization needs.

use super::sparse::SparseCsc;
use thiserror::Error;

/// LDLᵀ errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LdltError {
    /// The elimination tree could not be computed (matrix not upper triangular)
    #[error("Symbolic factorization failed: matrix is not upper triangular")]
    SymbolicFailed,

    /// A pivot was exactly zero
    #[error("Numeric factorization hit a zero pivot")]
    ZeroPivot,

    /// Matrix or vector of the wrong size
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },
}

/// Eigenvalue sign counts of a symmetric matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inertia {
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
}

impl Inertia {
    /// Inertia from the diagonal of `D`, treating `|d| <= zero_tol` as zero.
    pub fn from_pivots(d: &[f64], zero_tol: f64) -> Self {
        let mut inertia = Inertia::default();
        for &di in d {
            if !di.is_finite() || di.abs() <= zero_tol {
                inertia.zero += 1;
            } else if di > 0.0 {
                inertia.positive += 1;
            } else {
                inertia.negative += 1;
            }
        }
        inertia
    }
}

/// Sparse LDLᵀ solver for a fixed pattern.
pub struct LdltSolver {
    n: usize,

    /// Elimination tree and column counts of L, from symbolic factorization
    etree: Option<Vec<Option<usize>>>,
    l_nz: Option<Vec<usize>>,

    factorization: Option<LdlFactorData>,

    /// Data index of each diagonal entry, for applying the shift
    diag_positions: Vec<Option<usize>>,

    /// Pivots with magnitude at or below this count as zero
    zero_pivot_tol: f64,

    a_x_work: Vec<f64>,
    bwork: Vec<ldl::Marker>,
    iwork: Vec<usize>,
    fwork: Vec<f64>,
}

struct LdlFactorData {
    l_p: Vec<usize>,
    l_i: Vec<usize>,
    l_x: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,
}

impl LdltSolver {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            etree: None,
            l_nz: None,
            factorization: None,
            diag_positions: vec![None; n],
            zero_pivot_tol: 1e-14,
            a_x_work: Vec::new(),
            bwork: vec![ldl::Marker::Unused; n],
            iwork: vec![0; 3 * n],
            fwork: vec![0.0; n],
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Set the magnitude below which a pivot counts as zero.
    pub fn set_zero_pivot_tol(&mut self, tol: f64) {
        self.zero_pivot_tol = tol;
    }

    /// Compute the elimination tree of an upper-triangular CSC pattern.
    pub fn symbolic_factorization(&mut self, mat: &SparseCsc) -> Result<(), LdltError> {
        if mat.rows() != self.n || mat.cols() != self.n {
            return Err(LdltError::DimensionMismatch {
                expected: self.n,
                actual: mat.rows(),
            });
        }

        let indptr = mat.indptr();
        let a_p = indptr.raw_storage();
        let a_i = mat.indices();

        let mut work = vec![0; self.n];
        let mut l_nz = vec![0; self.n];
        let mut etree = vec![None; self.n];
        ldl::etree(self.n, a_p, a_i, &mut work, &mut l_nz, &mut etree)
            .map_err(|_| LdltError::SymbolicFailed)?;

        for col in 0..self.n {
            self.diag_positions[col] = (a_p[col]..a_p[col + 1]).find(|&idx| a_i[idx] == col);
        }

        let nnz_l: usize = l_nz.iter().sum();
        self.factorization = Some(LdlFactorData {
            l_p: vec![0; self.n + 1],
            l_i: vec![0; nnz_l],
            l_x: vec![0.0; nnz_l],
            d: vec![0.0; self.n],
            d_inv: vec![0.0; self.n],
        });
        self.etree = Some(etree);
        self.l_nz = Some(l_nz);
        Ok(())
    }

    /// Factor `mat + diag(shift)` and return its inertia.
    ///
    /// `shift` has one entry per row; entries for columns without a stored
    /// diagonal are ignored.
    pub fn numeric_factorization(&mut self, mat: &SparseCsc, shift: &[f64]) -> Result<Inertia, LdltError> {
        if shift.len() != self.n {
            return Err(LdltError::DimensionMismatch {
                expected: self.n,
                actual: shift.len(),
            });
        }
        if self.etree.is_none() {
            self.symbolic_factorization(mat)?;
        }

        let indptr = mat.indptr();
        let a_p = indptr.raw_storage();
        let a_i = mat.indices();

        self.a_x_work.clear();
        self.a_x_work.extend_from_slice(mat.data());
        for (col, pos) in self.diag_positions.iter().enumerate() {
            if let Some(idx) = *pos {
                self.a_x_work[idx] += shift[col];
            }
        }

        let (Some(etree), Some(l_nz), Some(f)) = (&self.etree, &self.l_nz, self.factorization.as_mut()) else {
            return Err(LdltError::SymbolicFailed);
        };

        self.bwork.fill(ldl::Marker::Unused);
        self.iwork.fill(0);
        self.fwork.fill(0.0);

        ldl::factor(
            self.n,
            a_p,
            a_i,
            &self.a_x_work,
            &mut f.l_p,
            &mut f.l_i,
            &mut f.l_x,
            &mut f.d,
            &mut f.d_inv,
            l_nz,
            etree,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
        )
        .map_err(|_| LdltError::ZeroPivot)?;

        Ok(Inertia::from_pivots(&f.d, self.zero_pivot_tol))
    }

    /// Solve `LDLᵀ x = b` with the last factorization.
    pub fn solve(&self, b: &[f64], x: &mut [f64]) {
        assert_eq!(b.len(), self.n);
        assert_eq!(x.len(), self.n);

        x.copy_from_slice(b);
        if let Some(f) = &self.factorization {
            ldl::solve(self.n, &f.l_p, &f.l_i, &f.l_x, &f.d_inv, x);
        }
    }

    /// Diagonal of `D` from the most recent factorization.
    pub fn d_values(&self) -> Option<&[f64]> {
        self.factorization.as_ref().map(|f| f.d.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    #[test]
    fn test_ldlt_simple_pd() {
        let mat = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 1, 2.0)]);
        let mut solver = LdltSolver::new(2);
        solver.symbolic_factorization(&mat).unwrap();
        let inertia = solver.numeric_factorization(&mat, &[0.0, 0.0]).unwrap();
        assert_eq!(
            inertia,
            Inertia {
                positive: 2,
                negative: 0,
                zero: 0
            }
        );

        let mut x = vec![0.0; 2];
        solver.solve(&[3.0, 3.0], &mut x);
        assert!((x[0] - 1.0).abs() < 1e-12, "x[0] = {}", x[0]);
        assert!((x[1] - 1.0).abs() < 1e-12, "x[1] = {}", x[1]);
    }

    #[test]
    fn test_ldlt_saddle_point_inertia() {
        // [[1, 1], [1, -1e-8]]: one positive, one negative eigenvalue
        let mat = sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 1, -1e-8)]);
        let mut solver = LdltSolver::new(2);
        let inertia = solver.numeric_factorization(&mat, &[0.0, 0.0]).unwrap();
        assert_eq!(inertia.positive, 1);
        assert_eq!(inertia.negative, 1);
    }

    #[test]
    fn test_shift_changes_inertia() {
        // [[-1, 0], [0, 1]] shifted by 2 on the first entry is positive definite
        let mat = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, 1.0)]);
        let mut solver = LdltSolver::new(2);
        let before = solver.numeric_factorization(&mat, &[0.0, 0.0]).unwrap();
        assert_eq!(before.negative, 1);
        let after = solver.numeric_factorization(&mat, &[2.0, 0.0]).unwrap();
        assert_eq!(after.positive, 2);

        let mut x = vec![0.0; 2];
        solver.solve(&[1.0, 1.0], &mut x);
        assert!((x[0] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_zero_pivot_is_reported() {
        let mat = sparse::from_triplets(2, 2, vec![(0, 0, 0.0), (1, 1, 1.0)]);
        let mut solver = LdltSolver::new(2);
        let result = solver.numeric_factorization(&mat, &[0.0, 0.0]);
        match result {
            Err(LdltError::ZeroPivot) => {}
            Ok(inertia) => assert_eq!(inertia.zero, 1),
            Err(e) => panic!("unexpected error {}", e),
        }
    }
}
