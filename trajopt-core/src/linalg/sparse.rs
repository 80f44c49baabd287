//! Sparse matrix helpers.
//!
//! Matrices handed to the factorization are CSC (`sprs::CsMat`). Jacobians
//! and Hessians live as coordinate lists with a fixed pattern, so products
//! with them are written directly against `(row, col)` entries.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a CSC matrix from `(row, col, value)` triplets. Duplicates are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// `y = A x` for a symmetric `A` stored as its upper triangle.
pub fn symm_matvec_upper(a: &SparseCsc, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    y.fill(0.0);
    for (val, (row, col)) in a.iter() {
        y[row] += val * x[col];
        if row != col {
            y[col] += val * x[row];
        }
    }
}

/// `y += alpha * A x` for a coordinate-list matrix.
pub fn coo_matvec(entries: &[(usize, usize)], data: &[f64], x: &[f64], y: &mut [f64], alpha: f64) {
    for (&(r, c), &v) in entries.iter().zip(data) {
        y[r] += alpha * v * x[c];
    }
}

/// `y += alpha * Aᵀ x` for a coordinate-list matrix.
pub fn coo_matvec_transpose(entries: &[(usize, usize)], data: &[f64], x: &[f64], y: &mut [f64], alpha: f64) {
    for (&(r, c), &v) in entries.iter().zip(data) {
        y[c] += alpha * v * x[r];
    }
}

/// `y += alpha * H x` for a symmetric matrix given by its lower triangle.
pub fn coo_symm_matvec_lower(entries: &[(usize, usize)], data: &[f64], x: &[f64], y: &mut [f64], alpha: f64) {
    for (&(r, c), &v) in entries.iter().zip(data) {
        y[r] += alpha * v * x[c];
        if r != c {
            y[c] += alpha * v * x[r];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let mat = from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, 2.0), (0, 1, 3.0), (0, 0, 4.0)]);
        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.nnz(), 3);
        assert_eq!(mat.get(0, 0), Some(&5.0));
    }

    #[test]
    fn test_symm_matvec_upper() {
        // [[2, 1], [1, 3]]
        let mat = from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)]);
        let mut y = vec![0.0; 2];
        symm_matvec_upper(&mat, &[1.0, 2.0], &mut y);
        assert_eq!(y, vec![4.0, 7.0]);
    }

    #[test]
    fn test_coo_products() {
        // [[1, 2], [0, 3], [4, 0]]
        let entries = [(0, 0), (0, 1), (1, 1), (2, 0)];
        let data = [1.0, 2.0, 3.0, 4.0];

        let mut y = vec![0.0; 3];
        coo_matvec(&entries, &data, &[1.0, -1.0], &mut y, 1.0);
        assert_eq!(y, vec![-1.0, -3.0, 4.0]);

        let mut z = vec![1.0; 2];
        coo_matvec_transpose(&entries, &data, &[1.0, 1.0, 1.0], &mut z, 2.0);
        assert_eq!(z, vec![11.0, 11.0]);
    }

    #[test]
    fn test_coo_symm_matvec_lower() {
        let entries = [(0, 0), (1, 0), (1, 1)];
        let data = [2.0, 1.0, 3.0];
        let mut y = vec![0.0; 2];
        coo_symm_matvec_lower(&entries, &data, &[1.0, 2.0], &mut y, 1.0);
        assert_eq!(y, vec![4.0, 7.0]);
    }
}
