//! Dense row-major matrix of [`Variable`]s.
//!
//! Mutating a cell rebinds it to another node; shared subexpressions are
//! never modified in place.

use std::ops::{Add, Div, Index, Mul, Neg, Sub};

use super::context::Context;
use super::variable::Variable;
use crate::error::{Result, TrajoptError};

/// Dense matrix of scalar expressions, stored row-major.
#[derive(Clone, Debug)]
pub struct VariableMatrix {
    ctx: Context,
    rows: usize,
    cols: usize,
    data: Vec<Variable>,
}

impl VariableMatrix {
    /// `rows × cols` matrix of constant zeros.
    pub fn new(ctx: &Context, rows: usize, cols: usize) -> Self {
        Self::zeros(ctx, rows, cols)
    }

    pub fn zeros(ctx: &Context, rows: usize, cols: usize) -> Self {
        Self::filled(ctx, rows, cols, 0.0)
    }

    /// Every cell shares one constant node.
    pub fn filled(ctx: &Context, rows: usize, cols: usize, value: f64) -> Self {
        let c = ctx.constant(value);
        Self {
            ctx: ctx.clone(),
            rows,
            cols,
            data: vec![c; rows * cols],
        }
    }

    /// Constant matrix from nested rows. Rows must have equal length.
    pub fn from_rows(ctx: &Context, rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|r| r.len() == cols),
            "from_rows: ragged rows"
        );
        let data = rows.iter().flatten().map(|&v| ctx.constant(v)).collect();
        Self {
            ctx: ctx.clone(),
            rows: rows.len(),
            cols,
            data,
        }
    }

    /// Constant column vector.
    pub fn from_column(ctx: &Context, values: &[f64]) -> Self {
        Self {
            ctx: ctx.clone(),
            rows: values.len(),
            cols: 1,
            data: values.iter().map(|&v| ctx.constant(v)).collect(),
        }
    }

    /// Build from row-major variables.
    pub fn from_variables(ctx: &Context, rows: usize, cols: usize, data: Vec<Variable>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "from_variables: {} entries for a {}x{} matrix",
            data.len(),
            rows,
            cols
        );
        Self {
            ctx: ctx.clone(),
            rows,
            cols,
            data,
        }
    }

    /// Column vector of variables.
    pub fn column(ctx: &Context, data: Vec<Variable>) -> Self {
        let rows = data.len();
        Self::from_variables(ctx, rows, 1, data)
    }

    pub fn from_fn<F>(ctx: &Context, rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Variable,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self::from_variables(ctx, rows, cols, data)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of bounds for a {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        i * self.cols + j
    }

    pub fn get(&self, i: usize, j: usize) -> &Variable {
        &self.data[self.offset(i, j)]
    }

    /// Rebind cell `(i, j)` to `value`.
    pub fn set(&mut self, i: usize, j: usize, value: Variable) {
        let k = self.offset(i, j);
        self.data[k] = value;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[Variable] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<Variable> {
        self.data
    }

    pub fn row(&self, i: usize) -> VariableMatrix {
        self.block(i, 0, 1, self.cols)
    }

    pub fn col(&self, j: usize) -> VariableMatrix {
        self.block(0, j, self.rows, 1)
    }

    /// The `height × width` sub-matrix starting at `(row, col)`.
    pub fn block(&self, row: usize, col: usize, height: usize, width: usize) -> VariableMatrix {
        assert!(
            row + height <= self.rows && col + width <= self.cols,
            "block {}x{} at ({}, {}) exceeds a {}x{} matrix",
            height,
            width,
            row,
            col,
            self.rows,
            self.cols
        );
        Self::from_fn(&self.ctx, height, width, |i, j| self.get(row + i, col + j).clone())
    }

    /// Rebind the cells of a block to the entries of `value`.
    pub fn set_block(&mut self, row: usize, col: usize, value: &VariableMatrix) {
        for i in 0..value.rows {
            for j in 0..value.cols {
                self.set(row + i, col + j, value.get(i, j).clone());
            }
        }
    }

    pub fn set_col(&mut self, j: usize, value: &VariableMatrix) {
        assert_eq!(value.shape(), (self.rows, 1), "set_col: shape mismatch");
        self.set_block(0, j, value);
    }

    pub fn set_row(&mut self, i: usize, value: &VariableMatrix) {
        assert_eq!(value.shape(), (1, self.cols), "set_row: shape mismatch");
        self.set_block(i, 0, value);
    }

    pub fn transpose(&self) -> VariableMatrix {
        Self::from_fn(&self.ctx, self.cols, self.rows, |i, j| self.get(j, i).clone())
    }

    /// Current value of cell `(i, j)`.
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).value()
    }

    /// Current values, row-major.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().map(Variable::value).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows)
            .map(|i| (0..self.cols).map(|j| self.value(i, j)).collect())
            .collect()
    }

    /// Assign leaf values from a row-major slice.
    ///
    /// Non-leaf cells are skipped with a warning by [`Variable::set_value`].
    pub fn set_values(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(TrajoptError::dimension(
                "VariableMatrix::set_values",
                self.data.len(),
                values.len(),
            ));
        }
        for (var, &v) in self.data.iter().zip(values) {
            var.set_value(v);
        }
        Ok(())
    }

    pub fn map<F>(&self, f: F) -> VariableMatrix
    where
        F: Fn(&Variable) -> Variable,
    {
        Self {
            ctx: self.ctx.clone(),
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Sum of all entries (constant zero when empty).
    pub fn sum(&self) -> Variable {
        sum_of(&self.ctx, self.data.iter().cloned())
    }

    /// Sum of squared entries.
    pub fn squared_norm(&self) -> Variable {
        sum_of(&self.ctx, self.data.iter().map(|v| v * v))
    }

    /// The single entry of a 1×1 matrix.
    pub fn into_scalar(self) -> Variable {
        assert_eq!(self.shape(), (1, 1), "into_scalar on a non-1x1 matrix");
        let mut data = self.data;
        data.swap_remove(0)
    }

    fn zip_with<F>(&self, rhs: &VariableMatrix, what: &str, f: F) -> VariableMatrix
    where
        F: Fn(&Variable, &Variable) -> Variable,
    {
        assert_eq!(
            self.shape(),
            rhs.shape(),
            "{}: shape mismatch {}x{} vs {}x{}",
            what,
            self.rows,
            self.cols,
            rhs.rows,
            rhs.cols
        );
        Self {
            ctx: self.ctx.clone(),
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| f(a, b)).collect(),
        }
    }

    fn add_impl(&self, rhs: &VariableMatrix) -> VariableMatrix {
        self.zip_with(rhs, "matrix sum", |x, y| x + y)
    }

    fn sub_impl(&self, rhs: &VariableMatrix) -> VariableMatrix {
        self.zip_with(rhs, "matrix difference", |x, y| x - y)
    }

    fn matmul(&self, rhs: &VariableMatrix) -> VariableMatrix {
        assert_eq!(
            self.cols, rhs.rows,
            "matrix product: {}x{} times {}x{}",
            self.rows, self.cols, rhs.rows, rhs.cols
        );
        Self::from_fn(&self.ctx, self.rows, rhs.cols, |i, j| {
            sum_of(&self.ctx, (0..self.cols).map(|k| self.get(i, k) * rhs.get(k, j)))
        })
    }
}

/// Left-to-right sum that starts from the first term instead of a zero node.
pub(crate) fn sum_of<I>(ctx: &Context, terms: I) -> Variable
where
    I: IntoIterator<Item = Variable>,
{
    let mut iter = terms.into_iter();
    match iter.next() {
        Some(first) => iter.fold(first, |acc, t| acc + t),
        None => ctx.constant(0.0),
    }
}

impl Index<(usize, usize)> for VariableMatrix {
    type Output = Variable;

    fn index(&self, (i, j): (usize, usize)) -> &Variable {
        self.get(i, j)
    }
}

/// Linear (row-major) index, convenient for vectors.
impl Index<usize> for VariableMatrix {
    type Output = Variable;

    fn index(&self, k: usize) -> &Variable {
        &self.data[k]
    }
}

impl<'a> IntoIterator for &'a VariableMatrix {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl From<Variable> for VariableMatrix {
    fn from(v: Variable) -> Self {
        let ctx = v.context().clone();
        Self::from_variables(&ctx, 1, 1, vec![v])
    }
}

macro_rules! impl_matrix_op {
    ($Trait:ident, $method:ident, $imp:ident) => {
        impl $Trait<&VariableMatrix> for &VariableMatrix {
            type Output = VariableMatrix;

            fn $method(self, rhs: &VariableMatrix) -> VariableMatrix {
                self.$imp(rhs)
            }
        }

        impl $Trait<VariableMatrix> for VariableMatrix {
            type Output = VariableMatrix;

            fn $method(self, rhs: VariableMatrix) -> VariableMatrix {
                (&self).$method(&rhs)
            }
        }

        impl $Trait<&VariableMatrix> for VariableMatrix {
            type Output = VariableMatrix;

            fn $method(self, rhs: &VariableMatrix) -> VariableMatrix {
                (&self).$method(rhs)
            }
        }

        impl $Trait<VariableMatrix> for &VariableMatrix {
            type Output = VariableMatrix;

            fn $method(self, rhs: VariableMatrix) -> VariableMatrix {
                self.$method(&rhs)
            }
        }
    };
}

impl_matrix_op!(Add, add, add_impl);
impl_matrix_op!(Sub, sub, sub_impl);
impl_matrix_op!(Mul, mul, matmul);

impl Mul<&Variable> for &VariableMatrix {
    type Output = VariableMatrix;

    fn mul(self, rhs: &Variable) -> VariableMatrix {
        self.map(|v| v * rhs)
    }
}

impl Mul<&VariableMatrix> for &Variable {
    type Output = VariableMatrix;

    fn mul(self, rhs: &VariableMatrix) -> VariableMatrix {
        rhs.map(|v| self * v)
    }
}

impl Mul<f64> for &VariableMatrix {
    type Output = VariableMatrix;

    fn mul(self, rhs: f64) -> VariableMatrix {
        self.map(|v| v * rhs)
    }
}

impl Mul<f64> for VariableMatrix {
    type Output = VariableMatrix;

    fn mul(self, rhs: f64) -> VariableMatrix {
        &self * rhs
    }
}

impl Mul<&VariableMatrix> for f64 {
    type Output = VariableMatrix;

    fn mul(self, rhs: &VariableMatrix) -> VariableMatrix {
        rhs.map(|v| self * v)
    }
}

impl Mul<VariableMatrix> for f64 {
    type Output = VariableMatrix;

    fn mul(self, rhs: VariableMatrix) -> VariableMatrix {
        self * &rhs
    }
}

impl Div<f64> for &VariableMatrix {
    type Output = VariableMatrix;

    fn div(self, rhs: f64) -> VariableMatrix {
        self.map(|v| v / rhs)
    }
}

impl Div<f64> for VariableMatrix {
    type Output = VariableMatrix;

    fn div(self, rhs: f64) -> VariableMatrix {
        &self / rhs
    }
}

impl Div<&Variable> for &VariableMatrix {
    type Output = VariableMatrix;

    fn div(self, rhs: &Variable) -> VariableMatrix {
        self.map(|v| v / rhs)
    }
}

impl Neg for &VariableMatrix {
    type Output = VariableMatrix;

    fn neg(self) -> VariableMatrix {
        self.map(|v| -v)
    }
}

impl Neg for VariableMatrix {
    type Output = VariableMatrix;

    fn neg(self) -> VariableMatrix {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(ctx: &Context, rows: usize, cols: usize, start: f64) -> VariableMatrix {
        let mut k = start;
        VariableMatrix::from_fn(ctx, rows, cols, |_, _| {
            k += 1.0;
            ctx.input(k)
        })
    }

    #[test]
    fn test_matrix_product_values() {
        let ctx = Context::new();
        let a = leaves(&ctx, 2, 3, 0.0);
        let b = VariableMatrix::from_rows(&ctx, &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);
        let c = &a * &b;
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.to_rows(), vec![vec![4.0, 5.0], vec![10.0, 11.0]]);
    }

    #[test]
    fn test_blocks_and_transpose() {
        let ctx = Context::new();
        let mut a = leaves(&ctx, 3, 2, 0.0);
        assert_eq!(a.col(1).values(), vec![2.0, 4.0, 6.0]);
        assert_eq!(a.row(2).values(), vec![5.0, 6.0]);
        assert_eq!(a.transpose().row(0).values(), vec![1.0, 3.0, 5.0]);
        assert_eq!(a.block(1, 0, 2, 2).values(), vec![3.0, 4.0, 5.0, 6.0]);

        let replacement = VariableMatrix::from_column(&ctx, &[9.0, 9.0, 9.0]);
        a.set_col(0, &replacement);
        assert_eq!(a.values(), vec![9.0, 2.0, 9.0, 4.0, 9.0, 6.0]);
    }

    #[test]
    fn test_set_values_and_sum() {
        let ctx = Context::new();
        let a = leaves(&ctx, 2, 2, 0.0);
        a.set_values(&[1.0, 1.0, 1.0, 2.0]).unwrap();
        assert_eq!(a.sum().value(), 5.0);
        assert_eq!(a.squared_norm().value(), 7.0);
        assert!(a.set_values(&[1.0]).is_err());
    }

    #[test]
    fn test_scalar_ops() {
        let ctx = Context::new();
        let a = leaves(&ctx, 1, 2, 0.0);
        assert_eq!((&a * 2.0).values(), vec![2.0, 4.0]);
        assert_eq!((&a / 2.0).values(), vec![0.5, 1.0]);
        assert_eq!((-&a).values(), vec![-1.0, -2.0]);
        assert_eq!((&a + &a).values(), vec![2.0, 4.0]);
        let dot = (&a * &a.transpose()).into_scalar();
        assert_eq!(dot.value(), 5.0);
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_shape_mismatch_panics() {
        let ctx = Context::new();
        let a = VariableMatrix::zeros(&ctx, 2, 1);
        let b = VariableMatrix::zeros(&ctx, 1, 2);
        let _ = &a + &b;
    }

    #[test]
    fn test_matrix_nodes_are_released() {
        let ctx = Context::new();
        {
            let a = leaves(&ctx, 4, 4, 0.0);
            let _p = &a * &a.transpose();
        }
        assert_eq!(ctx.blocks_in_use(), 0);
    }
}
