//! Sparse Jacobian of a vector of expressions.

use std::collections::HashMap;

use super::context::{Context, NodeId};
use super::expression_graph::{ExpressionGraph, RowGraph};
use super::variable::Variable;
use crate::linalg::sparse::{self, SparseCsc};

/// Jacobian of `rows` with respect to a set of leaves.
///
/// The structural sparsity pattern is fixed at construction: an entry
/// `(i, j)` exists iff leaf `j` is reachable from row `i`. Each update only
/// recomputes the numbers. Rows whose classification is `Linear` or below
/// have constant derivatives; they are differentiated once here and never
/// again.
#[derive(Debug)]
pub struct Jacobian {
    ctx: Context,
    rows: Vec<Variable>,
    wrt: Vec<Variable>,
    forward: ExpressionGraph,
    row_graphs: Vec<RowGraph>,
    /// `(row, col)` of each structural nonzero, sorted by row then column.
    entries: Vec<(usize, usize)>,
    values: Vec<f64>,
    /// Indices of rows that must be re-differentiated every update.
    active_rows: Vec<usize>,
}

impl Jacobian {
    pub fn new(rows: &[Variable], wrt: &[Variable]) -> Self {
        Self::build(rows, wrt, |_, _| true)
    }

    /// Jacobian restricted to entries accepted by `keep(row, col)`.
    pub(crate) fn build(rows: &[Variable], wrt: &[Variable], keep: impl Fn(usize, usize) -> bool) -> Self {
        let ctx = rows
            .first()
            .or_else(|| wrt.first())
            .map_or_else(Context::new, |v| v.context().clone());
        let column_of: HashMap<NodeId, usize> = wrt.iter().enumerate().map(|(j, v)| (v.id(), j)).collect();

        let mut row_graphs = Vec::with_capacity(rows.len());
        let mut entries = Vec::new();
        {
            let arena = ctx.arena();
            for (i, row) in rows.iter().enumerate() {
                let (graph, cols) = RowGraph::new(&arena, row.id(), &column_of, |j| keep(i, j), entries.len());
                entries.extend(cols.into_iter().map(|j| (i, j)));
                row_graphs.push(graph);
            }
        }

        let active_rows = row_graphs
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.ty.has_constant_derivative())
            .map(|(i, _)| i)
            .collect();

        let mut jacobian = Self {
            forward: ExpressionGraph::new(&ctx, rows),
            ctx,
            rows: rows.to_vec(),
            wrt: wrt.to_vec(),
            row_graphs,
            values: vec![0.0; entries.len()],
            entries,
            active_rows,
        };

        jacobian.forward.update_values();
        let mut arena = jacobian.ctx.arena_mut();
        for graph in &jacobian.row_graphs {
            if graph.ty.has_constant_derivative() {
                graph.reverse(&mut arena, &mut jacobian.values);
            }
        }
        drop(arena);
        jacobian
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.wrt.len()
    }

    /// Structural nonzeros as `(row, col)`, aligned with [`Jacobian::data`].
    pub fn entries(&self) -> &[(usize, usize)] {
        &self.entries
    }

    /// Numeric values from the last update.
    pub fn data(&self) -> &[f64] {
        &self.values
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Number of rows re-differentiated on every update.
    pub fn active_rows(&self) -> usize {
        self.active_rows.len()
    }

    /// Re-evaluate the rows from current leaf values and differentiate.
    pub fn update(&mut self) {
        self.forward.update_values();
        self.update_derivatives();
    }

    /// Differentiate assuming node values are already current.
    pub(crate) fn update_derivatives(&mut self) {
        let mut arena = self.ctx.arena_mut();
        for &i in &self.active_rows {
            self.row_graphs[i].reverse(&mut arena, &mut self.values);
        }
    }

    /// Current Jacobian as a CSC matrix.
    pub fn value(&mut self) -> SparseCsc {
        self.update();
        self.to_csc()
    }

    /// Last computed values as a CSC matrix.
    pub fn to_csc(&self) -> SparseCsc {
        sparse::from_triplets(
            self.rows(),
            self.cols(),
            self.entries.iter().zip(&self.values).map(|(&(i, j), &v)| (i, j, v)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_and_values() {
        let ctx = Context::new();
        let x: Vec<Variable> = (0..3).map(|i| ctx.input(i as f64 + 1.0)).collect();
        let rows = vec![
            &x[0] * &x[1],
            x[2].sin(),
            2.0 * &x[0] + &x[2],
        ];
        let mut jac = Jacobian::new(&rows, &x);
        assert_eq!(jac.entries(), &[(0, 0), (0, 1), (1, 2), (2, 0), (2, 2)]);
        assert_eq!(jac.active_rows(), 2);

        jac.update();
        let expected = [2.0, 1.0, 3.0f64.cos(), 2.0, 1.0];
        for (got, want) in jac.data().iter().zip(expected) {
            assert!((got - want).abs() < 1e-15);
        }

        x[1].set_value(-4.0);
        let m = jac.value();
        assert_eq!(m.get(0, 0), Some(&-4.0));
        assert_eq!(m.nnz(), 5);
    }

    #[test]
    fn test_row_that_is_a_leaf() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        let rows = vec![y.clone(), ctx.constant(3.0)];
        let mut jac = Jacobian::new(&rows, &[x, y]);
        jac.update();
        assert_eq!(jac.entries(), &[(0, 1)]);
        assert_eq!(jac.data(), &[1.0]);
    }

    #[test]
    fn test_pattern_is_stable_across_updates() {
        let ctx = Context::new();
        let x: Vec<Variable> = (0..4).map(|_| ctx.input(0.5)).collect();
        let rows: Vec<Variable> = x.windows(2).map(|w| (&w[0] * &w[1]).exp()).collect();
        let mut jac = Jacobian::new(&rows, &x);
        let pattern = jac.entries().to_vec();
        for k in 0..5 {
            for v in &x {
                v.set_value(k as f64 * 0.3 - 0.4);
            }
            jac.update();
            assert_eq!(jac.entries(), pattern.as_slice());
        }
    }
}
