//! Reverse-mode automatic differentiation over a shared expression graph.
//!
//! Expressions are built with ordinary operators on [`Variable`] and
//! [`VariableMatrix`]. Every node lives in the pool of a [`Context`] and is
//! reference counted, so common subexpressions are shared and freed exactly
//! once. Derivatives come in three flavours:
//!
//! - [`Gradient`] of a scalar,
//! - [`Jacobian`] of a vector of expressions,
//! - [`Hessian`] of a scalar, obtained as the Jacobian of its symbolic gradient.
//!
//! All three fix their sparsity pattern at construction and only recompute
//! numbers afterwards.

mod context;
mod expression_graph;
mod expression_type;
mod gradient;
mod hessian;
mod jacobian;
pub mod opcode;
pub mod special;
mod variable;
mod variable_matrix;

pub use context::{Context, NodeId};
pub use expression_graph::{symbolic_gradient, ExpressionGraph};
pub use expression_type::ExpressionType;
pub use gradient::Gradient;
pub use hessian::Hessian;
pub use jacobian::Jacobian;
pub use variable::Variable;
pub use variable_matrix::VariableMatrix;
pub(crate) use variable_matrix::sum_of;
