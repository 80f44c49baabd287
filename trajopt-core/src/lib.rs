//! trajopt: sparse automatic differentiation and an interior-point NLP
//! solver for trajectory optimization.
//!
//! The crate is organised bottom-up:
//!
//! - [`pool`]: fixed-size-block storage with an exact live-block count
//! - [`autodiff`]: the expression graph, [`Variable`], [`VariableMatrix`],
//!   and sparse [`Gradient`], [`Jacobian`] and [`Hessian`]
//! - [`linalg`]: sparse LDLᵀ with inertia correction and the KKT system
//! - [`optimization`]: [`Problem`] and the interior-point solver with a
//!   filter line search and feasibility restoration
//! - [`ocp`]: optimal control problems transcribed into a [`Problem`]
//!
//! # Algorithm
//!
//! Each iteration evaluates cost, constraints and their derivatives over a
//! shared graph whose sparsity pattern was fixed at solve entry, factors the
//! primal-dual KKT matrix (adding δI to the Hessian block until the inertia
//! is right), and picks a step with a filter line search on the barrier
//! subproblem. If no acceptable step exists, feasibility restoration
//! minimizes the constraint violation alone before regular iterations
//! resume.
//!
//! # Example
//!
//! ```
//! use trajopt_core::{Problem, SolverConfig};
//!
//! // Rosenbrock inside a disc
//! let mut problem = Problem::new();
//! let x = problem.decision_variable();
//! let y = problem.decision_variable();
//! let a = 1.0 - &x;
//! let b = &y - &x * &x;
//! problem.minimize(&a * &a + 100.0 * (&b * &b));
//! problem.subject_to((&x * &x + &y * &y).leq(3.0));
//!
//! let status = problem.solve(&SolverConfig::default()).unwrap();
//! assert!(status.exit_condition.is_success());
//! assert!((x.value() - 1.0).abs() < 1e-6);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod autodiff;
pub mod error;
pub mod linalg;
pub mod ocp;
pub mod optimization;
pub mod pool;
pub mod util;

pub use autodiff::{Context, ExpressionType, Gradient, Hessian, Jacobian, Variable, VariableMatrix};
pub use error::{Result, TrajoptError};
pub use ocp::{DynamicsType, OcpConfig, OcpSolver, Stage, TimestepMethod, TranscriptionMethod};
pub use optimization::{
    equals, geq, leq, ExitCondition, Problem, SolverConfig, SolverIterationInfo, SolverStatus,
};
