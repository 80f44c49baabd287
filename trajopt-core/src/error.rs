//! Error types for problem construction and solver setup.
//!
//! Numerical failures during a solve are not errors: they are reported as an
//! [`ExitCondition`](crate::optimization::ExitCondition) inside the returned
//! status. This enum covers everything that is wrong with the *formulation*.

use thiserror::Error;

use crate::linalg::kkt::KktError;
use crate::optimization::solver::state::{SolverEvent, SolverState};
use crate::pool::PoolError;

/// Errors that can occur while building or configuring a problem.
#[derive(Error, Debug)]
pub enum TrajoptError {
    /// Two operands disagree on shape
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Operation that detected the mismatch
        context: &'static str,
        /// Expected dimension
        expected: String,
        /// Actual dimension
        actual: String,
    },

    /// Invalid or unknown configuration entry
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid problem description
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// The solver state machine was driven through an edge it does not have
    #[error("Invalid solver transition from {from:?} on {event:?}")]
    InvalidTransition {
        /// State before the event
        from: SolverState,
        /// Offending event
        event: SolverEvent,
    },

    /// Node pool failure
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// KKT assembly or factorization setup failure
    #[error("KKT error: {0}")]
    Kkt(#[from] KktError),

    /// Writing a sparsity dump failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrajoptError {
    pub(crate) fn dimension(
        context: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        TrajoptError::DimensionMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type for trajopt operations.
pub type Result<T> = std::result::Result<T, TrajoptError>;
