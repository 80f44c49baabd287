//! Solve outcome and per-iteration reporting types.

use std::fmt;
use std::time::Duration;

use super::solver::perf::PerfTimers;
use crate::autodiff::ExpressionType;

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCondition {
    /// KKT conditions satisfied to the requested tolerance
    Success,
    /// KKT conditions satisfied to the acceptable tolerance for enough
    /// consecutive iterations
    SolvedToAcceptableTolerance,
    /// A user callback asked to stop
    CallbackRequested,
    /// More equality constraints than decision variables
    TooFewDofs,
    /// Feasibility restoration converged to a stationary point of the
    /// constraint violation that is not feasible
    LocallyInfeasible,
    /// The KKT matrix could not be factored at maximum regularization
    FactorizationFailed,
    /// Feasibility restoration could not reduce the constraint violation
    FeasibilityRestorationFailed,
    /// Cost or constraints are not finite at the initial guess
    NonfiniteInitialCostOrConstraints,
    /// Iterates grew without bound or became non-finite
    DivergingIterates,
    MaxIterationsExceeded,
    Timeout,
}

impl ExitCondition {
    /// Whether the returned iterate is a (possibly loosely) converged solution.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCondition::Success | ExitCondition::SolvedToAcceptableTolerance)
    }
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ExitCondition::Success => "solved to desired tolerance",
            ExitCondition::SolvedToAcceptableTolerance => "solved to acceptable tolerance",
            ExitCondition::CallbackRequested => "callback requested stop",
            ExitCondition::TooFewDofs => "problem has too few degrees of freedom",
            ExitCondition::LocallyInfeasible => "problem is locally infeasible",
            ExitCondition::FactorizationFailed => "KKT matrix factorization failed",
            ExitCondition::FeasibilityRestorationFailed => "feasibility restoration failed",
            ExitCondition::NonfiniteInitialCostOrConstraints => {
                "cost or constraints are non-finite at the initial guess"
            }
            ExitCondition::DivergingIterates => "iterates diverged",
            ExitCondition::MaxIterationsExceeded => "maximum iterations exceeded",
            ExitCondition::Timeout => "solve time limit exceeded",
        };
        f.write_str(msg)
    }
}

/// Scalars recorded for one iteration when diagnostics are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub cost: f64,
    /// `‖ce‖₁ + ‖ci − s‖₁`
    pub constraint_violation: f64,
    /// Scaled KKT error at μ = 0
    pub kkt_error: f64,
    pub mu: f64,
    /// Accepted primal step length
    pub alpha: f64,
    /// Hessian regularization applied to the KKT matrix
    pub regularization: f64,
    /// Factorizations performed this iteration
    pub factorizations: usize,
    /// Iteration belongs to feasibility restoration
    pub restoration: bool,
}

/// Read-only view of the iterate handed to user callbacks.
#[derive(Debug, Clone, Copy)]
pub struct SolverIterationInfo<'a> {
    pub iteration: usize,
    /// Decision variables
    pub x: &'a [f64],
    /// Inequality slacks
    pub s: &'a [f64],
    /// Equality multipliers
    pub y: &'a [f64],
    /// Inequality multipliers
    pub z: &'a [f64],
    pub cost: f64,
    pub constraint_violation: f64,
    pub kkt_error: f64,
    pub mu: f64,
}

/// Counters and timings of one solve.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    pub num_variables: usize,
    pub num_equality_constraints: usize,
    pub num_inequality_constraints: usize,
    pub hessian_nnz: usize,
    pub equality_jacobian_nnz: usize,
    pub inequality_jacobian_nnz: usize,
    pub kkt_nnz: usize,

    pub factorizations: usize,
    pub second_order_corrections: usize,
    pub restoration_phases: usize,
    pub restoration_iterations: usize,

    /// Final scaled KKT error
    pub kkt_error: f64,
    /// Final `‖ce‖₁ + ‖ci − s‖₁`
    pub constraint_violation: f64,
    /// Final barrier parameter
    pub mu: f64,

    pub setup_time: Duration,
    pub solve_time: Duration,
    pub perf: PerfTimers,
}

/// Result of [`Problem::solve`](crate::optimization::Problem::solve).
///
/// A non-success exit still leaves the best iterate in the decision
/// variables.
#[derive(Debug, Clone)]
pub struct SolverStatus {
    pub cost_function_type: ExpressionType,
    pub equality_constraint_type: ExpressionType,
    pub inequality_constraint_type: ExpressionType,
    pub exit_condition: ExitCondition,
    /// Cost at the returned iterate
    pub cost: f64,
    pub iterations: usize,
    pub info: SolveInfo,
    /// Per-iteration records, filled when diagnostics are enabled
    pub history: Vec<IterationRecord>,
}

impl SolverStatus {
    pub(crate) fn new(
        cost_function_type: ExpressionType,
        equality_constraint_type: ExpressionType,
        inequality_constraint_type: ExpressionType,
    ) -> Self {
        Self {
            cost_function_type,
            equality_constraint_type,
            inequality_constraint_type,
            exit_condition: ExitCondition::Success,
            cost: 0.0,
            iterations: 0,
            info: SolveInfo::default(),
            history: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_classification() {
        assert!(ExitCondition::Success.is_success());
        assert!(ExitCondition::SolvedToAcceptableTolerance.is_success());
        assert!(!ExitCondition::LocallyInfeasible.is_success());
        assert!(!ExitCondition::Timeout.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCondition::TooFewDofs.to_string(), "problem has too few degrees of freedom");
        assert_eq!(ExitCondition::MaxIterationsExceeded.to_string(), "maximum iterations exceeded");
    }
}
