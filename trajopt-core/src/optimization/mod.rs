//! Nonlinear programming on top of the autodiff graph.
//!
//! A [`Problem`] collects decision variables, a cost and constraints, then
//! hands them to the interior-point solver in [`solver`]. The outcome is a
//! [`SolverStatus`]; the decision variables themselves hold the final
//! iterate.

pub mod config;
pub mod constraints;
pub mod problem;
pub mod solver;
pub mod spy;
pub mod status;

pub use config::{BarrierConfig, BarrierSchedule, FilterConfig, RestorationConfig, SolverConfig};
pub use constraints::{
    equals, geq, leq, Constraints, EqualityConstraints, InequalityConstraints, Operand,
    EQUALITY_SATISFACTION_TOLERANCE,
};
pub use problem::Problem;
pub use status::{ExitCondition, IterationRecord, SolveInfo, SolverIterationInfo, SolverStatus};
