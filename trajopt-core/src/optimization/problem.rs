//! Nonlinear program built from autodiff expressions.

use super::config::SolverConfig;
use super::constraints::Constraints;
use super::solver::interior_point::{self, IterationCallback, Nlp};
use super::status::{SolverIterationInfo, SolverStatus};
use crate::autodiff::{Context, ExpressionType, Variable, VariableMatrix};
use crate::error::Result;

/// Minimize a scalar cost subject to equality and inequality constraints.
///
/// Decision variables, cost and constraints are all expressions in the
/// problem's [`Context`]. After [`solve`](Problem::solve) returns, the
/// decision variables hold the final iterate, so every expression built
/// from them reads back its value at the solution.
///
/// ```
/// use trajopt_core::optimization::{Problem, SolverConfig};
///
/// let mut problem = Problem::new();
/// let x = problem.decision_variable();
/// let y = problem.decision_variable();
/// problem.minimize(&x * &x + &y * &y);
/// problem.subject_to((&x + &y).equals(1.0));
///
/// let status = problem.solve(&SolverConfig::default()).unwrap();
/// assert!(status.exit_condition.is_success());
/// assert!((x.value() - 0.5).abs() < 1e-6);
/// ```
pub struct Problem {
    ctx: Context,
    decision_variables: Vec<Variable>,
    cost: Option<Variable>,
    equality_constraints: Vec<Variable>,
    inequality_constraints: Vec<Variable>,
    callbacks: Vec<IterationCallback>,
}

impl Default for Problem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("decision_variables", &self.decision_variables.len())
            .field("equality_constraints", &self.equality_constraints.len())
            .field("inequality_constraints", &self.inequality_constraints.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Problem {
    /// Empty problem with its own expression context.
    pub fn new() -> Self {
        Self::with_context(Context::new())
    }

    /// Empty problem building its expressions in `ctx`.
    pub fn with_context(ctx: Context) -> Self {
        Self {
            ctx,
            decision_variables: Vec::new(),
            cost: None,
            equality_constraints: Vec::new(),
            inequality_constraints: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// New scalar decision variable, initialized to zero.
    pub fn decision_variable(&mut self) -> Variable {
        let v = self.ctx.input(0.0);
        self.decision_variables.push(v.clone());
        v
    }

    /// Matrix of fresh decision variables, registered in row-major order.
    pub fn decision_variable_matrix(&mut self, rows: usize, cols: usize) -> VariableMatrix {
        let data = (0..rows * cols).map(|_| self.decision_variable()).collect();
        VariableMatrix::from_variables(&self.ctx, rows, cols, data)
    }

    /// Symmetric matrix whose lower triangle is made of decision variables
    /// and whose upper triangle mirrors it.
    pub fn symmetric_decision_variable(&mut self, rows: usize) -> VariableMatrix {
        let mut lower: Vec<Vec<Variable>> = Vec::with_capacity(rows);
        for i in 0..rows {
            lower.push((0..=i).map(|_| self.decision_variable()).collect());
        }
        VariableMatrix::from_fn(&self.ctx, rows, rows, |i, j| {
            let (r, c) = if i >= j { (i, j) } else { (j, i) };
            lower[r][c].clone()
        })
    }

    /// Set the cost to minimize, replacing any previous one.
    pub fn minimize(&mut self, cost: impl Into<Variable>) {
        let cost = cost.into();
        self.check_context(&cost, "cost");
        self.cost = Some(cost);
    }

    /// Set the cost to maximize, replacing any previous one.
    pub fn maximize(&mut self, objective: impl Into<Variable>) {
        let objective = objective.into();
        self.minimize(-&objective);
    }

    /// Add equality or inequality constraints.
    ///
    /// # Panics
    ///
    /// If a constraint was built in a different context.
    pub fn subject_to(&mut self, constraints: impl Into<Constraints>) {
        match constraints.into() {
            Constraints::Equality(c) => {
                for v in &c.constraints {
                    self.check_context(v, "equality constraint");
                }
                self.equality_constraints.extend(c.constraints);
            }
            Constraints::Inequality(c) => {
                for v in &c.constraints {
                    self.check_context(v, "inequality constraint");
                }
                self.inequality_constraints.extend(c.constraints);
            }
        }
    }

    /// Register a per-iteration callback. Returning `true` stops the solve
    /// with [`ExitCondition::CallbackRequested`](super::ExitCondition::CallbackRequested).
    pub fn add_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&SolverIterationInfo<'_>) -> bool + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    pub fn cost_function_type(&self) -> ExpressionType {
        self.cost.as_ref().map_or(ExpressionType::None, Variable::expression_type)
    }

    pub fn equality_constraint_type(&self) -> ExpressionType {
        ExpressionType::most_general(self.equality_constraints.iter().map(Variable::expression_type))
    }

    pub fn inequality_constraint_type(&self) -> ExpressionType {
        ExpressionType::most_general(self.inequality_constraints.iter().map(Variable::expression_type))
    }

    pub fn num_decision_variables(&self) -> usize {
        self.decision_variables.len()
    }

    pub fn num_equality_constraints(&self) -> usize {
        self.equality_constraints.len()
    }

    pub fn num_inequality_constraints(&self) -> usize {
        self.inequality_constraints.len()
    }

    /// Solve from the current values of the decision variables.
    ///
    /// Returns `Err` for an invalid configuration or a setup failure. Every
    /// numerical outcome, good or bad, is an `Ok` status whose
    /// `exit_condition` must be checked before trusting the values.
    pub fn solve(&mut self, config: &SolverConfig) -> Result<SolverStatus> {
        config.validate()?;

        let mut status = SolverStatus::new(
            self.cost_function_type(),
            self.equality_constraint_type(),
            self.inequality_constraint_type(),
        );
        let cost = match &self.cost {
            Some(cost) => cost.clone(),
            None => self.ctx.constant(0.0),
        };
        let nlp = Nlp {
            ctx: &self.ctx,
            decision_variables: &self.decision_variables,
            cost: &cost,
            equality_constraints: &self.equality_constraints,
            inequality_constraints: &self.inequality_constraints,
        };
        interior_point::solve(&nlp, config, &mut self.callbacks, &mut status)?;
        Ok(status)
    }

    fn check_context(&self, v: &Variable, what: &str) {
        assert!(
            v.context().same_as(&self.ctx),
            "{} was built in a different expression context than the problem",
            what
        );
    }
}
