use super::transcription::{Dynamics, DynamicsFn};
use super::{OcpConfig, Stage, TimestepMethod, TranscriptionMethod};
use crate::autodiff::{Variable, VariableMatrix};
use crate::error::{Result, TrajoptError};
use crate::optimization::{equals, geq, leq, Constraints, Problem, SolverConfig, SolverIterationInfo, SolverStatus};

/// Optimal control problem over a fixed horizon.
///
/// ```
/// use trajopt_core::autodiff::{Variable, VariableMatrix};
/// use trajopt_core::ocp::{OcpConfig, OcpSolver};
/// use trajopt_core::optimization::SolverConfig;
///
/// // ẋ = u, steer from 0 to 1 in one second
/// let dynamics = |_t: &Variable, _x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable| u.clone();
/// let mut ocp = OcpSolver::new(OcpConfig::new(1, 1, 0.1, 10), dynamics).unwrap();
/// ocp.constrain_initial_state(&[0.0]).unwrap();
/// ocp.constrain_final_state(&[1.0]).unwrap();
/// let cost = ocp.u().squared_norm();
/// ocp.minimize(cost);
///
/// let status = ocp.solve(&SolverConfig::default()).unwrap();
/// assert!(status.exit_condition.is_success());
/// assert!((ocp.u().value(0, 3) - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct OcpSolver {
    problem: Problem,
    config: OcpConfig,
    x: VariableMatrix,
    u: VariableMatrix,
    dt: VariableMatrix,
    /// Start time of every interval plus the final time
    times: Vec<Variable>,
}

impl OcpSolver {
    /// Lay out the trajectories and add the dynamics constraints.
    ///
    /// Fails if the configuration is unusable or the dynamics return a
    /// matrix that is not `num_states × 1`.
    pub fn new<F>(config: OcpConfig, dynamics: F) -> Result<Self>
    where
        F: Fn(&Variable, &VariableMatrix, &VariableMatrix, &Variable) -> VariableMatrix,
    {
        config.validate()?;
        let n_steps = config.num_steps;
        let n_states = config.num_states;

        let mut problem = Problem::new();
        let ctx = problem.context().clone();

        let dt = match config.timestep_method {
            TimestepMethod::Fixed => VariableMatrix::filled(&ctx, 1, n_steps, config.dt),
            TimestepMethod::VariableSingle => {
                let h = problem.decision_variable();
                h.set_value(config.dt);
                VariableMatrix::from_fn(&ctx, 1, n_steps, |_, _| h.clone())
            }
            TimestepMethod::Variable => {
                let dt = problem.decision_variable_matrix(1, n_steps);
                for h in dt.iter() {
                    h.set_value(config.dt);
                }
                dt
            }
        };

        let mut times = Vec::with_capacity(n_steps + 1);
        times.push(ctx.constant(0.0));
        for k in 0..n_steps {
            let next = &times[k] + dt.get(0, k);
            times.push(next);
        }

        let f: &DynamicsFn<'_> = &dynamics;
        let dyn_model = Dynamics::new(f, n_states, config.dynamics_type);

        let (x, u) = match config.transcription_method {
            TranscriptionMethod::DirectTranscription => {
                let x = problem.decision_variable_matrix(n_states, n_steps + 1);
                let u = problem.decision_variable_matrix(config.num_inputs, n_steps);
                for k in 0..n_steps {
                    let next = dyn_model.step(&times[k], &x.col(k), &u.col(k), dt.get(0, k))?;
                    problem.subject_to(equals(&x.col(k + 1), &next));
                }
                (x, u)
            }
            TranscriptionMethod::DirectCollocation => {
                let x = problem.decision_variable_matrix(n_states, n_steps + 1);
                let u = problem.decision_variable_matrix(config.num_inputs, n_steps);
                for k in 0..n_steps {
                    let defect =
                        dyn_model.hermite_simpson_defect(&times[k], &x.col(k), &x.col(k + 1), &u.col(k), dt.get(0, k))?;
                    problem.subject_to(equals(&defect, 0.0));
                }
                (x, u)
            }
            TranscriptionMethod::SingleShooting => {
                let x0 = problem.decision_variable_matrix(n_states, 1);
                let u = problem.decision_variable_matrix(config.num_inputs, n_steps);
                let mut x = VariableMatrix::new(&ctx, n_states, n_steps + 1);
                x.set_col(0, &x0);
                let mut state = x0;
                for k in 0..n_steps {
                    state = dyn_model.step(&times[k], &state, &u.col(k), dt.get(0, k))?;
                    x.set_col(k + 1, &state);
                }
                (x, u)
            }
        };

        log::debug!(
            "OCP: {} states, {} inputs, {} steps, {:?} timestep, {}",
            n_states,
            config.num_inputs,
            n_steps,
            config.timestep_method,
            config.transcription_method
        );

        Ok(Self {
            problem,
            config,
            x,
            u,
            dt,
            times,
        })
    }

    pub fn config(&self) -> &OcpConfig {
        &self.config
    }

    /// State trajectory, `num_states × (N + 1)`.
    pub fn x(&self) -> &VariableMatrix {
        &self.x
    }

    /// Input trajectory, `num_inputs × N`.
    pub fn u(&self) -> &VariableMatrix {
        &self.u
    }

    /// Timesteps, `1 × N`.
    pub fn dt(&self) -> &VariableMatrix {
        &self.dt
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut Problem {
        &mut self.problem
    }

    pub fn minimize(&mut self, cost: impl Into<Variable>) {
        self.problem.minimize(cost);
    }

    pub fn maximize(&mut self, objective: impl Into<Variable>) {
        self.problem.maximize(objective);
    }

    pub fn subject_to(&mut self, constraints: impl Into<Constraints>) {
        self.problem.subject_to(constraints);
    }

    pub fn add_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&SolverIterationInfo<'_>) -> bool + 'static,
    {
        self.problem.add_callback(callback);
    }

    /// Pin the first state.
    pub fn constrain_initial_state(&mut self, x0: &[f64]) -> Result<()> {
        self.constrain_state(0, x0, "initial state")
    }

    /// Pin the last state.
    pub fn constrain_final_state(&mut self, xf: &[f64]) -> Result<()> {
        self.constrain_state(self.config.num_steps, xf, "final state")
    }

    fn constrain_state(&mut self, k: usize, values: &[f64], what: &'static str) -> Result<()> {
        check_len(what, self.config.num_states, values.len())?;
        let target = VariableMatrix::from_column(self.problem.context(), values);
        let state = self.x.col(k);
        self.problem.subject_to(equals(&state, &target));
        Ok(())
    }

    /// Call `f` once per interval with the problem and that interval's
    /// time, state, input and timestep.
    pub fn for_each_step<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Problem, &Stage),
    {
        for k in 0..self.config.num_steps {
            let stage = Stage {
                index: k,
                t: self.times[k].clone(),
                x: self.x.col(k),
                u: self.u.col(k),
                dt: self.dt.get(0, k).clone(),
            };
            f(&mut self.problem, &stage);
        }
    }

    /// `u ≥ lower` for every input at every step.
    pub fn set_lower_input_bound(&mut self, lower: f64) {
        self.problem.subject_to(geq(&self.u, lower));
    }

    /// `u ≤ upper` for every input at every step.
    pub fn set_upper_input_bound(&mut self, upper: f64) {
        self.problem.subject_to(leq(&self.u, upper));
    }

    /// Per-row lower input bounds.
    pub fn set_lower_input_bounds(&mut self, lower: &[f64]) -> Result<()> {
        check_len("input bounds", self.config.num_inputs, lower.len())?;
        for (i, &l) in lower.iter().enumerate() {
            self.problem.subject_to(geq(&self.u.row(i), l));
        }
        Ok(())
    }

    /// Per-row upper input bounds.
    pub fn set_upper_input_bounds(&mut self, upper: &[f64]) -> Result<()> {
        check_len("input bounds", self.config.num_inputs, upper.len())?;
        for (i, &h) in upper.iter().enumerate() {
            self.problem.subject_to(leq(&self.u.row(i), h));
        }
        Ok(())
    }

    /// `x ≥ lower` for every state at every stage.
    pub fn set_lower_state_bound(&mut self, lower: f64) {
        self.problem.subject_to(geq(&self.x, lower));
    }

    /// `x ≤ upper` for every state at every stage.
    pub fn set_upper_state_bound(&mut self, upper: f64) {
        self.problem.subject_to(leq(&self.x, upper));
    }

    /// Lower bound on every timestep. Ignored for fixed timesteps.
    pub fn set_min_timestep(&mut self, min: f64) {
        if self.config.timestep_method == TimestepMethod::Fixed {
            log::debug!("set_min_timestep ignored for a fixed timestep");
            return;
        }
        for h in self.distinct_timesteps() {
            self.problem.subject_to(h.geq(min));
        }
    }

    /// Upper bound on every timestep. Ignored for fixed timesteps.
    pub fn set_max_timestep(&mut self, max: f64) {
        if self.config.timestep_method == TimestepMethod::Fixed {
            log::debug!("set_max_timestep ignored for a fixed timestep");
            return;
        }
        for h in self.distinct_timesteps() {
            self.problem.subject_to(h.leq(max));
        }
    }

    fn distinct_timesteps(&self) -> Vec<Variable> {
        match self.config.timestep_method {
            TimestepMethod::VariableSingle => vec![self.dt.get(0, 0).clone()],
            _ => self.dt.iter().cloned().collect(),
        }
    }

    pub fn solve(&mut self, config: &SolverConfig) -> Result<SolverStatus> {
        self.problem.solve(config)
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(TrajoptError::dimension(what, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::ExpressionType;
    use crate::ocp::DynamicsType;

    fn integrator(_t: &Variable, _x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
        u.clone()
    }

    #[test]
    fn test_layout() {
        let ocp = OcpSolver::new(OcpConfig::new(2, 1, 0.1, 5), |_t, x: &VariableMatrix, u: &VariableMatrix, _dt| {
            VariableMatrix::from_fn(x.context(), 2, 1, |i, _| {
                if i == 0 {
                    x.get(1, 0).clone()
                } else {
                    u.get(0, 0).clone()
                }
            })
        })
        .unwrap();
        assert_eq!(ocp.x().shape(), (2, 6));
        assert_eq!(ocp.u().shape(), (1, 5));
        assert_eq!(ocp.dt().shape(), (1, 5));
        assert_eq!(ocp.problem().num_decision_variables(), 12 + 5);
        assert_eq!(ocp.problem().num_equality_constraints(), 2 * 5);
        assert_eq!(ocp.problem().equality_constraint_type(), ExpressionType::Linear);
    }

    #[test]
    fn test_single_shooting_has_no_dynamics_constraints() {
        let cfg = OcpConfig::new(1, 1, 0.1, 4).with_transcription_method(TranscriptionMethod::SingleShooting);
        let ocp = OcpSolver::new(cfg, integrator).unwrap();
        assert_eq!(ocp.problem().num_decision_variables(), 1 + 4);
        assert_eq!(ocp.problem().num_equality_constraints(), 0);
        assert_eq!(ocp.x().shape(), (1, 5));
    }

    #[test]
    fn test_wrong_dynamics_shape_is_an_error() {
        let result = OcpSolver::new(OcpConfig::new(2, 1, 0.1, 3), integrator);
        assert!(matches!(result, Err(TrajoptError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_boundary_vector_length_is_checked() {
        let mut ocp = OcpSolver::new(OcpConfig::new(1, 1, 0.1, 3), integrator).unwrap();
        assert!(ocp.constrain_initial_state(&[0.0, 1.0]).is_err());
        assert!(ocp.set_lower_input_bounds(&[]).is_err());
        assert!(ocp.constrain_initial_state(&[0.0]).is_ok());
    }

    #[test]
    fn test_variable_single_timestep() {
        let cfg = OcpConfig::new(1, 1, 0.2, 4)
            .with_timestep_method(TimestepMethod::VariableSingle)
            .with_dynamics_type(DynamicsType::ExplicitOde);
        let mut ocp = OcpSolver::new(cfg, integrator).unwrap();
        assert!(ocp.dt().get(0, 0).same_node(ocp.dt().get(0, 3)));
        assert_eq!(ocp.dt().value(0, 2), 0.2);
        ocp.set_min_timestep(0.05);
        ocp.set_max_timestep(0.5);
        assert_eq!(ocp.problem().num_inequality_constraints(), 2);
    }

    #[test]
    fn test_for_each_step_sees_every_interval() {
        let mut ocp = OcpSolver::new(OcpConfig::new(1, 1, 0.1, 6), integrator).unwrap();
        let mut seen = Vec::new();
        ocp.for_each_step(|problem, stage| {
            seen.push(stage.index);
            problem.subject_to(stage.x.get(0, 0).leq(10.0));
        });
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
        assert_eq!(ocp.problem().num_inequality_constraints(), 6);
    }

    #[test]
    fn test_minimum_time_single_integrator() {
        // Reach x = 1 as fast as possible with |u| ≤ 2: T* = 0.5
        let cfg = OcpConfig::new(1, 1, 0.1, 5).with_timestep_method(TimestepMethod::VariableSingle);
        let mut ocp = OcpSolver::new(cfg, integrator).unwrap();
        ocp.constrain_initial_state(&[0.0]).unwrap();
        ocp.constrain_final_state(&[1.0]).unwrap();
        ocp.set_lower_input_bound(-2.0);
        ocp.set_upper_input_bound(2.0);
        ocp.set_min_timestep(0.01);
        ocp.set_max_timestep(1.0);
        let total_time = ocp.dt().sum();
        ocp.minimize(total_time);

        let status = ocp.solve(&SolverConfig::default()).unwrap();
        assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
        let t_final: f64 = ocp.dt().values().iter().sum();
        assert!((t_final - 0.5).abs() < 1e-4, "T = {}", t_final);
    }
}
