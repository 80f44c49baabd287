//! Canonical scenarios: a few optimal control problems plus a plain NLP.
//!
//! Each OCP scenario is solved, then its inputs are replayed through RK4
//! on the plain-`f64` dynamics and compared against the solved states.

use std::time::Instant;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use trajopt_core::util::rk4;
use trajopt_core::{
    OcpConfig, OcpSolver, Problem, SolverConfig, SolverStatus, TranscriptionMethod, Variable, VariableMatrix,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    DoubleIntegrator,
    CartPole,
    Flywheel,
    Rosenbrock,
    All,
}

impl Scenario {
    pub fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => vec![
                Scenario::DoubleIntegrator,
                Scenario::CartPole,
                Scenario::Flywheel,
                Scenario::Rosenbrock,
            ],
            other => vec![other],
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Transcription {
    DirectTranscription,
    DirectCollocation,
    SingleShooting,
}

impl From<Transcription> for TranscriptionMethod {
    fn from(t: Transcription) -> Self {
        match t {
            Transcription::DirectTranscription => TranscriptionMethod::DirectTranscription,
            Transcription::DirectCollocation => TranscriptionMethod::DirectCollocation,
            Transcription::SingleShooting => TranscriptionMethod::SingleShooting,
        }
    }
}

/// One row of the results table.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub exit_condition: String,
    pub success: bool,
    pub iterations: usize,
    pub cost: f64,
    pub num_variables: usize,
    pub num_equality_constraints: usize,
    pub num_inequality_constraints: usize,
    pub factorizations: usize,
    pub restoration_phases: usize,
    pub solve_ms: f64,
    /// Largest gap between solved states and an RK4 replay of the inputs
    pub max_rk4_deviation: Option<f64>,
}

impl ScenarioResult {
    fn new(name: String, status: &SolverStatus, solve_ms: f64, max_rk4_deviation: Option<f64>) -> Self {
        Self {
            name,
            exit_condition: format!("{:?}", status.exit_condition),
            success: status.exit_condition.is_success(),
            iterations: status.iterations,
            cost: status.cost,
            num_variables: status.info.num_variables,
            num_equality_constraints: status.info.num_equality_constraints,
            num_inequality_constraints: status.info.num_inequality_constraints,
            factorizations: status.info.factorizations,
            restoration_phases: status.info.restoration_phases,
            solve_ms,
            max_rk4_deviation,
        }
    }
}

pub fn run(scenario: Scenario, transcription: Transcription, config: &SolverConfig) -> Result<ScenarioResult> {
    let method = TranscriptionMethod::from(transcription);
    match scenario {
        Scenario::DoubleIntegrator => double_integrator(method, config),
        Scenario::CartPole => cart_pole(method, config),
        Scenario::Flywheel => flywheel(method, config),
        Scenario::Rosenbrock => rosenbrock(config),
        Scenario::All => anyhow::bail!("'all' must be expanded before running"),
    }
}

/// Solve `ocp` and replay its inputs from `x0` through `f`.
fn solve_and_replay<F>(
    name: String,
    ocp: &mut OcpSolver,
    config: &SolverConfig,
    x0: &[f64],
    f: F,
) -> Result<ScenarioResult>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let start = Instant::now();
    let status = ocp.solve(config)?;
    let solve_ms = start.elapsed().as_secs_f64() * 1000.0;

    let dt = ocp.config().dt;
    let n = ocp.config().num_steps;
    let x = ocp.x().to_rows();
    let u = ocp.u().to_rows();
    let inputs: Vec<Vec<f64>> = (0..n).map(|k| u.iter().map(|row| row[k]).collect()).collect();
    let replay = rk4(f, x0, &inputs, dt);

    let mut deviation: f64 = 0.0;
    for (k, state) in replay.iter().enumerate() {
        for (i, &value) in state.iter().enumerate() {
            deviation = deviation.max((value - x[i][k]).abs());
        }
    }

    Ok(ScenarioResult::new(name, &status, solve_ms, Some(deviation)))
}

fn ocp_name(base: &str, method: TranscriptionMethod) -> String {
    format!("{} ({})", base, method)
}

/// Straight-line guess between two states, skipped when `X` is not made of
/// decision variables.
fn interpolate_states(ocp: &OcpSolver, from: &[f64], to: &[f64]) {
    if ocp.config().transcription_method == TranscriptionMethod::SingleShooting {
        return;
    }
    let n = ocp.config().num_steps;
    for k in 0..=n {
        let s = k as f64 / n as f64;
        for (i, (a, b)) in from.iter().zip(to).enumerate() {
            ocp.x().get(i, k).set_value(a + s * (b - a));
        }
    }
}

// Double integrator: move one unit and stop, |u| <= 1.

fn double_integrator_dynamics(_t: &Variable, x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
    VariableMatrix::column(x.context(), vec![x.get(1, 0).clone(), u.get(0, 0).clone()])
}

fn double_integrator_f64(x: &[f64], u: &[f64]) -> Vec<f64> {
    vec![x[1], u[0]]
}

fn double_integrator(method: TranscriptionMethod, config: &SolverConfig) -> Result<ScenarioResult> {
    let ocp_config = OcpConfig::new(2, 1, 0.1, 50).with_transcription_method(method);
    let mut ocp = OcpSolver::new(ocp_config, double_integrator_dynamics)?;
    ocp.constrain_initial_state(&[0.0, 0.0])?;
    ocp.constrain_final_state(&[1.0, 0.0])?;
    ocp.set_lower_input_bound(-1.0);
    ocp.set_upper_input_bound(1.0);
    let cost = ocp.u().squared_norm();
    ocp.minimize(cost);

    solve_and_replay(
        ocp_name("double integrator", method),
        &mut ocp,
        config,
        &[0.0, 0.0],
        double_integrator_f64,
    )
}

// Cart-pole swing-up. State is [cart position, pole angle, cart velocity,
// pole rate]; the pole hangs down at angle 0.

const CART_MASS: f64 = 5.0;
const POLE_MASS: f64 = 0.5;
const POLE_LENGTH: f64 = 0.5;
const GRAVITY: f64 = 9.806;

fn cart_pole_dynamics(_t: &Variable, x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
    let theta = x.get(1, 0);
    let theta_dot = x.get(3, 0);
    let force = u.get(0, 0);
    let (s, c) = (theta.sin(), theta.cos());

    let den = CART_MASS + POLE_MASS * (&s * &s);
    let rate_sq = theta_dot * theta_dot;
    let cart_accel = (force + POLE_MASS * &s * (POLE_LENGTH * &rate_sq + GRAVITY * &c)) / &den;
    let pole_accel = (-(force * &c)
        - POLE_MASS * POLE_LENGTH * &rate_sq * &c * &s
        - (CART_MASS + POLE_MASS) * GRAVITY * &s)
        / (POLE_LENGTH * &den);

    VariableMatrix::column(
        x.context(),
        vec![x.get(2, 0).clone(), theta_dot.clone(), cart_accel, pole_accel],
    )
}

fn cart_pole_f64(x: &[f64], u: &[f64]) -> Vec<f64> {
    let (s, c) = x[1].sin_cos();
    let den = CART_MASS + POLE_MASS * s * s;
    let rate_sq = x[3] * x[3];
    let cart_accel = (u[0] + POLE_MASS * s * (POLE_LENGTH * rate_sq + GRAVITY * c)) / den;
    let pole_accel = (-u[0] * c - POLE_MASS * POLE_LENGTH * rate_sq * c * s - (CART_MASS + POLE_MASS) * GRAVITY * s)
        / (POLE_LENGTH * den);
    vec![x[2], x[3], cart_accel, pole_accel]
}

fn cart_pole(method: TranscriptionMethod, config: &SolverConfig) -> Result<ScenarioResult> {
    let x0 = [0.0, 0.0, 0.0, 0.0];
    let xf = [1.0, std::f64::consts::PI, 0.0, 0.0];

    let ocp_config = OcpConfig::new(4, 1, 0.05, 100).with_transcription_method(method);
    let mut ocp = OcpSolver::new(ocp_config, cart_pole_dynamics)?;
    ocp.constrain_initial_state(&x0)?;
    ocp.constrain_final_state(&xf)?;
    ocp.set_lower_input_bound(-20.0);
    ocp.set_upper_input_bound(20.0);

    // Rail limits on the cart
    let position = ocp.x().row(0);
    ocp.subject_to(position.geq(0.0));
    ocp.subject_to(position.leq(2.0));

    interpolate_states(&ocp, &x0, &xf);
    let cost = ocp.u().squared_norm();
    ocp.minimize(cost);

    solve_and_replay(ocp_name("cart-pole", method), &mut ocp, config, &x0, cart_pole_f64)
}

// Flywheel spin-up: first-order velocity model tracking a setpoint.

const FLYWHEEL_SETPOINT: f64 = 10.0;

fn flywheel_dynamics(_t: &Variable, x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
    VariableMatrix::column(x.context(), vec![u.get(0, 0) - x.get(0, 0)])
}

fn flywheel_f64(x: &[f64], u: &[f64]) -> Vec<f64> {
    vec![u[0] - x[0]]
}

fn flywheel(method: TranscriptionMethod, config: &SolverConfig) -> Result<ScenarioResult> {
    let n = 100;
    let ocp_config = OcpConfig::new(1, 1, 0.02, n).with_transcription_method(method);
    let mut ocp = OcpSolver::new(ocp_config, flywheel_dynamics)?;
    ocp.constrain_initial_state(&[0.0])?;
    ocp.set_lower_input_bound(-12.0);
    ocp.set_upper_input_bound(12.0);

    let error = ocp.x().row(0) - VariableMatrix::filled(ocp.problem().context(), 1, n + 1, FLYWHEEL_SETPOINT);
    ocp.minimize(error.squared_norm());

    solve_and_replay(ocp_name("flywheel", method), &mut ocp, config, &[0.0], flywheel_f64)
}

// Rosenbrock in a disc, a small dense NLP.

fn rosenbrock(config: &SolverConfig) -> Result<ScenarioResult> {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    x.set_value(-1.2);
    y.set_value(1.0);

    let a = 1.0 - &x;
    let b = &y - &x * &x;
    problem.minimize(&a * &a + 100.0 * (&b * &b));
    problem.subject_to((&x * &x + &y * &y).leq(2.0));

    let start = Instant::now();
    let status = problem.solve(config)?;
    let solve_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(ScenarioResult::new("rosenbrock in disc".to_string(), &status, solve_ms, None))
}
