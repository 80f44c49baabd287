//! Optimal control scenarios solved end to end and checked against RK4.

use approx::assert_relative_eq;
use trajopt_core::autodiff::{Variable, VariableMatrix};
use trajopt_core::ocp::{DynamicsType, OcpConfig, OcpSolver, TimestepMethod, TranscriptionMethod};
use trajopt_core::optimization::{ExitCondition, SolverConfig};
use trajopt_core::util::rk4;
use trajopt_core::ExpressionType;

const N: usize = 50;
const DT: f64 = 0.1;

/// `[p, v]' = [v, u]`
fn double_integrator(_t: &Variable, x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable) -> VariableMatrix {
    VariableMatrix::column(x.context(), vec![x.get(1, 0).clone(), u.get(0, 0).clone()])
}

fn double_integrator_f64(x: &[f64], u: &[f64]) -> Vec<f64> {
    vec![x[1], u[0]]
}

fn min_energy_transfer(method: TranscriptionMethod) -> (OcpSolver, trajopt_core::SolverStatus) {
    let config = OcpConfig::new(2, 1, DT, N).with_transcription_method(method);
    let mut ocp = OcpSolver::new(config, double_integrator).unwrap();
    ocp.constrain_initial_state(&[0.0, 0.0]).unwrap();
    ocp.constrain_final_state(&[1.0, 0.0]).unwrap();
    ocp.set_lower_input_bound(-1.0);
    ocp.set_upper_input_bound(1.0);
    let cost = ocp.u().squared_norm();
    ocp.minimize(cost);
    let status = ocp.solve(&SolverConfig::default()).unwrap();
    (ocp, status)
}

#[test]
fn test_double_integrator_direct_transcription() {
    let (ocp, status) = min_energy_transfer(TranscriptionMethod::DirectTranscription);

    assert_eq!(status.exit_condition, ExitCondition::Success);
    assert_eq!(status.cost_function_type, ExpressionType::Quadratic);
    assert!(status.equality_constraint_type <= ExpressionType::Linear);
    assert_eq!(status.inequality_constraint_type, ExpressionType::Linear);

    let x = ocp.x().to_rows();
    assert_relative_eq!(x[0][0], 0.0, epsilon = 1e-6);
    assert_relative_eq!(x[1][0], 0.0, epsilon = 1e-6);
    assert_relative_eq!(x[0][N], 1.0, epsilon = 1e-6);
    assert_relative_eq!(x[1][N], 0.0, epsilon = 1e-6);

    let u = ocp.u().to_rows();
    for k in 0..N {
        assert!((-1.0 - 1e-8..=1.0 + 1e-8).contains(&u[0][k]), "u[{}] = {}", k, u[0][k]);
    }

    // Replaying the inputs through RK4 reproduces the states
    let inputs: Vec<Vec<f64>> = (0..N).map(|k| vec![u[0][k]]).collect();
    let replay = rk4(double_integrator_f64, &[0.0, 0.0], &inputs, DT);
    for k in 0..=N {
        assert_relative_eq!(replay[k][0], x[0][k], epsilon = 1e-6);
        assert_relative_eq!(replay[k][1], x[1][k], epsilon = 1e-6);
    }
}

#[test]
fn test_double_integrator_collocation() {
    let (ocp, status) = min_energy_transfer(TranscriptionMethod::DirectCollocation);
    assert_eq!(status.exit_condition, ExitCondition::Success);
    let x = ocp.x().to_rows();
    assert_relative_eq!(x[0][N], 1.0, epsilon = 1e-6);
    assert_relative_eq!(x[1][N], 0.0, epsilon = 1e-6);

    // Zero-order-hold inputs make Hermite–Simpson exact for this system
    let u = ocp.u().to_rows();
    let inputs: Vec<Vec<f64>> = (0..N).map(|k| vec![u[0][k]]).collect();
    let replay = rk4(double_integrator_f64, &[0.0, 0.0], &inputs, DT);
    assert_relative_eq!(replay[N][0], 1.0, epsilon = 1e-6);
}

#[test]
fn test_double_integrator_single_shooting() {
    let (ocp, status) = min_energy_transfer(TranscriptionMethod::SingleShooting);
    assert_eq!(status.exit_condition, ExitCondition::Success);
    assert_eq!(ocp.problem().num_decision_variables(), 2 + N);
    let x = ocp.x().to_rows();
    assert_relative_eq!(x[0][N], 1.0, epsilon = 1e-6);
    assert_relative_eq!(x[1][N], 0.0, epsilon = 1e-6);
}

#[test]
fn test_discrete_dynamics() {
    // x_{k+1} = x_k + u_k with |u| ≤ 0.3, reach 1 from 0 in 5 steps
    let config = OcpConfig::new(1, 1, 1.0, 5).with_dynamics_type(DynamicsType::Discrete);
    let mut ocp = OcpSolver::new(config, |_t: &Variable, x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable| {
        x + u
    })
    .unwrap();
    ocp.constrain_initial_state(&[0.0]).unwrap();
    ocp.constrain_final_state(&[1.0]).unwrap();
    ocp.set_lower_input_bounds(&[-0.3]).unwrap();
    ocp.set_upper_input_bounds(&[0.3]).unwrap();
    let cost = ocp.u().squared_norm();
    ocp.minimize(cost);

    let status = ocp.solve(&SolverConfig::default()).unwrap();
    assert_eq!(status.exit_condition, ExitCondition::Success);
    for k in 0..5 {
        assert_relative_eq!(ocp.u().value(0, k), 0.2, epsilon = 1e-6);
    }
}

#[test]
fn test_state_bounds_and_per_step_constraints() {
    let config = OcpConfig::new(2, 1, DT, 20);
    let mut ocp = OcpSolver::new(config, double_integrator).unwrap();
    ocp.constrain_initial_state(&[0.0, 0.0]).unwrap();
    ocp.constrain_final_state(&[1.0, 0.0]).unwrap();
    ocp.set_lower_state_bound(-2.0);
    ocp.set_upper_state_bound(2.0);
    ocp.for_each_step(|problem, stage| {
        // velocity limit
        problem.subject_to(stage.x.get(1, 0).leq(0.7));
    });
    let cost = ocp.u().squared_norm();
    ocp.minimize(cost);

    let status = ocp.solve(&SolverConfig::default()).unwrap();
    assert_eq!(status.exit_condition, ExitCondition::Success);
    for k in 0..20 {
        assert!(ocp.x().value(1, k) <= 0.7 + 1e-6);
    }
}

#[test]
fn test_variable_timestep_minimum_time() {
    // Bang-bang minimum-time transfer: T* = 2 for |u| ≤ 1 over unit distance
    let config = OcpConfig::new(2, 1, 0.1, 20).with_timestep_method(TimestepMethod::VariableSingle);
    let mut ocp = OcpSolver::new(config, double_integrator).unwrap();
    ocp.constrain_initial_state(&[0.0, 0.0]).unwrap();
    ocp.constrain_final_state(&[1.0, 0.0]).unwrap();
    ocp.set_lower_input_bound(-1.0);
    ocp.set_upper_input_bound(1.0);
    ocp.set_min_timestep(0.01);
    ocp.set_max_timestep(0.5);
    let total = ocp.dt().sum();
    ocp.minimize(total);

    let status = ocp.solve(&SolverConfig::default()).unwrap();
    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    let t_final: f64 = ocp.dt().values().iter().sum();
    assert_relative_eq!(t_final, 2.0, epsilon = 1e-3);
}

#[test]
fn test_per_interval_timesteps_respect_bounds() {
    // ẋ = u, |u| ≤ 1, move one unit. The input penalty favors long steps
    // less than the time cost favors short ones, so every Δt sits on its
    // lower bound and the input is spread evenly.
    let n = 10;
    let config = OcpConfig::new(1, 1, 0.3, n).with_timestep_method(TimestepMethod::Variable);
    let mut ocp = OcpSolver::new(config, |_t: &Variable, _x: &VariableMatrix, u: &VariableMatrix, _dt: &Variable| {
        u.clone()
    })
    .unwrap();
    assert_eq!(ocp.problem().num_decision_variables(), n + (n + 1) + n);
    ocp.constrain_initial_state(&[0.0]).unwrap();
    ocp.constrain_final_state(&[1.0]).unwrap();
    ocp.set_lower_input_bound(-1.0);
    ocp.set_upper_input_bound(1.0);
    ocp.set_min_timestep(0.15);
    ocp.set_max_timestep(0.5);
    let cost = ocp.dt().sum() + 0.01 * ocp.u().squared_norm();
    ocp.minimize(cost);

    let status = ocp.solve(&SolverConfig::default()).unwrap();
    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);

    let dts = ocp.dt().values();
    assert_eq!(dts.len(), n);
    for (k, &h) in dts.iter().enumerate() {
        assert!((0.15 - 1e-6..=0.5 + 1e-6).contains(&h), "dt[{}] = {}", k, h);
        assert_relative_eq!(h, 0.15, epsilon = 1e-5);
        assert_relative_eq!(ocp.u().value(0, k), 1.0 / 1.5, epsilon = 1e-5);
    }
    assert_relative_eq!(ocp.x().value(0, n), 1.0, epsilon = 1e-6);
}

#[test]
fn test_pool_balanced_after_ocp() {
    let ctx;
    {
        let (ocp, status) = min_energy_transfer(TranscriptionMethod::DirectTranscription);
        assert!(status.exit_condition.is_success());
        ctx = ocp.problem().context().clone();
    }
    assert_eq!(ctx.blocks_in_use(), 0);
}
