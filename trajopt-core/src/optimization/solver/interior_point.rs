//! Primal-dual interior-point method with a filter line search.
//!
//! Solves
//!
//! ```text
//! min f(x)  s.t.  ce(x) = 0,  ci(x) − s = 0,  s ≥ 0
//! ```
//!
//! by applying Newton's method to the barrier subproblem
//! `f(x) − μ Σ ln sᵢ` for a decreasing sequence of μ. Every iteration the
//! KKT matrix is refactored with inertia correction, a step is chosen by the
//! filter line search (with second-order corrections), and the multipliers
//! are safeguarded against drifting too far from `μ S⁻¹`. When no
//! acceptable step exists the solver enters feasibility restoration.

use std::time::Instant;

use super::diagnostics::{self, DiagnosticsConfig};
use super::evaluator::{NlpEvaluator, PrimalValues};
use super::filter::{Acceptance, Filter, FilterEntry};
use super::perf::{PerfSection, PerfTimers};
use super::restoration::{barrier_cost, constraint_violation, slacks_for, Restoration, RestorationOutcome};
use super::state::{SolverEvent, SolverState};
use crate::autodiff::{Context, Variable};
use crate::error::Result;
use crate::linalg::sparse::{coo_matvec, coo_matvec_transpose};
use crate::linalg::{KktStructure, KktSystem};
use crate::optimization::config::{BarrierSchedule, SolverConfig};
use crate::optimization::spy::{self, SpyPatterns};
use crate::optimization::status::{ExitCondition, IterationRecord, SolverIterationInfo, SolverStatus};
use crate::util::{dot, norm_1, norm_inf};

/// Per-iteration user callback; returning `true` stops the solve.
pub type IterationCallback = Box<dyn FnMut(&SolverIterationInfo<'_>) -> bool>;

/// The expressions making up one NLP.
pub(crate) struct Nlp<'a> {
    pub ctx: &'a Context,
    pub decision_variables: &'a [Variable],
    pub cost: &'a Variable,
    pub equality_constraints: &'a [Variable],
    pub inequality_constraints: &'a [Variable],
}

/// Newton direction split by block.
#[derive(Debug, Clone)]
struct Step {
    px: Vec<f64>,
    ps: Vec<f64>,
    py: Vec<f64>,
    pz: Vec<f64>,
}

impl Step {
    fn zeros(n: usize, m_eq: usize, m_ineq: usize) -> Self {
        Self {
            px: vec![0.0; n],
            ps: vec![0.0; m_ineq],
            py: vec![0.0; m_eq],
            pz: vec![0.0; m_ineq],
        }
    }
}

/// Largest `α ∈ (0, 1]` with `v + α dv ≥ (1 − τ) v`.
fn fraction_to_boundary(v: &[f64], dv: &[f64], tau: f64) -> f64 {
    v.iter().zip(dv).fold(1.0f64, |alpha, (&vi, &dvi)| {
        if dvi < 0.0 {
            alpha.min(-tau * vi / dvi)
        } else {
            alpha
        }
    })
}

/// Scaled optimality error of the barrier subproblem for `mu`.
#[allow(clippy::too_many_arguments)]
fn kkt_error(
    dual_residual: &[f64],
    values: &PrimalValues,
    s: &[f64],
    y: &[f64],
    z: &[f64],
    mu: f64,
    s_max: f64,
) -> f64 {
    let m = y.len() + z.len();
    let s_d = if m > 0 {
        ((norm_1(y) + norm_1(z)) / m as f64).max(s_max) / s_max
    } else {
        1.0
    };
    let s_c = if z.is_empty() {
        1.0
    } else {
        (norm_1(z) / z.len() as f64).max(s_max) / s_max
    };

    let primal_eq = norm_inf(&values.eq);
    let primal_ineq = values.ineq.iter().zip(s).fold(0.0f64, |acc, (c, si)| acc.max((c - si).abs()));
    let complementarity = s.iter().zip(z).fold(0.0f64, |acc, (si, zi)| acc.max((si * zi - mu).abs()));

    (norm_inf(dual_residual) / s_d)
        .max(primal_eq)
        .max(primal_ineq)
        .max(complementarity / s_c)
}

/// LOQO rule: `μ = σ sᵀz / m` with `σ` driven by the spread of the products.
fn adaptive_mu(s: &[f64], z: &[f64]) -> f64 {
    let m = s.len() as f64;
    let avg = dot(s, z) / m;
    if avg <= 0.0 {
        return 0.0;
    }
    let min = s.iter().zip(z).map(|(a, b)| a * b).fold(f64::INFINITY, f64::min);
    let xi = min / avg;
    let sigma = 0.1 * (0.05 * (1.0 - xi) / xi).min(2.0).powi(3);
    sigma * avg
}

/// Whether μ fell far enough since the last filter clear to make the
/// entries recorded under the old barrier stale.
fn barrier_dropped(mu_at_clear: f64, mu: f64, ratio: f64) -> bool {
    mu <= ratio * mu_at_clear
}

struct Solver {
    ev: NlpEvaluator,
    kkt: KktSystem,
    n: usize,
    m_eq: usize,

    x: Vec<f64>,
    s: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    values: PrimalValues,

    gradient: Vec<f64>,
    dual_residual: Vec<f64>,
    rhs: Vec<f64>,
    sol: Vec<f64>,
}

impl Solver {
    /// `∇f − Aeᵀy − Aiᵀz` at the current evaluation.
    fn update_dual_residual(&mut self) {
        self.ev.gradient_into(&mut self.gradient);
        self.dual_residual.copy_from_slice(&self.gradient);
        let (ae, ai) = (self.ev.eq_jacobian(), self.ev.ineq_jacobian());
        coo_matvec_transpose(ae.entries(), ae.data(), &self.y, &mut self.dual_residual, -1.0);
        coo_matvec_transpose(ai.entries(), ai.data(), &self.z, &mut self.dual_residual, -1.0);
    }

    fn assemble(&mut self) -> Result<()> {
        let sigma_inv: Vec<f64> = self.s.iter().zip(&self.z).map(|(s, z)| s / z).collect();
        let (h, ae, ai) = (self.ev.hessian(), self.ev.eq_jacobian(), self.ev.ineq_jacobian());
        self.kkt.assemble(h.data(), ae.data(), ai.data(), &sigma_inv)?;
        Ok(())
    }

    /// Solve for the step given the equality residual `r_e` and the
    /// inequality residual `r_i` (normally `ci − s`).
    fn compute_step(&mut self, r_e: &[f64], r_i: &[f64], mu: f64, step: &mut Step) {
        let (n, m_eq) = (self.n, self.m_eq);
        for (dst, r) in self.rhs[..n].iter_mut().zip(&self.dual_residual) {
            *dst = -r;
        }
        for (dst, r) in self.rhs[n..n + m_eq].iter_mut().zip(r_e) {
            *dst = -r;
        }
        for (j, dst) in self.rhs[n + m_eq..].iter_mut().enumerate() {
            *dst = -r_i[j] - self.s[j] + mu / self.z[j];
        }

        self.kkt.solve(&self.rhs, &mut self.sol);

        step.px.copy_from_slice(&self.sol[..n]);
        for (p, v) in step.py.iter_mut().zip(&self.sol[n..n + m_eq]) {
            *p = -v;
        }
        for (p, v) in step.pz.iter_mut().zip(&self.sol[n + m_eq..]) {
            *p = -v;
        }
        step.ps.copy_from_slice(r_i);
        let ai = self.ev.ineq_jacobian();
        coo_matvec(ai.entries(), ai.data(), &step.px, &mut step.ps, 1.0);
    }

    fn ineq_residual(values: &PrimalValues, s: &[f64]) -> Vec<f64> {
        values.ineq.iter().zip(s).map(|(c, si)| c - si).collect()
    }

    fn trial_point(&self, step: &Step, alpha: f64) -> (Vec<f64>, Vec<f64>) {
        let x = self.x.iter().zip(&step.px).map(|(x, p)| x + alpha * p).collect();
        let s = self.s.iter().zip(&step.ps).map(|(s, p)| s + alpha * p).collect();
        (x, s)
    }

    /// Evaluate a trial point; `None` if it must be rejected outright.
    fn evaluate_trial(&self, x: &[f64], s: &[f64], mu: f64, feasible: bool) -> Option<(PrimalValues, FilterEntry)> {
        self.ev.set_primal(x);
        let values = self.ev.evaluate_primal();
        if !values.is_finite() || s.iter().any(|&si| si <= 0.0) {
            return None;
        }
        if feasible && values.ineq.iter().any(|&c| c <= 0.0) {
            return None;
        }
        let entry = FilterEntry::new(constraint_violation(&values, s), barrier_cost(values.cost, s, mu));
        Some((values, entry))
    }
}

/// Outcome of the line search.
struct Accepted {
    x: Vec<f64>,
    s: Vec<f64>,
    alpha: f64,
    kind: Acceptance,
}

/// Run the interior-point method, writing the outcome into `status`.
///
/// Returns `Err` only for setup problems (spy I/O, KKT pattern errors,
/// an illegal state transition); numerical trouble ends up in
/// `status.exit_condition`.
pub(crate) fn solve(
    nlp: &Nlp<'_>,
    config: &SolverConfig,
    callbacks: &mut [IterationCallback],
    status: &mut SolverStatus,
) -> Result<()> {
    let start = Instant::now();
    let deadline = config.timeout.map(|t| start + t);
    let diag = DiagnosticsConfig::resolve(config.diagnostics);
    let mut perf = PerfTimers::default();
    let mut state = SolverState::Initializing;

    let n = nlp.decision_variables.len();
    let m_eq = nlp.equality_constraints.len();
    let m_ineq = nlp.inequality_constraints.len();
    status.info.num_variables = n;
    status.info.num_equality_constraints = m_eq;
    status.info.num_inequality_constraints = m_ineq;

    log::info!(
        "NLP: {} variables, {} equality and {} inequality constraints (cost {}, equality {}, inequality {})",
        n,
        m_eq,
        m_ineq,
        status.cost_function_type,
        status.equality_constraint_type,
        status.inequality_constraint_type
    );

    if n == 0 {
        state.on(SolverEvent::KktSatisfied)?;
        status.cost = nlp.cost.value();
        status.exit_condition = ExitCondition::Success;
        return Ok(());
    }
    if m_eq > n {
        state.on(SolverEvent::ProblemRejected)?;
        status.cost = nlp.cost.value();
        status.exit_condition = ExitCondition::TooFewDofs;
        log::warn!("{} equality constraints but only {} decision variables", m_eq, n);
        return Ok(());
    }

    let ev = NlpEvaluator::new(
        nlp.ctx,
        nlp.decision_variables,
        nlp.cost,
        nlp.equality_constraints,
        nlp.inequality_constraints,
    );
    let structure = KktStructure {
        n,
        m_eq,
        m_ineq,
        hessian: ev.hessian().entries(),
        eq_jacobian: ev.eq_jacobian().entries(),
        ineq_jacobian: ev.ineq_jacobian().entries(),
    };
    let kkt = KktSystem::new(&structure, config.kkt_ordering, config.regularization.clone(), config.refine_iterations)?;

    status.info.hessian_nnz = ev.hessian().nnz();
    status.info.equality_jacobian_nnz = ev.eq_jacobian().nnz();
    status.info.inequality_jacobian_nnz = ev.ineq_jacobian().nnz();
    status.info.kkt_nnz = kkt.nnz();

    if let Some(dir) = &config.spy {
        spy::write_all(
            dir,
            &SpyPatterns {
                n,
                m_eq,
                m_ineq,
                hessian: ev.hessian().entries(),
                eq_jacobian: ev.eq_jacobian().entries(),
                ineq_jacobian: ev.ineq_jacobian().entries(),
                kkt: kkt.natural_entries(),
            },
        )?;
    }

    let x: Vec<f64> = nlp.decision_variables.iter().map(Variable::value).collect();
    let mut solver = Solver {
        ev,
        kkt,
        n,
        m_eq,
        x,
        s: vec![1.0; m_ineq],
        y: vec![0.0; m_eq],
        z: vec![1.0; m_ineq],
        values: PrimalValues::default(),
        gradient: vec![0.0; n],
        dual_residual: vec![0.0; n],
        rhs: vec![0.0; n + m_eq + m_ineq],
        sol: vec![0.0; n + m_eq + m_ineq],
    };

    {
        let _t = perf.scoped(PerfSection::Evaluation);
        solver.ev.set_primal(&solver.x);
        solver.ev.set_duals(&solver.y, &solver.z);
        solver.values = solver.ev.evaluate_all();
    }
    status.info.setup_time = start.elapsed();

    if !solver.values.is_finite() {
        state.on(SolverEvent::ProblemRejected)?;
        status.cost = solver.values.cost;
        status.exit_condition = ExitCondition::NonfiniteInitialCostOrConstraints;
        log::warn!("cost or constraints are non-finite at the initial guess");
        return Ok(());
    }

    let feasible = config.feasible_ipm && m_ineq > 0 && solver.values.ineq.iter().all(|&c| c > 0.0);
    solver.s = if feasible {
        solver.values.ineq.clone()
    } else {
        solver.values.ineq.iter().map(|&c| c.max(1.0)).collect()
    };

    state = state.on(SolverEvent::Initialized)?;

    let barrier = &config.barrier;
    let mu_min = config.tolerance / (barrier.kappa_epsilon + 1.0);
    let mut mu = if m_ineq > 0 { barrier.mu_init } else { 0.0 };
    let mut mu_at_clear = mu;

    let mut filter = Filter::new(config.filter.clone());
    filter.reset(constraint_violation(&solver.values, &solver.s));

    let mut step = Step::zeros(n, m_eq, m_ineq);
    let mut soc_step = Step::zeros(n, m_eq, m_ineq);
    let mut iteration = 0usize;
    let mut acceptable_count = 0usize;
    let mut last_record = IterationRecord::default();

    if diag.enabled {
        diagnostics::print_header();
    }

    let exit = loop {
        solver.update_dual_residual();
        let theta = constraint_violation(&solver.values, &solver.s);
        let error = kkt_error(
            &solver.dual_residual,
            &solver.values,
            &solver.s,
            &solver.y,
            &solver.z,
            0.0,
            config.s_max,
        );
        last_record.kkt_error = error;
        last_record.constraint_violation = theta;

        if error <= config.tolerance {
            state = state.on(SolverEvent::KktSatisfied)?;
            break ExitCondition::Success;
        }
        if error <= config.acceptable_tolerance {
            acceptable_count += 1;
            if acceptable_count >= config.acceptable_iterations {
                state = state.on(SolverEvent::KktSatisfied)?;
                break ExitCondition::SolvedToAcceptableTolerance;
            }
        } else {
            acceptable_count = 0;
        }
        if iteration >= config.max_iterations {
            state = state.on(SolverEvent::IterationLimit)?;
            break ExitCondition::MaxIterationsExceeded;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            state = state.on(SolverEvent::DeadlinePassed)?;
            break ExitCondition::Timeout;
        }

        let info = SolverIterationInfo {
            iteration,
            x: &solver.x,
            s: &solver.s,
            y: &solver.y,
            z: &solver.z,
            cost: solver.values.cost,
            constraint_violation: theta,
            kkt_error: error,
            mu,
        };
        if callbacks.iter_mut().any(|cb| cb(&info)) {
            state = state.on(SolverEvent::CallbackRequested)?;
            break ExitCondition::CallbackRequested;
        }

        // Barrier parameter
        if m_ineq > 0 {
            match barrier.schedule {
                BarrierSchedule::Monotone => {
                    while mu > mu_min
                        && kkt_error(
                            &solver.dual_residual,
                            &solver.values,
                            &solver.s,
                            &solver.y,
                            &solver.z,
                            mu,
                            config.s_max,
                        ) <= barrier.kappa_epsilon * mu
                    {
                        mu = mu_min.max((barrier.kappa_mu * mu).min(mu.powf(barrier.theta_mu)));
                        filter.clear();
                    }
                }
                BarrierSchedule::Adaptive => {
                    mu = adaptive_mu(&solver.s, &solver.z).clamp(mu_min, barrier.mu_init);
                    if barrier_dropped(mu_at_clear, mu, barrier.adaptive_clear_ratio) {
                        filter.clear();
                        mu_at_clear = mu;
                    } else if mu > mu_at_clear {
                        mu_at_clear = mu;
                    }
                }
            }
        }

        // Newton step
        {
            let _t = perf.scoped(PerfSection::KktAssembly);
            solver.assemble()?;
        }
        let reg = {
            let _t = perf.scoped(PerfSection::Factorization);
            solver.kkt.factor()
        };
        let reg = match reg {
            Ok(reg) => reg,
            Err(e) => {
                log::warn!("KKT factorization failed at iteration {}: {}", iteration, e);
                state = state.on(SolverEvent::FactorizationFailed)?;
                break ExitCondition::FactorizationFailed;
            }
        };
        status.info.factorizations += reg.factorizations;
        if reg.delta > 0.0 {
            log::debug!("iteration {}: inertia correction δ = {:.2e}", iteration, reg.delta);
        }

        let r_e = solver.values.eq.clone();
        let r_i = Solver::ineq_residual(&solver.values, &solver.s);
        {
            let _t = perf.scoped(PerfSection::Backsolve);
            solver.compute_step(&r_e, &r_i, mu, &mut step);
        }

        let tau = barrier.tau_min.max(1.0 - mu);
        let alpha_max = fraction_to_boundary(&solver.s, &step.ps, tau);
        let alpha_z = fraction_to_boundary(&solver.z, &step.pz, tau);

        // Filter line search
        let current = FilterEntry::new(theta, barrier_cost(solver.values.cost, &solver.s, mu));
        let phi_slope = dot(&solver.gradient, &step.px)
            - mu * solver.s.iter().zip(&step.ps).map(|(s, p)| p / s).sum::<f64>();
        let alpha_min = filter.min_step(&current, phi_slope).max(f64::EPSILON);

        let accepted = {
            let _t = perf.scoped(PerfSection::LineSearch);
            let mut alpha = alpha_max;
            let mut soc_tried = false;
            let mut accepted = None;
            while alpha >= alpha_min {
                let (trial_x, trial_s) = solver.trial_point(&step, alpha);
                if let Some((trial_values, trial)) = solver.evaluate_trial(&trial_x, &trial_s, mu, feasible) {
                    let kind = filter.check(&current, &trial, alpha, phi_slope);
                    if kind != Acceptance::Rejected {
                        accepted = Some(Accepted {
                            x: trial_x,
                            s: trial_s,
                            alpha,
                            kind,
                        });
                        break;
                    }

                    // Second-order correction on the first rejected full step
                    if !soc_tried
                        && alpha == alpha_max
                        && trial.constraint_violation >= current.constraint_violation
                        && config.max_second_order_corrections > 0
                    {
                        soc_tried = true;
                        let mut c_e: Vec<f64> = r_e.iter().zip(&trial_values.eq).map(|(c, t)| alpha * c + t).collect();
                        let mut c_i: Vec<f64> = r_i
                            .iter()
                            .zip(Solver::ineq_residual(&trial_values, &trial_s))
                            .map(|(c, t)| alpha * c + t)
                            .collect();
                        let mut theta_soc_prev = trial.constraint_violation;

                        for _ in 0..config.max_second_order_corrections {
                            status.info.second_order_corrections += 1;
                            solver.compute_step(&c_e, &c_i, mu, &mut soc_step);
                            let alpha_soc = fraction_to_boundary(&solver.s, &soc_step.ps, tau);
                            let (soc_x, soc_s) = solver.trial_point(&soc_step, alpha_soc);
                            let Some((soc_values, soc_trial)) = solver.evaluate_trial(&soc_x, &soc_s, mu, feasible)
                            else {
                                break;
                            };
                            let kind = filter.check(&current, &soc_trial, alpha_soc, phi_slope);
                            if kind != Acceptance::Rejected {
                                accepted = Some(Accepted {
                                    x: soc_x,
                                    s: soc_s,
                                    alpha: alpha_soc,
                                    kind,
                                });
                                break;
                            }
                            if soc_trial.constraint_violation > 0.99 * theta_soc_prev {
                                break;
                            }
                            theta_soc_prev = soc_trial.constraint_violation;
                            for (c, t) in c_e.iter_mut().zip(&soc_values.eq) {
                                *c = alpha_soc * *c + t;
                            }
                            for (c, t) in c_i.iter_mut().zip(Solver::ineq_residual(&soc_values, &soc_s)) {
                                *c = alpha_soc * *c + t;
                            }
                        }
                        if accepted.is_some() {
                            break;
                        }
                    }
                }
                alpha *= config.filter.backtrack_factor;
            }
            accepted
        };

        let mut restoration_used = false;
        let alpha = match accepted {
            Some(acc) => {
                if acc.kind == Acceptance::FilterStep {
                    filter.add(&current);
                }
                solver.x = acc.x;
                solver.s = acc.s;
                for (y, p) in solver.y.iter_mut().zip(&step.py) {
                    *y += acc.alpha * p;
                }
                for (z, p) in solver.z.iter_mut().zip(&step.pz) {
                    *z += alpha_z * p;
                }
                if mu > 0.0 {
                    let kappa = barrier.kappa_sigma;
                    for (z, s) in solver.z.iter_mut().zip(&solver.s) {
                        *z = z.clamp(mu / (kappa * s), kappa * mu / s);
                    }
                }
                acc.alpha
            }
            None => {
                state = state.on(SolverEvent::LineSearchFailed)?;
                filter.add(&current);
                restoration_used = true;

                let restoration = Restoration {
                    config,
                    filter: &filter,
                    mu,
                    deadline,
                    theta_start: theta,
                };
                let outcome = restoration.run(
                    &mut solver.ev,
                    &mut solver.kkt,
                    &mut solver.x,
                    &mut status.info,
                    &mut perf,
                );
                let values = {
                    solver.ev.set_primal(&solver.x);
                    solver.ev.evaluate_primal()
                };
                match outcome {
                    RestorationOutcome::Restored => {
                        state = state.on(SolverEvent::RestorationSucceeded)?;
                        solver.s = slacks_for(&values.ineq, mu.max(f64::EPSILON));
                        solver.y.fill(0.0);
                        for (z, s) in solver.z.iter_mut().zip(&solver.s) {
                            *z = if mu > 0.0 { mu / s } else { 1.0 };
                        }
                        1.0
                    }
                    RestorationOutcome::LocallyInfeasible => {
                        solver.values = values;
                        state = state.on(SolverEvent::InfeasibilityDetected)?;
                        break ExitCondition::LocallyInfeasible;
                    }
                    RestorationOutcome::Failed => {
                        solver.values = values;
                        state = state.on(SolverEvent::RestorationFailed)?;
                        break ExitCondition::FeasibilityRestorationFailed;
                    }
                    RestorationOutcome::FactorizationFailed => {
                        solver.values = values;
                        state = state.on(SolverEvent::FactorizationFailed)?;
                        break ExitCondition::FactorizationFailed;
                    }
                    RestorationOutcome::DeadlinePassed => {
                        solver.values = values;
                        state = state.on(SolverEvent::DeadlinePassed)?;
                        break ExitCondition::Timeout;
                    }
                    RestorationOutcome::Diverged => {
                        solver.values = values;
                        state = state.on(SolverEvent::IteratesDiverged)?;
                        break ExitCondition::DivergingIterates;
                    }
                }
            }
        };

        {
            let _t = perf.scoped(PerfSection::Evaluation);
            solver.ev.set_primal(&solver.x);
            solver.ev.set_duals(&solver.y, &solver.z);
            solver.values = solver.ev.evaluate_all();
        }
        iteration += 1;

        if !solver.values.is_finite() || norm_inf(&solver.x) > config.divergence_threshold {
            log::warn!("iterates diverged at iteration {}", iteration);
            state = state.on(SolverEvent::IteratesDiverged)?;
            break ExitCondition::DivergingIterates;
        }
        if !restoration_used {
            state = state.on(SolverEvent::StepAccepted)?;
        }

        last_record = IterationRecord {
            iteration,
            cost: solver.values.cost,
            constraint_violation: constraint_violation(&solver.values, &solver.s),
            kkt_error: error,
            mu,
            alpha,
            regularization: reg.delta,
            factorizations: reg.factorizations,
            restoration: restoration_used,
        };
        if diag.enabled {
            status.history.push(last_record);
            if diag.should_log(iteration) {
                diagnostics::print_record(&last_record);
            }
        }
    };

    debug_assert!(state.is_terminal());

    solver.ev.set_primal(&solver.x);
    status.exit_condition = exit;
    status.iterations = iteration;
    status.cost = solver.values.cost;
    status.info.kkt_error = last_record.kkt_error;
    status.info.constraint_violation = last_record.constraint_violation;
    status.info.mu = mu;
    status.info.solve_time = start.elapsed();
    status.info.perf = perf;

    log::info!(
        "{} after {} iterations (cost {:.6e}, θ {:.2e}, {:.3} s)",
        exit,
        iteration,
        status.cost,
        last_record.constraint_violation,
        status.info.solve_time.as_secs_f64()
    );
    Ok(())
}
