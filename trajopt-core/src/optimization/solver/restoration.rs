//! Feasibility restoration.
//!
//! Entered when the filter line search cannot find an acceptable step.
//! The objective is ignored and `½‖r(x)‖²` is minimized with damped
//! Gauss–Newton (Levenberg–Marquardt) steps, where `r` stacks the equality
//! residuals and the violated part `min(0, ci)` of the inequalities. Each
//! step solves the augmented system
//!
//! ```text
//! [ λI   Jᵀ ] [ p ]   [  0 ]
//! [ J   -I  ] [ w ] = [ -r ]
//! ```
//!
//! on the pattern of the regular KKT matrix, so no second symbolic
//! factorization is needed.

use std::time::Instant;

use super::evaluator::{NlpEvaluator, PrimalValues};
use super::filter::{Filter, FilterEntry};
use super::perf::{PerfSection, PerfTimers};
use crate::linalg::KktSystem;
use crate::linalg::sparse::coo_matvec_transpose;
use crate::optimization::config::SolverConfig;
use crate::optimization::status::SolveInfo;
use crate::util::norm_inf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestorationOutcome {
    /// Found a point acceptable to the filter with reduced violation
    Restored,
    /// Converged to a stationary point of the violation that is infeasible
    LocallyInfeasible,
    /// Could not make progress
    Failed,
    FactorizationFailed,
    DeadlinePassed,
    Diverged,
}

pub(crate) struct Restoration<'a> {
    pub config: &'a SolverConfig,
    pub filter: &'a Filter,
    pub mu: f64,
    pub deadline: Option<Instant>,
    /// Violation of the point where the line search failed
    pub theta_start: f64,
}

/// Slacks matched to the constraint values, kept at least `mu`.
pub(crate) fn slacks_for(ineq: &[f64], mu: f64) -> Vec<f64> {
    ineq.iter().map(|&c| c.max(mu)).collect()
}

/// `‖ce‖₁ + ‖ci − s‖₁`
pub(crate) fn constraint_violation(values: &PrimalValues, s: &[f64]) -> f64 {
    values.eq.iter().map(|c| c.abs()).sum::<f64>()
        + values.ineq.iter().zip(s).map(|(c, si)| (c - si).abs()).sum::<f64>()
}

/// `f − μ Σ ln sᵢ`
pub(crate) fn barrier_cost(cost: f64, s: &[f64], mu: f64) -> f64 {
    cost - mu * s.iter().map(|si| si.ln()).sum::<f64>()
}

fn residual_sq(values: &PrimalValues) -> f64 {
    values.eq.iter().map(|c| c * c).sum::<f64>() + values.ineq.iter().map(|c| c.min(0.0).powi(2)).sum::<f64>()
}

impl Restoration<'_> {
    /// Run restoration from `x`, leaving the best point found in `x`.
    pub(crate) fn run(
        &self,
        ev: &mut NlpEvaluator,
        kkt: &mut KktSystem,
        x: &mut [f64],
        info: &mut SolveInfo,
        perf: &mut PerfTimers,
    ) -> RestorationOutcome {
        let _timer = perf.scoped(PerfSection::Restoration);
        let rc = &self.config.restoration;
        let n = ev.num_variables();
        debug_assert_eq!(x.len(), n);
        let m_eq = ev.eq_jacobian().rows();
        let m_ineq = ev.ineq_jacobian().rows();
        let dim = n + m_eq + m_ineq;

        info.restoration_phases += 1;
        log::debug!("entering feasibility restoration (θ = {:.3e})", self.theta_start);

        let mut lambda = rc.lambda_init;
        ev.set_primal(x);
        let mut values = ev.evaluate_constraints();
        let mut r2 = residual_sq(&values);

        let mut rhs = vec![0.0; dim];
        let mut sol = vec![0.0; dim];
        let mut jtr = vec![0.0; n];
        let mut trial = vec![0.0; n];

        for k in 0..rc.max_iterations {
            info.restoration_iterations += 1;
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return RestorationOutcome::DeadlinePassed;
            }

            let s = slacks_for(&values.ineq, self.mu);
            let theta = constraint_violation(&values, &s);
            if k > 0 {
                let entry = FilterEntry::new(theta, barrier_cost(values.cost, &s, self.mu));
                let reduced = theta <= rc.required_reduction * self.theta_start || theta <= self.config.tolerance;
                if reduced && self.filter.is_acceptable_to_filter(&entry) {
                    log::debug!("feasibility restoration succeeded after {} iterations (θ = {:.3e})", k, theta);
                    return RestorationOutcome::Restored;
                }
            }

            let active: Vec<bool> = values.ineq.iter().map(|&c| c < 0.0).collect();
            let r_ineq: Vec<f64> = values.ineq.iter().map(|&c| c.min(0.0)).collect();

            jtr.fill(0.0);
            let (ae, ai) = (ev.eq_jacobian(), ev.ineq_jacobian());
            coo_matvec_transpose(ae.entries(), ae.data(), &values.eq, &mut jtr, 1.0);
            coo_matvec_transpose(ai.entries(), ai.data(), &r_ineq, &mut jtr, 1.0);
            if norm_inf(&jtr) <= rc.stationarity_tolerance && r2.sqrt() > self.config.tolerance {
                log::warn!(
                    "constraint violation is stationary at ‖r‖ = {:.3e}: problem is locally infeasible",
                    r2.sqrt()
                );
                return RestorationOutcome::LocallyInfeasible;
            }

            if let Err(e) = kkt.assemble_restoration(lambda, ae.data(), ai.data(), &active) {
                log::error!("restoration assembly failed: {}", e);
                return RestorationOutcome::Failed;
            }
            match kkt.factor() {
                Ok(state) => info.factorizations += state.factorizations,
                Err(e) => {
                    log::warn!("restoration factorization failed: {}", e);
                    return RestorationOutcome::FactorizationFailed;
                }
            }

            rhs[..n].fill(0.0);
            for (dst, c) in rhs[n..n + m_eq].iter_mut().zip(&values.eq) {
                *dst = -c;
            }
            for (dst, c) in rhs[n + m_eq..].iter_mut().zip(&r_ineq) {
                *dst = -c;
            }
            kkt.solve(&rhs, &mut sol);

            for i in 0..n {
                trial[i] = x[i] + sol[i];
            }
            ev.set_primal(&trial);
            let trial_values = ev.evaluate_constraints();
            let trial_r2 = residual_sq(&trial_values);

            if trial_values.is_finite() && trial_r2 < r2 {
                x.copy_from_slice(&trial);
                values = trial_values;
                r2 = trial_r2;
                lambda = (lambda / 3.0).max(1e-12);
                if norm_inf(x) > self.config.divergence_threshold {
                    return RestorationOutcome::Diverged;
                }
            } else {
                lambda *= 10.0;
                if lambda > rc.lambda_max {
                    log::warn!("feasibility restoration stalled (λ = {:.1e})", lambda);
                    ev.set_primal(x);
                    ev.evaluate_constraints();
                    return RestorationOutcome::Failed;
                }
                ev.set_primal(x);
                values = ev.evaluate_constraints();
            }
        }

        log::warn!("feasibility restoration hit its iteration limit ({})", rc.max_iterations);
        RestorationOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Context;
    use crate::linalg::{KktStructure, RegularizationPolicy};
    use crate::optimization::config::FilterConfig;

    fn kkt_for(ev: &NlpEvaluator) -> KktSystem {
        let structure = KktStructure {
            n: ev.num_variables(),
            m_eq: ev.eq_jacobian().rows(),
            m_ineq: ev.ineq_jacobian().rows(),
            hessian: ev.hessian().entries(),
            eq_jacobian: ev.eq_jacobian().entries(),
            ineq_jacobian: ev.ineq_jacobian().entries(),
        };
        KktSystem::new(&structure, Default::default(), RegularizationPolicy::default(), 1).unwrap()
    }

    #[test]
    fn test_measures() {
        let values = PrimalValues {
            cost: 2.0,
            eq: vec![1.0, -2.0],
            ineq: vec![-1.0, 3.0],
        };
        let s = slacks_for(&values.ineq, 0.1);
        assert_eq!(s, vec![0.1, 3.0]);
        assert!((constraint_violation(&values, &s) - 4.1).abs() < 1e-15);
        assert!((barrier_cost(2.0, &[1.0], 0.5) - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_restores_circle_intersection() {
        let ctx = Context::new();
        let x = ctx.input(3.0);
        let y = ctx.input(-2.0);
        let cost = &x + &y;
        let eq = vec![&x * &x + &y * &y - 1.0];
        let ineq = vec![y.clone()];
        let xs = vec![x.clone(), y.clone()];
        let mut ev = NlpEvaluator::new(&ctx, &xs, &cost, &eq, &ineq);
        let mut kkt = kkt_for(&ev);

        let config = SolverConfig::default();
        let mut filter = Filter::new(FilterConfig::default());
        filter.reset(100.0);
        let restoration = Restoration {
            config: &config,
            filter: &filter,
            mu: 0.1,
            deadline: None,
            theta_start: 14.0,
        };
        let mut point = vec![3.0, -2.0];
        let mut info = SolveInfo::default();
        let mut perf = PerfTimers::default();
        let outcome = restoration.run(&mut ev, &mut kkt, &mut point, &mut info, &mut perf);
        assert_eq!(outcome, RestorationOutcome::Restored);
        let violation = (point[0] * point[0] + point[1] * point[1] - 1.0).abs() + (-point[1]).max(0.0);
        assert!(violation < 0.9 * 14.0);
        assert_eq!(info.restoration_phases, 1);
    }

    #[test]
    fn test_detects_local_infeasibility() {
        let ctx = Context::new();
        let x = ctx.input(0.1);
        let cost = x.clone();
        let eq = vec![&x * &x + 1.0];
        let xs = vec![x.clone()];
        let mut ev = NlpEvaluator::new(&ctx, &xs, &cost, &eq, &[]);
        let mut kkt = kkt_for(&ev);

        let config = SolverConfig::default();
        let mut filter = Filter::new(FilterConfig::default());
        filter.reset(1.01);
        let restoration = Restoration {
            config: &config,
            filter: &filter,
            mu: 0.1,
            deadline: None,
            theta_start: 1.01,
        };
        let mut point = vec![0.1];
        let mut info = SolveInfo::default();
        let mut perf = PerfTimers::default();
        let outcome = restoration.run(&mut ev, &mut kkt, &mut point, &mut info, &mut perf);
        assert_eq!(outcome, RestorationOutcome::LocallyInfeasible);
        assert!(point[0].abs() < 1e-6, "x = {}", point[0]);
    }
}
