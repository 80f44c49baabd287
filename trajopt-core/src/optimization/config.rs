//! Solver configuration.
//!
//! `SolverConfig::default()` honours a handful of `TRAJOPT_*` environment
//! variables so a solve can be tuned without recompiling:
//!
//! | variable                  | field            |
//! |---------------------------|------------------|
//! | `TRAJOPT_TOLERANCE`       | `tolerance`      |
//! | `TRAJOPT_MAX_ITERATIONS`  | `max_iterations` |
//! | `TRAJOPT_TIMEOUT_MS`      | `timeout`        |
//! | `TRAJOPT_FEASIBLE_IPM`    | `feasible_ipm`   |
//! | `TRAJOPT_KKT_ORDERING`    | `kkt_ordering`   |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TrajoptError};
use crate::linalg::{KktOrdering, RegularizationPolicy};

/// Barrier parameter update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarrierSchedule {
    /// Fiacco–McCormick: solve each barrier subproblem to `κ_ε μ`, then shrink μ
    #[default]
    Monotone,
    /// LOQO-style: μ follows the average complementarity every iteration
    Adaptive,
}

impl FromStr for BarrierSchedule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monotone" => Ok(BarrierSchedule::Monotone),
            "adaptive" => Ok(BarrierSchedule::Adaptive),
            other => Err(format!("unknown barrier schedule '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarrierConfig {
    pub schedule: BarrierSchedule,
    /// Initial barrier parameter
    pub mu_init: f64,
    /// Linear decrease factor κ_μ
    pub kappa_mu: f64,
    /// Superlinear decrease exponent θ_μ
    pub theta_mu: f64,
    /// Subproblem tolerance factor κ_ε
    pub kappa_epsilon: f64,
    /// Lower bound τ_min of the fraction-to-boundary parameter
    pub tau_min: f64,
    /// Multiplier safeguard κ_Σ
    pub kappa_sigma: f64,
    /// The adaptive schedule clears the filter once μ falls below this
    /// fraction of its value at the previous clear
    pub adaptive_clear_ratio: f64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            schedule: BarrierSchedule::Monotone,
            mu_init: 0.1,
            kappa_mu: 0.2,
            theta_mu: 1.5,
            kappa_epsilon: 10.0,
            tau_min: 0.99,
            kappa_sigma: 1e10,
            adaptive_clear_ratio: 0.5,
        }
    }
}

/// Filter line-search constants.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Violation margin γ_θ
    pub gamma_theta: f64,
    /// Objective margin γ_φ
    pub gamma_phi: f64,
    /// Switching condition constants δ, s_θ, s_φ
    pub delta: f64,
    pub s_theta: f64,
    pub s_phi: f64,
    /// Armijo constant η_φ
    pub eta_phi: f64,
    /// Upper violation bound as a multiple of `max(1, θ₀)`
    pub theta_max_factor: f64,
    /// Small-violation threshold as a multiple of `max(1, θ₀)`
    pub theta_min_factor: f64,
    /// Safety factor on the minimum step length
    pub alpha_min_factor: f64,
    /// Step-length reduction per backtrack
    pub backtrack_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gamma_theta: 1e-5,
            gamma_phi: 1e-8,
            delta: 1.0,
            s_theta: 1.1,
            s_phi: 2.3,
            eta_phi: 1e-4,
            theta_max_factor: 1e4,
            theta_min_factor: 1e-4,
            alpha_min_factor: 0.05,
            backtrack_factor: 0.5,
        }
    }
}

/// Feasibility restoration constants.
#[derive(Debug, Clone)]
pub struct RestorationConfig {
    pub max_iterations: usize,
    /// Required relative reduction of the violation
    pub required_reduction: f64,
    /// Initial Levenberg–Marquardt damping
    pub lambda_init: f64,
    /// Give up once the damping exceeds this
    pub lambda_max: f64,
    /// `‖Jᵀr‖∞` below which an infeasible point is declared stationary
    pub stationarity_tolerance: f64,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            required_reduction: 0.9,
            lambda_init: 1e-4,
            lambda_max: 1e20,
            stationarity_tolerance: 1e-8,
        }
    }
}

/// Options of one [`Problem::solve`](crate::optimization::Problem::solve).
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Scaled KKT error at which the solve stops with `Success`
    pub tolerance: f64,
    /// Looser tolerance accepted after `acceptable_iterations` consecutive hits
    pub acceptable_tolerance: f64,
    pub acceptable_iterations: usize,
    pub max_iterations: usize,
    /// Wall-clock limit measured from solve entry
    pub timeout: Option<Duration>,
    /// Keep inequality constraints feasible once they are, shortening steps
    /// that would leave the feasible region
    pub feasible_ipm: bool,
    /// Print a per-iteration table to stderr and record history
    pub diagnostics: bool,
    /// Directory receiving ASCII sparsity pictures at solve entry
    pub spy: Option<PathBuf>,
    pub barrier: BarrierConfig,
    pub filter: FilterConfig,
    pub regularization: RegularizationPolicy,
    pub restoration: RestorationConfig,
    pub kkt_ordering: KktOrdering,
    /// Iterative refinement steps per KKT solve
    pub refine_iterations: usize,
    pub max_second_order_corrections: usize,
    /// Scaling threshold s_max of the KKT error
    pub s_max: f64,
    /// `‖x‖∞` above which the iterates count as diverging
    pub divergence_threshold: f64,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: env_parse("TRAJOPT_TOLERANCE").unwrap_or(1e-8),
            acceptable_tolerance: 1e-6,
            acceptable_iterations: 15,
            max_iterations: env_parse("TRAJOPT_MAX_ITERATIONS").unwrap_or(5000),
            timeout: env_parse::<u64>("TRAJOPT_TIMEOUT_MS").map(Duration::from_millis),
            feasible_ipm: env::var("TRAJOPT_FEASIBLE_IPM")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            diagnostics: false,
            spy: None,
            barrier: BarrierConfig::default(),
            filter: FilterConfig::default(),
            regularization: RegularizationPolicy::default(),
            restoration: RestorationConfig::default(),
            kkt_ordering: env_parse("TRAJOPT_KKT_ORDERING").unwrap_or_default(),
            refine_iterations: 1,
            max_second_order_corrections: 4,
            s_max: 100.0,
            divergence_threshold: 1e20,
        }
    }
}

impl SolverConfig {
    /// Set one option from its string form.
    ///
    /// `timeout` is in seconds; `spy` is a directory path.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let bad = |what: &str| TrajoptError::InvalidConfig(format!("invalid value '{}' for {}", value, what));
        match key {
            "tolerance" => self.tolerance = value.trim().parse().map_err(|_| bad(key))?,
            "acceptable_tolerance" => self.acceptable_tolerance = value.trim().parse().map_err(|_| bad(key))?,
            "max_iterations" => self.max_iterations = value.trim().parse().map_err(|_| bad(key))?,
            "timeout" => {
                let secs: f64 = value.trim().parse().map_err(|_| bad(key))?;
                if !(secs.is_finite() && secs >= 0.0) {
                    return Err(bad(key));
                }
                self.timeout = Some(Duration::from_secs_f64(secs));
            }
            "diagnostics" => self.diagnostics = parse_bool(value).ok_or_else(|| bad(key))?,
            "feasible_ipm" => self.feasible_ipm = parse_bool(value).ok_or_else(|| bad(key))?,
            "spy" => self.spy = Some(PathBuf::from(value)),
            "kkt_ordering" => self.kkt_ordering = value.parse().map_err(|_| bad(key))?,
            "barrier_schedule" => self.barrier.schedule = value.parse().map_err(|_| bad(key))?,
            _ => return Err(TrajoptError::InvalidConfig(format!("unknown option '{}'", key))),
        }
        Ok(())
    }

    /// Reject settings the solver cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrajoptError::InvalidConfig(format!("{} must be positive, got {}", name, v)))
            }
        };
        positive("tolerance", self.tolerance)?;
        positive("acceptable_tolerance", self.acceptable_tolerance)?;
        positive("barrier.mu_init", self.barrier.mu_init)?;
        positive("s_max", self.s_max)?;
        if self.max_iterations == 0 {
            return Err(TrajoptError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if !(0.0 < self.barrier.kappa_mu && self.barrier.kappa_mu < 1.0) {
            return Err(TrajoptError::InvalidConfig("barrier.kappa_mu must lie in (0, 1)".into()));
        }
        if !(1.0 < self.barrier.theta_mu && self.barrier.theta_mu < 2.0) {
            return Err(TrajoptError::InvalidConfig("barrier.theta_mu must lie in (1, 2)".into()));
        }
        if !(0.0 < self.barrier.tau_min && self.barrier.tau_min < 1.0) {
            return Err(TrajoptError::InvalidConfig("barrier.tau_min must lie in (0, 1)".into()));
        }
        if !(0.0 < self.barrier.adaptive_clear_ratio && self.barrier.adaptive_clear_ratio < 1.0) {
            return Err(TrajoptError::InvalidConfig(
                "barrier.adaptive_clear_ratio must lie in (0, 1)".into(),
            ));
        }
        if !(0.0 < self.filter.backtrack_factor && self.filter.backtrack_factor < 1.0) {
            return Err(TrajoptError::InvalidConfig("filter.backtrack_factor must lie in (0, 1)".into()));
        }
        Ok(())
    }
}
