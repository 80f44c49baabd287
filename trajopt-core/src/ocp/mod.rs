//! Optimal control problems transcribed into a [`Problem`].
//!
//! An [`OcpSolver`] lays out a state trajectory `X` (`num_states × N+1`), an
//! input trajectory `U` (`num_inputs × N`) and the timesteps `dt` (`1 × N`),
//! then ties consecutive states together with dynamics constraints built by
//! the chosen [`TranscriptionMethod`]. Bounds, boundary conditions, per-step
//! constraints and the cost are added on top before calling
//! [`OcpSolver::solve`].
//!
//! [`Problem`]: crate::optimization::Problem

mod solver;
mod transcription;

use std::fmt;
use std::str::FromStr;

use crate::autodiff::{Variable, VariableMatrix};
use crate::error::{Result, TrajoptError};

pub use solver::OcpSolver;

/// What the dynamics callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DynamicsType {
    /// `ẋ = f(t, x, u, dt)`
    #[default]
    ExplicitOde,
    /// `x_{k+1} = f(t, x_k, u_k, dt)`
    Discrete,
}

/// How the timestep of each interval is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimestepMethod {
    /// Every interval uses the configured `dt`
    #[default]
    Fixed,
    /// One shared `dt` decision variable
    VariableSingle,
    /// One `dt` decision variable per interval
    Variable,
}

/// How dynamics become constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TranscriptionMethod {
    /// Every state is a decision variable, linked to the next by one
    /// integration step (RK4 for ODEs, the map itself for discrete dynamics)
    #[default]
    DirectTranscription,
    /// Hermite–Simpson collocation with a midpoint per interval
    DirectCollocation,
    /// Only the initial state is free; later states are expressions of it
    /// and the inputs
    SingleShooting,
}

impl fmt::Display for TranscriptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionMethod::DirectTranscription => write!(f, "direct-transcription"),
            TranscriptionMethod::DirectCollocation => write!(f, "direct-collocation"),
            TranscriptionMethod::SingleShooting => write!(f, "single-shooting"),
        }
    }
}

impl FromStr for TranscriptionMethod {
    type Err = TrajoptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "direct-transcription" | "transcription" => Ok(TranscriptionMethod::DirectTranscription),
            "direct-collocation" | "collocation" => Ok(TranscriptionMethod::DirectCollocation),
            "single-shooting" | "shooting" => Ok(TranscriptionMethod::SingleShooting),
            other => Err(TrajoptError::InvalidConfig(format!("unknown transcription method '{}'", other))),
        }
    }
}

/// Shape and discretization of an optimal control problem.
#[derive(Debug, Clone)]
pub struct OcpConfig {
    pub num_states: usize,
    pub num_inputs: usize,
    /// Timestep in seconds; the initial guess for variable timesteps
    pub dt: f64,
    /// Number of intervals `N`
    pub num_steps: usize,
    pub dynamics_type: DynamicsType,
    pub timestep_method: TimestepMethod,
    pub transcription_method: TranscriptionMethod,
}

impl OcpConfig {
    /// Fixed-step direct transcription of an explicit ODE.
    pub fn new(num_states: usize, num_inputs: usize, dt: f64, num_steps: usize) -> Self {
        Self {
            num_states,
            num_inputs,
            dt,
            num_steps,
            dynamics_type: DynamicsType::default(),
            timestep_method: TimestepMethod::default(),
            transcription_method: TranscriptionMethod::default(),
        }
    }

    pub fn with_dynamics_type(mut self, dynamics_type: DynamicsType) -> Self {
        self.dynamics_type = dynamics_type;
        self
    }

    pub fn with_timestep_method(mut self, timestep_method: TimestepMethod) -> Self {
        self.timestep_method = timestep_method;
        self
    }

    pub fn with_transcription_method(mut self, transcription_method: TranscriptionMethod) -> Self {
        self.transcription_method = transcription_method;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.num_states == 0 {
            return Err(TrajoptError::InvalidProblem("an OCP needs at least one state".into()));
        }
        if self.num_steps == 0 {
            return Err(TrajoptError::InvalidProblem("an OCP needs at least one step".into()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(TrajoptError::InvalidProblem(format!("timestep must be positive, got {}", self.dt)));
        }
        if self.dynamics_type == DynamicsType::Discrete
            && self.transcription_method == TranscriptionMethod::DirectCollocation
        {
            return Err(TrajoptError::InvalidProblem(
                "direct collocation requires explicit ODE dynamics".into(),
            ));
        }
        Ok(())
    }
}

/// One interval of the trajectory, handed to
/// [`OcpSolver::for_each_step`].
#[derive(Debug, Clone)]
pub struct Stage {
    pub index: usize,
    /// Time at the start of the interval
    pub t: Variable,
    /// State at the start of the interval (`num_states × 1`)
    pub x: VariableMatrix,
    /// Input held over the interval (`num_inputs × 1`)
    pub u: VariableMatrix,
    pub dt: Variable,
}
