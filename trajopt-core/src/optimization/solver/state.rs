//! Solve-loop state machine.
//!
//! Every change of phase in the interior-point loop goes through
//! [`SolverState::on`], so the legal transitions are exactly the rows of the
//! table below.

use std::fmt;

use crate::error::{Result, TrajoptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverState {
    Initializing,
    Iterating,
    FeasibilityRestoration,
    /// Rejected before the first iteration (too few degrees of freedom,
    /// non-finite initial point)
    Rejected,
    Converged,
    IterationLimitReached,
    TimedOut,
    LocallyInfeasible,
    FeasibilityRestorationFailed,
    FactorizationFailed,
    DivergingIterates,
    /// Stopped by a user callback
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverEvent {
    /// Setup finished and the initial point is usable
    Initialized,
    ProblemRejected,
    /// Optimality conditions met (to either tolerance)
    KktSatisfied,
    StepAccepted,
    LineSearchFailed,
    RestorationSucceeded,
    RestorationFailed,
    InfeasibilityDetected,
    IterationLimit,
    DeadlinePassed,
    CallbackRequested,
    FactorizationFailed,
    IteratesDiverged,
}

impl SolverState {
    /// Apply `event`, or report that it is not allowed in this state.
    pub fn on(self, event: SolverEvent) -> Result<SolverState> {
        use SolverEvent as E;
        use SolverState as S;

        let next = match (self, event) {
            (S::Initializing, E::Initialized) => S::Iterating,
            (S::Initializing, E::ProblemRejected) => S::Rejected,
            (S::Initializing, E::KktSatisfied) => S::Converged,

            (S::Iterating, E::StepAccepted) => S::Iterating,
            (S::Iterating, E::KktSatisfied) => S::Converged,
            (S::Iterating, E::LineSearchFailed) => S::FeasibilityRestoration,
            (S::Iterating, E::CallbackRequested) => S::Terminated,

            (S::FeasibilityRestoration, E::RestorationSucceeded) => S::Iterating,
            (S::FeasibilityRestoration, E::RestorationFailed) => S::FeasibilityRestorationFailed,
            (S::FeasibilityRestoration, E::InfeasibilityDetected) => S::LocallyInfeasible,

            (S::Iterating | S::FeasibilityRestoration, E::IterationLimit) => S::IterationLimitReached,
            (S::Iterating | S::FeasibilityRestoration, E::DeadlinePassed) => S::TimedOut,
            (S::Iterating | S::FeasibilityRestoration, E::FactorizationFailed) => S::FactorizationFailed,
            (S::Iterating | S::FeasibilityRestoration, E::IteratesDiverged) => S::DivergingIterates,

            (from, event) => return Err(TrajoptError::InvalidTransition { from, event }),
        };
        log::trace!("solver state {} --{:?}--> {}", self, event, next);
        Ok(next)
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            SolverState::Initializing | SolverState::Iterating | SolverState::FeasibilityRestoration
        )
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_solve_path() {
        let s = SolverState::Initializing.on(SolverEvent::Initialized).unwrap();
        let s = s.on(SolverEvent::StepAccepted).unwrap();
        let s = s.on(SolverEvent::LineSearchFailed).unwrap();
        assert_eq!(s, SolverState::FeasibilityRestoration);
        let s = s.on(SolverEvent::RestorationSucceeded).unwrap();
        let s = s.on(SolverEvent::KktSatisfied).unwrap();
        assert_eq!(s, SolverState::Converged);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_restoration_exits() {
        let r = SolverState::FeasibilityRestoration;
        assert_eq!(r.on(SolverEvent::RestorationFailed).unwrap(), SolverState::FeasibilityRestorationFailed);
        assert_eq!(r.on(SolverEvent::InfeasibilityDetected).unwrap(), SolverState::LocallyInfeasible);
        assert_eq!(r.on(SolverEvent::DeadlinePassed).unwrap(), SolverState::TimedOut);
        assert_eq!(r.on(SolverEvent::IterationLimit).unwrap(), SolverState::IterationLimitReached);
    }

    #[test]
    fn test_invalid_transitions_are_errors() {
        let err = SolverState::Initializing.on(SolverEvent::StepAccepted).unwrap_err();
        assert!(matches!(
            err,
            TrajoptError::InvalidTransition {
                from: SolverState::Initializing,
                event: SolverEvent::StepAccepted
            }
        ));
        assert!(SolverState::Converged.on(SolverEvent::StepAccepted).is_err());
        assert!(SolverState::FeasibilityRestoration.on(SolverEvent::CallbackRequested).is_err());
        assert!(SolverState::Iterating.on(SolverEvent::RestorationSucceeded).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SolverState::Iterating.is_terminal());
        assert!(SolverState::Terminated.is_terminal());
        assert!(SolverState::Rejected.is_terminal());
    }
}
