//! Two-criterion filter for the line search.
//!
//! A trial point is judged by its constraint violation θ and barrier
//! objective φ. It is acceptable when no filter entry dominates it and it
//! improves on the current iterate in θ or φ. When the current violation
//! is small and the search direction is a descent direction for φ (the
//! switching condition), an Armijo decrease in φ is required instead and the
//! filter is not augmented.

use crate::optimization::config::FilterConfig;

/// A (violation, objective) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterEntry {
    pub constraint_violation: f64,
    pub cost: f64,
}

impl FilterEntry {
    pub fn new(constraint_violation: f64, cost: f64) -> Self {
        Self {
            constraint_violation,
            cost,
        }
    }
}

/// Outcome of testing one trial point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Rejected,
    /// Accepted by sufficient decrease; the current point joins the filter
    FilterStep,
    /// Accepted by the Armijo condition under the switching rule
    ObjectiveStep,
}

#[derive(Debug, Clone)]
pub struct Filter {
    config: FilterConfig,
    entries: Vec<FilterEntry>,
    max_violation: f64,
    min_violation: f64,
}

impl Filter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            max_violation: f64::INFINITY,
            min_violation: 0.0,
        }
    }

    /// Empty the filter and recompute the violation bounds from the
    /// violation of the current point.
    pub fn reset(&mut self, initial_violation: f64) {
        let scale = initial_violation.max(1.0);
        self.entries.clear();
        self.max_violation = self.config.theta_max_factor * scale;
        self.min_violation = self.config.theta_min_factor * scale;
    }

    /// Drop all entries but keep the violation bounds fixed at solve entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_violation(&self) -> f64 {
        self.max_violation
    }

    /// Whether no entry dominates `trial`.
    pub fn is_acceptable_to_filter(&self, trial: &FilterEntry) -> bool {
        self.entries
            .iter()
            .all(|e| trial.constraint_violation < e.constraint_violation || trial.cost < e.cost)
    }

    /// Add `current` to the filter with its margins, dropping entries it dominates.
    pub fn add(&mut self, current: &FilterEntry) {
        let entry = FilterEntry {
            constraint_violation: (1.0 - self.config.gamma_theta) * current.constraint_violation,
            cost: current.cost - self.config.gamma_phi * current.constraint_violation,
        };
        self.entries
            .retain(|e| !(entry.constraint_violation <= e.constraint_violation && entry.cost <= e.cost));
        self.entries.push(entry);
    }

    /// Switching condition: φ descends along the step and the violation is
    /// small compared with the predicted decrease.
    pub fn switching_condition(&self, current: &FilterEntry, alpha: f64, phi_slope: f64) -> bool {
        phi_slope < 0.0
            && current.constraint_violation <= self.min_violation
            && alpha * (-phi_slope).powf(self.config.s_phi)
                > self.config.delta * current.constraint_violation.powf(self.config.s_theta)
    }

    fn armijo(&self, current: &FilterEntry, trial: &FilterEntry, alpha: f64, phi_slope: f64) -> bool {
        trial.cost <= current.cost + self.config.eta_phi * alpha * phi_slope
    }

    fn sufficient_decrease(&self, current: &FilterEntry, trial: &FilterEntry) -> bool {
        trial.constraint_violation <= (1.0 - self.config.gamma_theta) * current.constraint_violation
            || trial.cost <= current.cost - self.config.gamma_phi * current.constraint_violation
    }

    /// Judge a trial point reached with step length `alpha` along a
    /// direction whose directional derivative of φ is `phi_slope`.
    pub fn check(&self, current: &FilterEntry, trial: &FilterEntry, alpha: f64, phi_slope: f64) -> Acceptance {
        if !trial.cost.is_finite() || !trial.constraint_violation.is_finite() {
            return Acceptance::Rejected;
        }
        if trial.constraint_violation > self.max_violation {
            return Acceptance::Rejected;
        }
        if !self.is_acceptable_to_filter(trial) {
            return Acceptance::Rejected;
        }

        if self.switching_condition(current, alpha, phi_slope) {
            if self.armijo(current, trial, alpha, phi_slope) {
                Acceptance::ObjectiveStep
            } else {
                Acceptance::Rejected
            }
        } else if self.sufficient_decrease(current, trial) {
            Acceptance::FilterStep
        } else {
            Acceptance::Rejected
        }
    }

    /// Smallest step length worth trying before giving up on the line search.
    pub fn min_step(&self, current: &FilterEntry, phi_slope: f64) -> f64 {
        let c = &self.config;
        let theta = current.constraint_violation;
        let bound = if phi_slope < 0.0 {
            let mut bound = c.gamma_theta.min(c.gamma_phi * theta / -phi_slope);
            if theta <= self.min_violation {
                bound = bound.min(c.delta * theta.powf(c.s_theta) / (-phi_slope).powf(c.s_phi));
            }
            bound
        } else {
            c.gamma_theta
        };
        c.alpha_min_factor * bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> Filter {
        let mut f = Filter::new(FilterConfig::default());
        f.reset(1.0);
        f
    }

    #[test]
    fn test_dominated_points_are_rejected() {
        let mut f = filter();
        f.add(&FilterEntry::new(1.0, 10.0));
        assert!(!f.is_acceptable_to_filter(&FilterEntry::new(1.0, 10.0)));
        assert!(!f.is_acceptable_to_filter(&FilterEntry::new(2.0, 11.0)));
        assert!(f.is_acceptable_to_filter(&FilterEntry::new(0.5, 11.0)));
        assert!(f.is_acceptable_to_filter(&FilterEntry::new(2.0, 9.0)));
    }

    #[test]
    fn test_add_removes_dominated_entries() {
        let mut f = filter();
        f.add(&FilterEntry::new(2.0, 10.0));
        f.add(&FilterEntry::new(3.0, 5.0));
        assert_eq!(f.len(), 2);
        f.add(&FilterEntry::new(1.0, 1.0));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_sufficient_decrease_step() {
        let f = filter();
        let current = FilterEntry::new(0.5, 1.0);
        // Violation drops, objective rises slightly: a filter step
        let trial = FilterEntry::new(0.1, 1.1);
        assert_eq!(f.check(&current, &trial, 1.0, 1.0), Acceptance::FilterStep);
        // Neither measure improves
        let trial = FilterEntry::new(0.6, 1.2);
        assert_eq!(f.check(&current, &trial, 1.0, 1.0), Acceptance::Rejected);
    }

    #[test]
    fn test_switching_requires_armijo() {
        let f = filter();
        let current = FilterEntry::new(0.0, 1.0);
        assert!(f.switching_condition(&current, 1.0, -1.0));
        let good = FilterEntry::new(0.0, 0.5);
        assert_eq!(f.check(&current, &good, 1.0, -1.0), Acceptance::ObjectiveStep);
        let flat = FilterEntry::new(0.0, 1.0);
        assert_eq!(f.check(&current, &flat, 1.0, -1.0), Acceptance::Rejected);
    }

    #[test]
    fn test_violation_bound() {
        let f = filter();
        let current = FilterEntry::new(1.0, 0.0);
        let trial = FilterEntry::new(f.max_violation() * 2.0, -100.0);
        assert_eq!(f.check(&current, &trial, 1.0, 1.0), Acceptance::Rejected);
    }

    #[test]
    fn test_clear_keeps_violation_bounds() {
        let mut f = Filter::new(FilterConfig::default());
        f.reset(50.0);
        let bound = f.max_violation();
        f.add(&FilterEntry::new(10.0, 1.0));
        f.clear();
        assert!(f.is_empty());
        assert_eq!(f.max_violation(), bound);
        assert!(f.is_acceptable_to_filter(&FilterEntry::new(10.0, 1.0)));
    }

    #[test]
    fn test_min_step_is_positive() {
        let f = filter();
        assert!(f.min_step(&FilterEntry::new(1.0, 0.0), -1.0) > 0.0);
        assert!(f.min_step(&FilterEntry::new(0.0, 0.0), 1.0) > 0.0);
    }
}
