use std::env;

use crate::optimization::status::IterationRecord;

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub every: usize,
}

impl DiagnosticsConfig {
    pub fn from_env() -> Self {
        let enabled = match env::var("TRAJOPT_DIAGNOSTICS") {
            Ok(v) => v != "0" && v.to_lowercase() != "false",
            Err(_) => false,
        };

        let every = env::var("TRAJOPT_DIAGNOSTICS_EVERY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1);

        Self { enabled, every }
    }

    /// Environment settings, switched on when the solve config asks for it.
    pub fn resolve(requested: bool) -> Self {
        let mut config = Self::from_env();
        config.enabled |= requested;
        config
    }

    #[inline]
    pub fn should_log(&self, iter: usize) -> bool {
        self.enabled && (iter % self.every == 0)
    }
}

pub(crate) fn print_header() {
    eprintln!(
        "{:>5} {:>1} {:>14} {:>10} {:>10} {:>9} {:>9} {:>9} {:>4}",
        "iter", "", "cost", "θ", "kkt err", "μ", "α", "δ", "fac"
    );
}

pub(crate) fn print_record(r: &IterationRecord) {
    eprintln!(
        "{:>5} {:>1} {:>14.7e} {:>10.3e} {:>10.3e} {:>9.2e} {:>9.2e} {:>9.2e} {:>4}",
        r.iteration,
        if r.restoration { "r" } else { "" },
        r.cost,
        r.constraint_violation,
        r.kkt_error,
        r.mu,
        r.alpha,
        r.regularization,
        r.factorizations
    );
}
