use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone)]
pub enum PerfSection {
    Evaluation,
    KktAssembly,
    Factorization,
    Backsolve,
    LineSearch,
    Restoration,
    Other,
}

/// Wall time accumulated per solver section.
#[derive(Debug, Default, Clone)]
pub struct PerfTimers {
    pub evaluation: Duration,
    pub kkt_assembly: Duration,
    pub factorization: Duration,
    pub backsolve: Duration,
    pub line_search: Duration,
    pub restoration: Duration,
    pub other: Duration,
}

impl PerfTimers {
    pub fn scoped(&mut self, section: PerfSection) -> PerfGuard<'_> {
        PerfGuard {
            section,
            start: Instant::now(),
            timers: self,
        }
    }

    pub fn add(&mut self, section: PerfSection, dt: Duration) {
        match section {
            PerfSection::Evaluation => self.evaluation += dt,
            PerfSection::KktAssembly => self.kkt_assembly += dt,
            PerfSection::Factorization => self.factorization += dt,
            PerfSection::Backsolve => self.backsolve += dt,
            PerfSection::LineSearch => self.line_search += dt,
            PerfSection::Restoration => self.restoration += dt,
            PerfSection::Other => self.other += dt,
        }
    }

    pub fn total(&self) -> Duration {
        self.evaluation
            + self.kkt_assembly
            + self.factorization
            + self.backsolve
            + self.line_search
            + self.restoration
            + self.other
    }
}

pub struct PerfGuard<'a> {
    section: PerfSection,
    start: Instant,
    timers: &'a mut PerfTimers,
}

impl Drop for PerfGuard<'_> {
    fn drop(&mut self) {
        self.timers.add(self.section, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_accumulates_on_drop() {
        let mut timers = PerfTimers::default();
        {
            let _g = timers.scoped(PerfSection::Factorization);
            std::thread::sleep(Duration::from_millis(2));
        }
        timers.add(PerfSection::Other, Duration::from_millis(1));
        assert!(timers.factorization >= Duration::from_millis(2));
        assert_eq!(timers.total(), timers.factorization + Duration::from_millis(1));
    }
}
