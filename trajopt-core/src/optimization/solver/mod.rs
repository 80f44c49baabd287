//! The interior-point NLP solver and its pieces.

pub mod diagnostics;
pub(crate) mod evaluator;
pub mod filter;
pub mod interior_point;
pub mod perf;
pub(crate) mod restoration;
pub mod state;

pub use diagnostics::DiagnosticsConfig;
pub use filter::{Acceptance, Filter, FilterEntry};
pub use interior_point::IterationCallback;
pub use perf::{PerfSection, PerfTimers};
pub use state::{SolverEvent, SolverState};
