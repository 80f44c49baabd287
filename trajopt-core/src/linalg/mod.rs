//! Linear algebra layer.
//!
//! Sparse helpers, LDLᵀ factorization with inertia, and the primal-dual
//! KKT system the interior-point solver factors every iteration.

pub mod kkt;
pub mod ldlt;
pub mod regularized;
pub mod sparse;

pub use kkt::{KktError, KktOrdering, KktStructure, KktSystem};
pub use ldlt::{Inertia, LdltError, LdltSolver};
pub use regularized::{RegularizationPolicy, RegularizationState, RegularizedLdlt};
pub use sparse::SparseCsc;
