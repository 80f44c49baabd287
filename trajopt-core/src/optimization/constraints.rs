//! Equality and inequality constraint builders.
//!
//! Constraints are stored in canonical form: every equality expression must
//! equal zero and every inequality expression must be nonnegative. The
//! builders broadcast a scalar against a matrix and compare matrices
//! elementwise.

use crate::autodiff::{Context, Variable, VariableMatrix};

/// Tolerance used by [`EqualityConstraints::is_satisfied`].
pub const EQUALITY_SATISFACTION_TOLERANCE: f64 = 1e-8;

/// One side of a constraint.
#[derive(Debug, Clone)]
pub enum Operand {
    Scalar(f64),
    Var(Variable),
    Matrix(VariableMatrix),
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Scalar(v)
    }
}

impl From<Variable> for Operand {
    fn from(v: Variable) -> Self {
        Operand::Var(v)
    }
}

impl From<&Variable> for Operand {
    fn from(v: &Variable) -> Self {
        Operand::Var(v.clone())
    }
}

impl From<VariableMatrix> for Operand {
    fn from(m: VariableMatrix) -> Self {
        Operand::Matrix(m)
    }
}

impl From<&VariableMatrix> for Operand {
    fn from(m: &VariableMatrix) -> Self {
        Operand::Matrix(m.clone())
    }
}

impl Operand {
    fn context(&self) -> Option<&Context> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Var(v) => Some(v.context()),
            Operand::Matrix(m) => Some(m.context()),
        }
    }

    fn element(&self, ctx: &Context, k: usize) -> Variable {
        match self {
            Operand::Scalar(v) => ctx.constant(*v),
            Operand::Var(v) => v.clone(),
            Operand::Matrix(m) => m[k].clone(),
        }
    }
}

/// Elementwise `lhs - rhs`, broadcasting scalars.
fn differences(lhs: Operand, rhs: Operand) -> Vec<Variable> {
    let ctx = match lhs.context().or_else(|| rhs.context()) {
        Some(ctx) => ctx.clone(),
        None => panic!("a constraint needs at least one non-constant operand"),
    };

    let len = match (&lhs, &rhs) {
        (Operand::Matrix(a), Operand::Matrix(b)) => {
            assert_eq!(
                a.shape(),
                b.shape(),
                "constraint shape mismatch: {:?} vs {:?}",
                a.shape(),
                b.shape()
            );
            a.len()
        }
        (Operand::Matrix(a), _) => a.len(),
        (_, Operand::Matrix(b)) => b.len(),
        _ => 1,
    };

    (0..len)
        .map(|k| lhs.element(&ctx, k) - rhs.element(&ctx, k))
        .collect()
}

/// Constraints of the form `c(x) = 0`.
#[derive(Debug, Clone, Default)]
pub struct EqualityConstraints {
    pub constraints: Vec<Variable>,
}

/// Constraints of the form `c(x) ≥ 0`.
#[derive(Debug, Clone, Default)]
pub struct InequalityConstraints {
    pub constraints: Vec<Variable>,
}

impl EqualityConstraints {
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether every constraint holds at current values, to
    /// [`EQUALITY_SATISFACTION_TOLERANCE`].
    pub fn is_satisfied(&self) -> bool {
        self.is_satisfied_within(EQUALITY_SATISFACTION_TOLERANCE)
    }

    pub fn is_satisfied_within(&self, tolerance: f64) -> bool {
        self.constraints.iter().all(|c| c.value().abs() <= tolerance)
    }

    pub fn extend(&mut self, other: EqualityConstraints) {
        self.constraints.extend(other.constraints);
    }
}

impl InequalityConstraints {
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether every constraint is nonnegative at current values.
    pub fn is_satisfied(&self) -> bool {
        self.is_satisfied_within(0.0)
    }

    pub fn is_satisfied_within(&self, tolerance: f64) -> bool {
        self.constraints.iter().all(|c| c.value() >= -tolerance)
    }

    pub fn extend(&mut self, other: InequalityConstraints) {
        self.constraints.extend(other.constraints);
    }
}

/// `lhs == rhs`
pub fn equals(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> EqualityConstraints {
    EqualityConstraints {
        constraints: differences(lhs.into(), rhs.into()),
    }
}

/// `lhs >= rhs` (a strict `>` is treated the same way)
pub fn geq(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> InequalityConstraints {
    InequalityConstraints {
        constraints: differences(lhs.into(), rhs.into()),
    }
}

/// `lhs <= rhs` (a strict `<` is treated the same way)
pub fn leq(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> InequalityConstraints {
    InequalityConstraints {
        constraints: differences(rhs.into(), lhs.into()),
    }
}

impl Variable {
    pub fn equals(&self, rhs: impl Into<Operand>) -> EqualityConstraints {
        equals(self, rhs)
    }

    pub fn geq(&self, rhs: impl Into<Operand>) -> InequalityConstraints {
        geq(self, rhs)
    }

    pub fn leq(&self, rhs: impl Into<Operand>) -> InequalityConstraints {
        leq(self, rhs)
    }
}

impl VariableMatrix {
    pub fn equals(&self, rhs: impl Into<Operand>) -> EqualityConstraints {
        equals(self, rhs)
    }

    pub fn geq(&self, rhs: impl Into<Operand>) -> InequalityConstraints {
        geq(self, rhs)
    }

    pub fn leq(&self, rhs: impl Into<Operand>) -> InequalityConstraints {
        leq(self, rhs)
    }
}

/// Either kind of constraint set, accepted by
/// [`Problem::subject_to`](crate::optimization::Problem::subject_to).
#[derive(Debug, Clone)]
pub enum Constraints {
    Equality(EqualityConstraints),
    Inequality(InequalityConstraints),
}

impl From<EqualityConstraints> for Constraints {
    fn from(c: EqualityConstraints) -> Self {
        Constraints::Equality(c)
    }
}

impl From<InequalityConstraints> for Constraints {
    fn from(c: InequalityConstraints) -> Self {
        Constraints::Inequality(c)
    }
}
