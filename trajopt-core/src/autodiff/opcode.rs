//! Elementary operations recorded in the expression graph.
//!
//! [`eval_forward`] and [`reverse_partials`] evaluate / differentiate one node
//! given its operand values. [`result_type`] propagates the structural
//! classification used to label costs and constraints.

use num_traits::{Float, FloatConst};

use super::expression_type::ExpressionType;
use super::special;

/// Elementary operation codes.
///
/// Binary ops use both operand slots; unary ops use slot 0 only.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ── Leaves ──
    /// Leaf whose value can be set (decision variables, multipliers, parameters).
    Input,
    /// Scalar constant.
    Const,

    // ── Binary ──
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Hypot,

    // ── Unary ──
    Neg,
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Erf,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    /// Zero derivative but needed for re-evaluation.
    Signum,
}

impl OpCode {
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, OpCode::Input | OpCode::Const)
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Pow
                | OpCode::Atan2
                | OpCode::Hypot
        )
    }
}

/// Sign with `sign(0) = 0`, unlike `Float::signum`.
#[inline]
fn sign<T: Float>(a: T) -> T {
    if a > T::zero() {
        T::one()
    } else if a < T::zero() {
        -T::one()
    } else {
        T::zero()
    }
}

/// Evaluate a single opcode in the forward direction.
///
/// For unary ops `b` is ignored. Leaves are never re-evaluated; their stored
/// value is returned by the caller, so they map to `a` here.
#[inline]
pub fn eval_forward<T: Float + FloatConst>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Input | OpCode::Const => a,

        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Pow => a.powf(b),
        OpCode::Atan2 => a.atan2(b),
        OpCode::Hypot => a.hypot(b),

        OpCode::Neg => -a,
        OpCode::Abs => a.abs(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),
        OpCode::Log10 => a.log10(),
        OpCode::Erf => special::erf(a),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),
        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Signum => sign(a),
    }
}

/// Local partial derivatives `(∂r/∂a, ∂r/∂b)` of `r = op(a, b)`.
///
/// `r` is the already computed forward value, reused where the derivative
/// is cheaper in terms of the result (exp, sqrt, tanh, ...).
#[inline]
pub fn reverse_partials<T: Float + FloatConst>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    let two = one + one;
    match op {
        OpCode::Input | OpCode::Const => (zero, zero),

        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -r * inv)
        }
        OpCode::Pow => {
            let da = if b == zero { zero } else { b * a.powf(b - one) };
            let db = if a == zero { zero } else { r * a.ln() };
            (da, db)
        }
        OpCode::Atan2 => {
            let denom = a * a + b * b;
            (b / denom, -a / denom)
        }
        OpCode::Hypot => {
            if r == zero {
                (zero, zero)
            } else {
                (a / r, b / r)
            }
        }

        OpCode::Neg => (-one, zero),
        OpCode::Abs => (sign(a), zero),
        OpCode::Sqrt => (one / (two * r), zero),
        OpCode::Exp => (r, zero),
        OpCode::Ln => (one / a, zero),
        OpCode::Log10 => (one / (a * T::LN_10()), zero),
        OpCode::Erf => (T::FRAC_2_SQRT_PI() * (-a * a).exp(), zero),
        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Tan => (one + r * r, zero),
        OpCode::Asin => (one / (one - a * a).sqrt(), zero),
        OpCode::Acos => (-one / (one - a * a).sqrt(), zero),
        OpCode::Atan => (one / (one + a * a), zero),
        OpCode::Sinh => (a.cosh(), zero),
        OpCode::Cosh => (a.sinh(), zero),
        OpCode::Tanh => (one - r * r, zero),
        OpCode::Signum => (zero, zero),
    }
}

/// Classification of `op(a, b)` from the operand classifications.
///
/// `b_const` carries the value of the second operand when it is a constant,
/// which lets `pow` recognise the exponents 0, 1 and 2.
pub fn result_type(
    op: OpCode,
    a: ExpressionType,
    b: ExpressionType,
    b_const: Option<f64>,
) -> ExpressionType {
    use ExpressionType::*;

    match op {
        OpCode::Input => Linear,
        OpCode::Const => Constant,

        OpCode::Add | OpCode::Sub => a.max(b),
        OpCode::Mul => {
            if a == Constant {
                b
            } else if b == Constant {
                a
            } else if a == Linear && b == Linear {
                Quadratic
            } else {
                Nonlinear
            }
        }
        OpCode::Div => {
            if b == Constant {
                a
            } else {
                Nonlinear
            }
        }
        OpCode::Pow => {
            if a == Constant && b == Constant {
                Constant
            } else if b == Constant {
                match b_const {
                    Some(e) if e == 0.0 => Constant,
                    Some(e) if e == 1.0 => a,
                    Some(e) if e == 2.0 && a == Linear => Quadratic,
                    _ => Nonlinear,
                }
            } else {
                Nonlinear
            }
        }
        OpCode::Atan2 | OpCode::Hypot => {
            if a == Constant && b == Constant {
                Constant
            } else {
                Nonlinear
            }
        }

        OpCode::Neg => a,
        _ => {
            if a == Constant {
                Constant
            } else {
                Nonlinear
            }
        }
    }
}
