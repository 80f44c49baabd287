//! Scalar expression handle.
//!
//! A [`Variable`] owns one reference to a node of its [`Context`]. Cloning
//! shares the node, dropping releases it. Arithmetic builds new nodes and
//! never touches existing ones.

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::context::{Context, NodeId};
use super::expression_type::ExpressionType;
use super::opcode::{self, OpCode};

/// Scalar symbolic expression.
pub struct Variable {
    ctx: Context,
    id: NodeId,
}

impl Variable {
    /// Take ownership of a freshly pushed node (refcount already 1).
    pub(crate) fn from_new_node(ctx: Context, id: NodeId) -> Self {
        Self { ctx, id }
    }

    /// Wrap an existing node, adding a reference.
    pub(crate) fn from_existing(ctx: &Context, id: NodeId) -> Self {
        ctx.arena_mut().retain(id);
        Self { ctx: ctx.clone(), id }
    }

    #[inline]
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// The context this expression belongs to.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Current value, re-evaluating stale dependencies if leaves changed.
    pub fn value(&self) -> f64 {
        self.ctx.arena_mut().current_value(self.id)
    }

    /// Set the value of a leaf.
    ///
    /// Setting a non-leaf is ignored with a warning; the node would be
    /// overwritten by the next evaluation anyway.
    pub fn set_value(&self, value: f64) {
        let mut arena = self.ctx.arena_mut();
        if arena.node(self.id).op != OpCode::Input {
            log::warn!("set_value on a non-input expression node is ignored");
            return;
        }
        arena.set_value(self.id, value);
    }

    /// Structural classification of this expression.
    pub fn expression_type(&self) -> ExpressionType {
        self.ctx.arena().node(self.id).ty
    }

    /// True for settable leaves (decision variables, multipliers, parameters).
    pub fn is_input(&self) -> bool {
        self.ctx.arena().node(self.id).op == OpCode::Input
    }

    /// Value of a constant node, `None` for anything else.
    pub(crate) fn const_value(&self) -> Option<f64> {
        let arena = self.ctx.arena();
        let node = arena.node(self.id);
        (node.op == OpCode::Const).then_some(node.value)
    }

    /// True when both handles refer to the same node.
    #[inline]
    pub fn same_node(&self, other: &Variable) -> bool {
        self.ctx.same_as(&other.ctx) && self.id == other.id
    }

    fn check_context(&self, other: &Variable) {
        assert!(
            self.ctx.same_as(&other.ctx),
            "operands belong to different expression contexts"
        );
    }

    pub(crate) fn unary(&self, op: OpCode) -> Variable {
        if let Some(a) = self.const_value() {
            return self.ctx.constant(opcode::eval_forward(op, a, 0.0));
        }
        let id = self.ctx.push(op, [Some(self.id), None], 0.0);
        Variable::from_new_node(self.ctx.clone(), id)
    }

    pub(crate) fn binary(&self, op: OpCode, rhs: &Variable) -> Variable {
        self.check_context(rhs);
        if let (Some(a), Some(b)) = (self.const_value(), rhs.const_value()) {
            return self.ctx.constant(opcode::eval_forward(op, a, b));
        }
        let id = self.ctx.push(op, [Some(self.id), Some(rhs.id)], 0.0);
        Variable::from_new_node(self.ctx.clone(), id)
    }

    fn add_impl(&self, rhs: &Variable) -> Variable {
        match (self.const_value(), rhs.const_value()) {
            (Some(a), _) if a == 0.0 => rhs.clone(),
            (_, Some(b)) if b == 0.0 => self.clone(),
            _ => self.binary(OpCode::Add, rhs),
        }
    }

    fn sub_impl(&self, rhs: &Variable) -> Variable {
        match (self.const_value(), rhs.const_value()) {
            (_, Some(b)) if b == 0.0 => self.clone(),
            (Some(a), None) if a == 0.0 => -rhs,
            _ => self.binary(OpCode::Sub, rhs),
        }
    }

    fn mul_impl(&self, rhs: &Variable) -> Variable {
        match (self.const_value(), rhs.const_value()) {
            (Some(a), _) if a == 0.0 => self.clone(),
            (_, Some(b)) if b == 0.0 => rhs.clone(),
            (Some(a), _) if a == 1.0 => rhs.clone(),
            (_, Some(b)) if b == 1.0 => self.clone(),
            _ => self.binary(OpCode::Mul, rhs),
        }
    }

    fn div_impl(&self, rhs: &Variable) -> Variable {
        match (self.const_value(), rhs.const_value()) {
            (Some(a), None) if a == 0.0 => self.clone(),
            (_, Some(b)) if b == 1.0 => self.clone(),
            _ => self.binary(OpCode::Div, rhs),
        }
    }

    pub fn abs(&self) -> Variable {
        self.unary(OpCode::Abs)
    }

    pub fn acos(&self) -> Variable {
        self.unary(OpCode::Acos)
    }

    pub fn asin(&self) -> Variable {
        self.unary(OpCode::Asin)
    }

    pub fn atan(&self) -> Variable {
        self.unary(OpCode::Atan)
    }

    /// Four-quadrant arctangent of `self / x`.
    pub fn atan2(&self, x: &Variable) -> Variable {
        self.binary(OpCode::Atan2, x)
    }

    pub fn cos(&self) -> Variable {
        self.unary(OpCode::Cos)
    }

    pub fn cosh(&self) -> Variable {
        self.unary(OpCode::Cosh)
    }

    pub fn erf(&self) -> Variable {
        self.unary(OpCode::Erf)
    }

    pub fn exp(&self) -> Variable {
        self.unary(OpCode::Exp)
    }

    pub fn hypot(&self, other: &Variable) -> Variable {
        self.binary(OpCode::Hypot, other)
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Variable {
        self.unary(OpCode::Ln)
    }

    pub fn log10(&self) -> Variable {
        self.unary(OpCode::Log10)
    }

    /// `self` raised to an expression-valued power.
    pub fn pow(&self, exponent: &Variable) -> Variable {
        match exponent.const_value() {
            Some(e) => self.powf(e),
            None => self.binary(OpCode::Pow, exponent),
        }
    }

    /// `self` raised to a constant power. Exponents 0 and 1 are elided.
    pub fn powf(&self, exponent: f64) -> Variable {
        if exponent == 0.0 {
            return self.ctx.constant(1.0);
        }
        if exponent == 1.0 {
            return self.clone();
        }
        let e = self.ctx.constant(exponent);
        self.binary(OpCode::Pow, &e)
    }

    pub fn signum(&self) -> Variable {
        self.unary(OpCode::Signum)
    }

    pub fn sin(&self) -> Variable {
        self.unary(OpCode::Sin)
    }

    pub fn sinh(&self) -> Variable {
        self.unary(OpCode::Sinh)
    }

    pub fn sqrt(&self) -> Variable {
        self.unary(OpCode::Sqrt)
    }

    pub fn tan(&self) -> Variable {
        self.unary(OpCode::Tan)
    }

    pub fn tanh(&self) -> Variable {
        self.unary(OpCode::Tanh)
    }
}

impl Clone for Variable {
    fn clone(&self) -> Self {
        Variable::from_existing(&self.ctx, self.id)
    }
}

impl Drop for Variable {
    fn drop(&mut self) {
        self.ctx.release(self.id);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Variable");
        s.field("id", &self.id.index());
        if let Some(node) = self.ctx.try_node(self.id) {
            s.field("op", &node.0).field("value", &node.1);
        }
        s.finish()
    }
}

impl Neg for &Variable {
    type Output = Variable;

    fn neg(self) -> Variable {
        match self.const_value() {
            Some(a) if a == 0.0 => self.clone(),
            _ => self.unary(OpCode::Neg),
        }
    }
}

impl Neg for Variable {
    type Output = Variable;

    fn neg(self) -> Variable {
        -&self
    }
}

macro_rules! impl_binary_op {
    ($Trait:ident, $method:ident, $imp:ident, $AssignTrait:ident, $assign:ident) => {
        impl $Trait<&Variable> for &Variable {
            type Output = Variable;

            fn $method(self, rhs: &Variable) -> Variable {
                self.$imp(rhs)
            }
        }

        impl $Trait<Variable> for &Variable {
            type Output = Variable;

            fn $method(self, rhs: Variable) -> Variable {
                self.$imp(&rhs)
            }
        }

        impl $Trait<&Variable> for Variable {
            type Output = Variable;

            fn $method(self, rhs: &Variable) -> Variable {
                (&self).$imp(rhs)
            }
        }

        impl $Trait<Variable> for Variable {
            type Output = Variable;

            fn $method(self, rhs: Variable) -> Variable {
                (&self).$imp(&rhs)
            }
        }

        impl $Trait<f64> for &Variable {
            type Output = Variable;

            fn $method(self, rhs: f64) -> Variable {
                let rhs = self.ctx.constant(rhs);
                self.$imp(&rhs)
            }
        }

        impl $Trait<f64> for Variable {
            type Output = Variable;

            fn $method(self, rhs: f64) -> Variable {
                (&self).$method(rhs)
            }
        }

        impl $Trait<&Variable> for f64 {
            type Output = Variable;

            fn $method(self, rhs: &Variable) -> Variable {
                let lhs = rhs.ctx.constant(self);
                lhs.$imp(rhs)
            }
        }

        impl $Trait<Variable> for f64 {
            type Output = Variable;

            fn $method(self, rhs: Variable) -> Variable {
                self.$method(&rhs)
            }
        }

        impl $AssignTrait<&Variable> for Variable {
            fn $assign(&mut self, rhs: &Variable) {
                *self = (&*self).$imp(rhs);
            }
        }

        impl $AssignTrait<Variable> for Variable {
            fn $assign(&mut self, rhs: Variable) {
                *self = (&*self).$imp(&rhs);
            }
        }

        impl $AssignTrait<f64> for Variable {
            fn $assign(&mut self, rhs: f64) {
                *self = (&*self).$method(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add, add_impl, AddAssign, add_assign);
impl_binary_op!(Sub, sub, sub_impl, SubAssign, sub_assign);
impl_binary_op!(Mul, mul, mul_impl, MulAssign, mul_assign);
impl_binary_op!(Div, div, div_impl, DivAssign, div_assign);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_values() {
        let ctx = Context::new();
        let x = ctx.input(3.0);
        let y = ctx.input(4.0);
        assert_eq!((&x + &y).value(), 7.0);
        assert_eq!((&x - &y).value(), -1.0);
        assert_eq!((&x * &y).value(), 12.0);
        assert_eq!((&x / &y).value(), 0.75);
        assert_eq!((2.0 - &x).value(), -1.0);
        assert_eq!((-&x).value(), -3.0);
        assert_eq!(x.hypot(&y).value(), 5.0);
        assert_eq!(x.powf(2.0).value(), 9.0);
    }

    #[test]
    fn test_lazy_reevaluation_after_set_value() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = x.sin() * 2.0 + &x;
        assert!((y.value() - (2.0 * 1.0f64.sin() + 1.0)).abs() < 1e-15);
        x.set_value(0.5);
        assert!((y.value() - (2.0 * 0.5f64.sin() + 0.5)).abs() < 1e-15);
    }

    #[test]
    fn test_trivial_operands_are_elided() {
        let ctx = Context::new();
        let x = ctx.input(2.0);
        let zero = ctx.constant(0.0);
        let one = ctx.constant(1.0);
        assert!((&x * &one).same_node(&x));
        assert!((&x + &zero).same_node(&x));
        assert!((&zero + &x).same_node(&x));
        assert!((&x * &zero).same_node(&zero));
        assert!((&x / 1.0).expression_type() == ExpressionType::Linear);
        assert!(x.powf(1.0).same_node(&x));
    }

    #[test]
    fn test_constants_fold() {
        let ctx = Context::new();
        let before = ctx.blocks_in_use();
        let c = ctx.constant(2.0) * 3.0 + 1.0;
        assert_eq!(c.value(), 7.0);
        assert_eq!(c.expression_type(), ExpressionType::Constant);
        assert_eq!(ctx.blocks_in_use(), before + 1);
    }

    #[test]
    fn test_classification() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        assert_eq!((&x * 3.0 + &y).expression_type(), ExpressionType::Linear);
        assert_eq!((&x * &y).expression_type(), ExpressionType::Quadratic);
        assert_eq!(x.powf(2.0).expression_type(), ExpressionType::Quadratic);
        assert_eq!((&x * &y * &x).expression_type(), ExpressionType::Nonlinear);
        assert_eq!(x.exp().expression_type(), ExpressionType::Nonlinear);
        assert_eq!((1.0 / &x).expression_type(), ExpressionType::Nonlinear);
    }

    #[test]
    fn test_compound_assignment() {
        let ctx = Context::new();
        let x = ctx.input(2.0);
        let mut acc = ctx.constant(0.0);
        acc += &x;
        acc *= 3.0;
        acc -= 1.0;
        acc /= &x;
        assert_eq!(acc.value(), 2.5);
    }

    #[test]
    fn test_division_by_zero_propagates_infinity() {
        let ctx = Context::new();
        let x = ctx.input(0.0);
        assert!((1.0 / &x).value().is_infinite());
    }

    #[test]
    #[should_panic(expected = "different expression contexts")]
    fn test_mixing_contexts_panics() {
        let a = Context::new().input(1.0);
        let b = Context::new().input(1.0);
        let _ = &a + &b;
    }
}
