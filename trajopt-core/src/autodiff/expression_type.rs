use std::fmt;

/// Structural classification of an expression.
///
/// Variants are ordered by generality, so the classification of a set of
/// expressions is simply the maximum over its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExpressionType {
    /// No expression at all (e.g. no cost was set)
    #[default]
    None,
    /// Does not depend on any leaf that can change
    Constant,
    /// Affine in its leaves
    Linear,
    /// At most quadratic in its leaves
    Quadratic,
    /// Anything else
    Nonlinear,
}

impl ExpressionType {
    /// True when derivatives of the expression do not depend on leaf values.
    #[inline]
    pub fn has_constant_derivative(self) -> bool {
        self <= ExpressionType::Linear
    }

    /// Classification of a collection: the most general member, `None` if empty.
    pub fn most_general<I: IntoIterator<Item = ExpressionType>>(types: I) -> ExpressionType {
        types.into_iter().max().unwrap_or(ExpressionType::None)
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::None => write!(f, "none"),
            ExpressionType::Constant => write!(f, "constant"),
            ExpressionType::Linear => write!(f, "linear"),
            ExpressionType::Quadratic => write!(f, "quadratic"),
            ExpressionType::Nonlinear => write!(f, "nonlinear"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(ExpressionType::None < ExpressionType::Constant);
        assert!(ExpressionType::Constant < ExpressionType::Linear);
        assert!(ExpressionType::Linear < ExpressionType::Quadratic);
        assert!(ExpressionType::Quadratic < ExpressionType::Nonlinear);
    }

    #[test]
    fn test_most_general() {
        assert_eq!(ExpressionType::most_general([]), ExpressionType::None);
        assert_eq!(
            ExpressionType::most_general([ExpressionType::Linear, ExpressionType::Quadratic]),
            ExpressionType::Quadratic
        );
    }
}
