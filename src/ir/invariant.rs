//! Function invariants: symbolic constants fixed for a function call.

use crate::codegen::Expr;
use crate::utils::errors::{Error, Result};

/// A named value that does not change during the execution of a function.
/// Invariants are usable inside body expressions and as loop bounds, and
/// are materialized as `LetStmt`s around the lowered body.
#[derive(Debug, Clone)]
pub struct Invariant {
    name: String,
    expr: Expr,
}

impl Invariant {
    pub(crate) fn new(name: &str, expr: Expr) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidInput("empty invariant name".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            expr,
        })
    }

    /// The variable name holding the invariant's value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The defining expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_rejected() {
        assert!(Invariant::new("", Expr::int(1)).is_err());
        assert!(Invariant::new("N", Expr::int(64)).is_ok());
    }
}
