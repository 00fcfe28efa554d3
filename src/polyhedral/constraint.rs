//! Affine constraints and constraint systems.
//!
//! A constraint is a linear inequality or equality over the columns of an
//! [`AffineExpr`]:
//! - Inequality: `expr >= 0`
//! - Equality: `expr = 0`
//!
//! The system also implements the variable-elimination primitives the rest
//! of the algebra is built on: substitution through an equality, and
//! Fourier–Motzkin combination of inequality pairs. Both produce exact
//! consequences over the integers because constraints are only ever scaled
//! by positive factors and tightened by gcd division.

use crate::polyhedral::expr::AffineExpr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

impl ConstraintKind {
    /// Attach an expression, forming `expr >= 0` or `expr = 0`.
    pub fn applied_to(self, expr: AffineExpr) -> Constraint {
        Constraint { expr, kind: self }
    }

    /// Whether an evaluated expression value satisfies this kind.
    fn holds(self, value: i64) -> bool {
        match self {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    fn relation_text(self) -> &'static str {
        match self {
            ConstraintKind::Inequality => ">=",
            ConstraintKind::Equality => "=",
        }
    }
}

/// A linear constraint: `expr >= 0` or `expr = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression.
    pub expr: AffineExpr,
    /// Kind of constraint.
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Create an inequality constraint: expr >= 0.
    pub fn ge_zero(expr: AffineExpr) -> Self {
        ConstraintKind::Inequality.applied_to(expr)
    }

    /// Create an equality constraint: expr = 0.
    pub fn eq_zero(expr: AffineExpr) -> Self {
        ConstraintKind::Equality.applied_to(expr)
    }

    /// True for equality constraints.
    pub fn is_equality(&self) -> bool {
        self.kind == ConstraintKind::Equality
    }

    /// Check satisfaction at a concrete point.
    pub fn is_satisfied(&self, var_values: &[i64], param_values: &[i64]) -> bool {
        self.kind.holds(self.expr.evaluate(var_values, param_values))
    }

    /// Divide through by the gcd of the variable/parameter coefficients,
    /// tightening the constant term for inequalities.
    ///
    /// Returns `None` when the constraint is unsatisfiable (an equality
    /// whose constant is not divisible by the coefficient gcd).
    pub fn normalize(mut self) -> Option<Self> {
        let g = self.expr.coeff_gcd();
        if g > 1 {
            for c in self
                .expr
                .coeffs
                .iter_mut()
                .chain(self.expr.param_coeffs.iter_mut())
            {
                *c /= g;
            }
            match self.kind {
                ConstraintKind::Inequality => {
                    self.expr.constant = self.expr.constant.div_euclid(g);
                }
                ConstraintKind::Equality => {
                    if self.expr.constant % g != 0 {
                        return None;
                    }
                    self.expr.constant /= g;
                }
            }
        }
        Some(self)
    }

    /// True for a constraint with no variables that always holds.
    pub fn is_trivially_true(&self) -> bool {
        self.expr
            .as_constant()
            .map_or(false, |v| self.kind.holds(v))
    }

    /// True for a constraint with no variables that never holds.
    pub fn is_trivially_false(&self) -> bool {
        self.expr
            .as_constant()
            .map_or(false, |v| !self.kind.holds(v))
    }

    /// Render with the given names.
    pub fn to_string_with_names(&self, var_names: &[String], param_names: &[String]) -> String {
        format!(
            "{} {} 0",
            self.expr.to_string_with_names(var_names, param_names),
            self.kind.relation_text()
        )
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

/// A conjunction of constraints over a fixed column layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// All constraints in the system.
    pub constraints: Vec<Constraint>,
    /// Number of variable columns.
    pub n_var: usize,
    /// Number of parameter columns.
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an empty system.
    pub fn new(n_var: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_var,
            n_param,
        }
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert!(
            constraint.expr.n_var() == self.n_var && constraint.expr.n_param() == self.n_param,
            "constraint columns do not match the system layout"
        );
        self.constraints.push(constraint);
    }

    /// Check a concrete point against every constraint.
    pub fn is_satisfied(&self, var_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints
            .iter()
            .all(|c| c.kind.holds(c.expr.evaluate(var_values, param_values)))
    }

    /// True when some constraint is a constant contradiction.
    pub fn is_obviously_empty(&self) -> bool {
        self.constraints.iter().any(|c| c.is_trivially_false())
    }

    /// Insert a zero-coefficient variable column at `pos` in every
    /// constraint.
    pub fn insert_var(&mut self, pos: usize) {
        for c in &mut self.constraints {
            c.expr.insert_var(pos);
        }
        self.n_var += 1;
    }

    /// Remove the variable column at `pos`. Every coefficient in that
    /// column must already be zero.
    pub fn remove_var(&mut self, pos: usize) {
        for c in &mut self.constraints {
            c.expr.remove_var(pos);
        }
        self.n_var -= 1;
    }

    /// Append a parameter column.
    pub fn push_param(&mut self) {
        for c in &mut self.constraints {
            c.expr.push_param();
        }
        self.n_param += 1;
    }

    /// Eliminate variable `v`: the resulting system has the same column
    /// layout but a zero coefficient on `v` in every constraint.
    ///
    /// If an equality mentions `v`, every other constraint is rewritten
    /// through it; otherwise pairs of opposite-sign inequalities are
    /// combined (Fourier–Motzkin) and single-sided constraints on `v` are
    /// dropped.
    pub fn eliminate_var(&mut self, v: usize) {
        // Prefer the equality with the smallest |coefficient| on v.
        let eq_idx = self
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_equality() && c.expr.coeff(v) != 0)
            .min_by_key(|(_, c)| c.expr.coeff(v).abs())
            .map(|(i, _)| i);

        if let Some(idx) = eq_idx {
            let eq = self.constraints.remove(idx);
            let c_eq = eq.expr.coeff(v);
            let mut rewritten = Vec::with_capacity(self.constraints.len());
            for cst in self.constraints.drain(..) {
                let a = cst.expr.coeff(v);
                if a == 0 {
                    rewritten.push(cst);
                    continue;
                }
                // |c_eq| * cst - a * sign(c_eq) * eq zeroes the column.
                let scaled = cst.expr.scale(c_eq.abs());
                let correction = eq.expr.scale(a * c_eq.signum());
                let combined = Constraint {
                    expr: scaled - correction,
                    kind: cst.kind,
                };
                match combined.normalize() {
                    Some(c) if c.is_trivially_true() => {}
                    Some(c) => rewritten.push(c),
                    None => rewritten.push(always_false(self.n_var, self.n_param)),
                }
            }
            self.constraints = rewritten;
            return;
        }

        let (mentioning, mut kept): (Vec<_>, Vec<_>) = self
            .constraints
            .drain(..)
            .partition(|c| c.expr.coeff(v) != 0);
        let (pos, neg): (Vec<_>, Vec<_>) =
            mentioning.into_iter().partition(|c| c.expr.coeff(v) > 0);
        for p in &pos {
            for n in &neg {
                let cp = p.expr.coeff(v);
                let cn = n.expr.coeff(v).abs();
                let combined =
                    Constraint::ge_zero(p.expr.scale(cn) + n.expr.scale(cp));
                match combined.normalize() {
                    Some(c) if c.is_trivially_true() => {}
                    Some(c) => kept.push(c),
                    None => kept.push(always_false(self.n_var, self.n_param)),
                }
            }
        }
        self.constraints = kept;
    }

    /// Substitute variable `v` with an affine expression whose coefficient
    /// on `v` is zero. The column stays but every coefficient becomes zero.
    pub fn substitute_var(&mut self, v: usize, replacement: &AffineExpr) {
        debug_assert_eq!(replacement.coeff(v), 0);
        for c in &mut self.constraints {
            let a = c.expr.coeff(v);
            if a != 0 {
                c.expr.coeffs[v] = 0;
                c.expr = c.expr.clone() + replacement.scale(a);
            }
        }
    }

    /// Normalize every constraint, drop duplicates and tautologies.
    pub fn coalesce(&mut self) {
        let mut seen: Vec<Constraint> = Vec::new();
        for c in self.constraints.drain(..) {
            let c = match c.normalize() {
                Some(c) => c,
                None => always_false(self.n_var, self.n_param),
            };
            if c.is_trivially_true() || seen.contains(&c) {
                continue;
            }
            seen.push(c);
        }
        self.constraints = seen;
    }
}

fn always_false(n_var: usize, n_param: usize) -> Constraint {
    Constraint::ge_zero(AffineExpr::constant(-1, n_var, n_param))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(var: usize, n_var: usize) -> (Constraint, Constraint) {
        // 0 <= var <= 9
        let lower = Constraint::ge_zero(AffineExpr::var(var, n_var, 0));
        let mut upper = -AffineExpr::var(var, n_var, 0);
        upper.constant = 9;
        (lower, Constraint::ge_zero(upper))
    }

    #[test]
    fn test_satisfaction() {
        let mut sys = ConstraintSystem::new(2, 0);
        let (l0, u0) = bound(0, 2);
        let (l1, u1) = bound(1, 2);
        sys.add(l0);
        sys.add(u0);
        sys.add(l1);
        sys.add(u1);
        assert!(sys.is_satisfied(&[0, 9], &[]));
        assert!(!sys.is_satisfied(&[10, 0], &[]));
    }

    #[test]
    fn test_kind_display() {
        let c = Constraint::eq_zero(AffineExpr::var(0, 1, 0));
        assert_eq!(c.to_string_with_names(&["x".to_string()], &[]), "x = 0");
        let c = Constraint::ge_zero(AffineExpr::var(0, 1, 0));
        assert_eq!(c.to_string_with_names(&["x".to_string()], &[]), "x >= 0");
    }

    #[test]
    fn test_eliminate_by_equality() {
        // x0 = 2*x1 + x2, 0 <= x0 <= 9; eliminating x0 must give
        // 0 <= 2*x1 + x2 <= 9.
        let mut sys = ConstraintSystem::new(3, 0);
        let mut eq = AffineExpr::var(0, 3, 0);
        eq.coeffs[1] = -2;
        eq.coeffs[2] = -1;
        sys.add(Constraint::eq_zero(eq));
        let (l, u) = bound(0, 3);
        sys.add(l);
        sys.add(u);

        sys.eliminate_var(0);
        assert!(sys.constraints.iter().all(|c| c.expr.coeff(0) == 0));
        // (x1, x2) = (4, 1) -> x0 = 9: satisfied
        assert!(sys.is_satisfied(&[0, 4, 1], &[]));
        // (x1, x2) = (5, 0) -> x0 = 10: not satisfied
        assert!(!sys.is_satisfied(&[0, 5, 0], &[]));
    }

    #[test]
    fn test_fourier_motzkin() {
        // 0 <= x0 and x0 + x1 <= 5; eliminating x0 gives x1 <= 5.
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::ge_zero(AffineExpr::var(0, 2, 0)));
        let mut e = -AffineExpr::var(0, 2, 0) - AffineExpr::var(1, 2, 0);
        e.constant = 5;
        sys.add(Constraint::ge_zero(e));

        sys.eliminate_var(0);
        assert_eq!(sys.constraints.len(), 1);
        assert!(sys.is_satisfied(&[0, 5], &[]));
        assert!(!sys.is_satisfied(&[0, 6], &[]));
    }

    #[test]
    fn test_normalize_tightens() {
        // 2*x0 - 3 >= 0 tightens to x0 - 2 >= 0 (x0 >= 2 over integers).
        let mut e = AffineExpr::var(0, 1, 0).scale(2);
        e.constant = -3;
        let c = Constraint::ge_zero(e).normalize().unwrap();
        assert_eq!(c.expr.coeff(0), 1);
        assert_eq!(c.expr.constant, -2);
    }

    #[test]
    fn test_coalesce_dedup() {
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(Constraint::ge_zero(AffineExpr::var(0, 1, 0)));
        sys.add(Constraint::ge_zero(AffineExpr::var(0, 1, 0)));
        sys.add(Constraint::ge_zero(AffineExpr::constant(1, 1, 0)));
        sys.coalesce();
        assert_eq!(sys.constraints.len(), 1);
    }
}
