//! Affine expressions over named dimensions and parameters.
//!
//! An affine expression is a linear combination of variables plus a
//! constant: `aff(x) = c0 + c1*x1 + ... + cn*xn + d1*p1 + ... + dm*pm`.
//! The variable columns cover the dimensions of the enclosing set (or, for
//! a relation, the concatenation of its input and output dimensions); the
//! parameter columns cover the symbolic constants.

use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(param_coeff[j] * param[j]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term.
    pub constant: i64,
    /// Coefficients for each variable column.
    pub coeffs: Vec<i64>,
    /// Coefficients for each parameter column.
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_var: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_var],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_var: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_var, n_param);
        expr.constant = value;
        expr
    }

    /// Create an expression for a single variable.
    pub fn var(idx: usize, n_var: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_var, n_param);
        expr.coeffs[idx] = 1;
        expr
    }

    /// Create an expression for a single parameter.
    pub fn param(idx: usize, n_var: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_var, n_param);
        expr.param_coeffs[idx] = 1;
        expr
    }

    /// Number of variable columns.
    pub fn n_var(&self) -> usize {
        self.coeffs.len()
    }

    /// Number of parameter columns.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Coefficient of variable `idx`.
    pub fn coeff(&self, idx: usize) -> i64 {
        self.coeffs.get(idx).map_or(0, |&c| c)
    }

    /// True if no variable or parameter has a non-zero coefficient.
    pub fn is_constant(&self) -> bool {
        self.coeffs
            .iter()
            .chain(&self.param_coeffs)
            .all(|&c| c == 0)
    }

    /// The constant value, if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        self.is_constant().then_some(self.constant)
    }

    /// Evaluate given concrete variable and parameter values. Columns
    /// beyond the supplied values count as zero.
    pub fn evaluate(&self, var_values: &[i64], param_values: &[i64]) -> i64 {
        let vars: i64 = self
            .coeffs
            .iter()
            .zip(var_values)
            .map(|(&c, &v)| c * v)
            .sum();
        let params: i64 = self
            .param_coeffs
            .iter()
            .zip(param_values)
            .map(|(&c, &v)| c * v)
            .sum();
        self.constant + vars + params
    }

    /// Scale by a constant factor.
    pub fn scale(&self, factor: i64) -> Self {
        let mut scaled = self.clone();
        scaled.constant *= factor;
        for c in scaled.coeffs.iter_mut().chain(scaled.param_coeffs.iter_mut()) {
            *c *= factor;
        }
        scaled
    }

    /// GCD of all variable and parameter coefficients (not the constant).
    pub fn coeff_gcd(&self) -> i64 {
        let mut g = 0i64;
        for &c in self.coeffs.iter().chain(self.param_coeffs.iter()) {
            g = g.gcd(&c.abs());
        }
        g
    }

    /// Insert a zero-coefficient variable column at `pos`.
    pub fn insert_var(&mut self, pos: usize) {
        self.coeffs.insert(pos, 0);
    }

    /// Remove the variable column at `pos`. The coefficient must be zero.
    pub fn remove_var(&mut self, pos: usize) {
        debug_assert_eq!(self.coeffs[pos], 0);
        self.coeffs.remove(pos);
    }

    /// Append a zero-coefficient parameter column.
    pub fn push_param(&mut self) {
        self.param_coeffs.push(0);
    }

    /// Add `sign * other` into this expression. Column layouts must match.
    fn accumulate(&mut self, other: &Self, sign: i64) {
        assert!(
            self.coeffs.len() == other.coeffs.len()
                && self.param_coeffs.len() == other.param_coeffs.len(),
            "mismatched expression layouts"
        );
        self.constant += sign * other.constant;
        for (a, &b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a += sign * b;
        }
        for (a, &b) in self.param_coeffs.iter_mut().zip(&other.param_coeffs) {
            *a += sign * b;
        }
    }

    /// Render with the given variable and parameter names. Terms appear in
    /// column order, variables before parameters, the constant last.
    pub fn to_string_with_names(&self, var_names: &[String], param_names: &[String]) -> String {
        let mut out = String::new();
        for (idx, &coeff) in self.coeffs.iter().enumerate() {
            if coeff != 0 {
                let name = var_names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("d{}", idx));
                push_term(&mut out, coeff, &name);
            }
        }
        for (idx, &coeff) in self.param_coeffs.iter().enumerate() {
            if coeff != 0 {
                let name = param_names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("p{}", idx));
                push_term(&mut out, coeff, &name);
            }
        }
        if out.is_empty() {
            return self.constant.to_string();
        }
        if self.constant != 0 {
            out.push_str(if self.constant < 0 { " - " } else { " + " });
            out.push_str(&self.constant.abs().to_string());
        }
        out
    }
}

/// Append `coeff * name` to a rendered expression, folding the sign into
/// the separator (`a - b` rather than `a + -b`).
fn push_term(out: &mut String, coeff: i64, name: &str) {
    if out.is_empty() {
        if coeff < 0 {
            out.push('-');
        }
    } else {
        out.push_str(if coeff < 0 { " - " } else { " + " });
    }
    let magnitude = coeff.abs();
    if magnitude != 1 {
        out.push_str(&magnitude.to_string());
        out.push('*');
    }
    out.push_str(name);
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.accumulate(&other, 1);
        self
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(mut self, other: Self) -> Self {
        self.accumulate(&other, -1);
        self
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.constant = -self.constant;
        for c in self.coeffs.iter_mut().chain(self.param_coeffs.iter_mut()) {
            *c = -*c;
        }
        self
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate() {
        // 2*x0 - x1 + 3
        let mut expr = AffineExpr::zero(2, 0);
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.constant = 3;
        assert_eq!(expr.evaluate(&[5, 4], &[]), 9);
    }

    #[test]
    fn test_add_sub_neg() {
        let a = AffineExpr::var(0, 2, 0);
        let b = AffineExpr::var(1, 2, 0);
        let sum = a.clone() + b.clone();
        assert_eq!(sum.evaluate(&[3, 4], &[]), 7);
        let diff = a - b;
        assert_eq!(diff.evaluate(&[3, 4], &[]), -1);
        assert_eq!((-diff).evaluate(&[3, 4], &[]), 1);
    }

    #[test]
    fn test_display_names() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;
        expr.constant = -3;
        let s = expr.to_string_with_names(
            &["i".to_string(), "j".to_string()],
            &["N".to_string()],
        );
        assert_eq!(s, "2*i - j + N - 3");
    }

    #[test]
    fn test_display_leading_negative() {
        let mut expr = AffineExpr::zero(1, 0);
        expr.coeffs[0] = -2;
        expr.constant = 9;
        assert_eq!(
            expr.to_string_with_names(&["i".to_string()], &[]),
            "-2*i + 9"
        );
        assert_eq!(AffineExpr::constant(-1, 1, 0).to_string_with_names(&[], &[]), "-1");
    }

    #[test]
    fn test_coeff_gcd() {
        let mut expr = AffineExpr::zero(2, 0);
        expr.coeffs[0] = 4;
        expr.coeffs[1] = -6;
        expr.constant = 3;
        assert_eq!(expr.coeff_gcd(), 2);
    }
}
