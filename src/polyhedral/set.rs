//! Integer sets over named spaces.
//!
//! A set is the collection of integer points of its space satisfying a
//! conjunction of affine constraints. Sets print and parse in the ISL text
//! form, e.g. `[N] -> { S[i, j] : 0 <= i and i < N }`.

use crate::polyhedral::constraint::ConstraintSystem;
use crate::polyhedral::space::Space;
use crate::utils::errors::{AlgebraError, Result};
use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer set: a named space plus a constraint system over its
/// dimensions and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    /// The space (tuple name and dimension names).
    pub space: Space,
    /// Declared parameter names, in order.
    pub params: Vec<String>,
    /// Constraints over `[dims..., params...]`.
    pub cs: ConstraintSystem,
}

impl Set {
    /// The unconstrained set over a space.
    pub fn universe(space: Space, params: Vec<String>) -> Self {
        let cs = ConstraintSystem::new(space.dim(), params.len());
        Self { space, params, cs }
    }

    /// Parse from ISL set text.
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse_set(text, &[])
    }

    /// Parse from ISL set text with extra pre-declared parameters.
    pub fn parse_with_params(text: &str, extra_params: &[String]) -> Result<Self> {
        crate::parser::parse_set(text, extra_params)
    }

    /// Tuple name of the set.
    pub fn tuple_name(&self) -> &str {
        &self.space.tuple
    }

    /// Set the tuple name.
    pub fn set_tuple_name(&mut self, name: impl Into<String>) {
        self.space.tuple = name.into();
    }

    /// Number of set dimensions.
    pub fn dim(&self) -> usize {
        self.space.dim()
    }

    /// Membership test.
    pub fn contains(&self, point: &[i64], param_values: &[i64]) -> bool {
        let mut values = point.to_vec();
        values.resize(self.dim(), 0);
        self.cs.is_satisfied(&values, param_values)
    }

    /// Intersect with another set over the same space.
    pub fn intersect(&self, other: &Set) -> Result<Set> {
        if self.space.dims.len() != other.space.dims.len() || self.params != other.params {
            return Err(crate::utils::errors::Error::DimensionalityMismatch(format!(
                "cannot intersect `{}` with `{}`",
                self.space, other.space
            )));
        }
        let mut result = self.clone();
        for c in &other.cs.constraints {
            result.cs.add(c.clone());
        }
        result.cs.coalesce();
        Ok(result)
    }

    /// True when some constraint is a constant contradiction.
    pub fn is_obviously_empty(&self) -> bool {
        self.cs.is_obviously_empty()
    }

    /// Insert a dimension at `pos`.
    pub fn insert_dim(&mut self, pos: usize, name: impl Into<String>) {
        self.space.insert_dim(pos, name);
        self.cs.insert_var(pos);
    }

    /// Project out the dimension at `pos`.
    pub fn project_out(&mut self, pos: usize) {
        self.cs.eliminate_var(pos);
        self.cs.remove_var(pos);
        self.space.remove_dim(pos);
    }

    /// Normalize and deduplicate constraints.
    pub fn coalesce(&mut self) {
        self.cs.coalesce();
    }

    /// Exact constant bounds `[lower, upper]` of dimension `d`, given
    /// concrete parameter values. Errors when the dimension is unbounded.
    pub fn dim_bounds(&self, d: usize, param_values: &[i64]) -> Result<(i64, i64)> {
        let mut cs = self.cs.clone();
        // Fold parameters into the constant term.
        for c in &mut cs.constraints {
            for (i, &pc) in c.expr.param_coeffs.clone().iter().enumerate() {
                if pc != 0 {
                    let v = param_values.get(i).copied().ok_or_else(|| {
                        crate::utils::errors::Error::InvalidInput(format!(
                            "missing value for parameter `{}`",
                            self.params.get(i).cloned().unwrap_or_default()
                        ))
                    })?;
                    c.expr.param_coeffs[i] = 0;
                    c.expr.constant += pc * v;
                }
            }
        }
        for v in 0..self.dim() {
            if v != d {
                cs.eliminate_var(v);
            }
        }
        let mut lower: Option<i64> = None;
        let mut upper: Option<i64> = None;
        for c in &cs.constraints {
            let coeff = c.expr.coeff(d);
            if coeff == 0 {
                continue;
            }
            let rest = c.expr.constant;
            if coeff > 0 || c.is_equality() {
                // coeff*d + rest >= 0  =>  d >= ceil(-rest / coeff)
                let b = Rational64::new(-rest, coeff).ceil().to_integer();
                lower = Some(lower.map_or(b, |l| l.max(b)));
            }
            if coeff < 0 || c.is_equality() {
                // coeff*d + rest >= 0  =>  d <= floor(rest / -coeff)
                let b = Rational64::new(rest, -coeff).floor().to_integer();
                upper = Some(upper.map_or(b, |u| u.min(b)));
            }
        }
        match (lower, upper) {
            (Some(l), Some(u)) => Ok((l, u)),
            _ => Err(AlgebraError::Unbounded(
                self.space
                    .dim_name(d)
                    .unwrap_or("?")
                    .to_string(),
            )
            .into()),
        }
    }

    /// Enumerate every integer point of the set, in lexicographic order.
    ///
    /// Requires every dimension to have constant bounds once parameters
    /// are fixed. Intended for tests and diagnostics on small sets.
    pub fn points(&self, param_values: &[i64]) -> Result<Vec<Vec<i64>>> {
        let mut boxes = Vec::with_capacity(self.dim());
        for d in 0..self.dim() {
            let (l, u) = self.dim_bounds(d, param_values)?;
            if l > u {
                return Ok(Vec::new());
            }
            boxes.push((l, u));
        }
        let mut points = Vec::new();
        let mut current = Vec::with_capacity(self.dim());
        self.enumerate_rec(&boxes, param_values, &mut current, &mut points);
        Ok(points)
    }

    fn enumerate_rec(
        &self,
        boxes: &[(i64, i64)],
        param_values: &[i64],
        current: &mut Vec<i64>,
        points: &mut Vec<Vec<i64>>,
    ) {
        let d = current.len();
        if d == self.dim() {
            if self.cs.is_satisfied(current, param_values) {
                points.push(current.clone());
            }
            return;
        }
        for v in boxes[d].0..=boxes[d].1 {
            current.push(v);
            self.enumerate_rec(boxes, param_values, current, points);
            current.pop();
        }
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        write!(f, "{{ {}", self.space)?;
        if !self.cs.constraints.is_empty() {
            write!(f, " : ")?;
            for (i, c) in self.cs.constraints.iter().enumerate() {
                if i > 0 {
                    write!(f, " and ")?;
                }
                write!(f, "{}", c.to_string_with_names(&self.space.dims, &self.params))?;
            }
        }
        write!(f, " }}")
    }
}

/// A union of sets, one piece per tuple name.
#[derive(Debug, Clone, Default)]
pub struct UnionSet(pub Vec<Set>);

impl UnionSet {
    /// Add a piece.
    pub fn add(&mut self, set: Set) {
        self.0.push(set);
    }

    /// Number of pieces.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the union has no pieces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UnionSet {
    // Pieces joined by `; ` inside one brace pair, the way isl prints
    // unions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, piece) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", strip_braces(&piece.to_string()))?;
        }
        write!(f, " }}")
    }
}

pub(crate) fn strip_braces(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start + 1..end].trim().to_string(),
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Set {
        Set::parse("{ S[i, j] : 0 <= i and i < 4 and 0 <= j and j < 3 }").unwrap()
    }

    #[test]
    fn test_contains() {
        let s = rect();
        assert!(s.contains(&[0, 0], &[]));
        assert!(s.contains(&[3, 2], &[]));
        assert!(!s.contains(&[4, 0], &[]));
    }

    #[test]
    fn test_dim_bounds() {
        let s = rect();
        assert_eq!(s.dim_bounds(0, &[]).unwrap(), (0, 3));
        assert_eq!(s.dim_bounds(1, &[]).unwrap(), (0, 2));
    }

    #[test]
    fn test_points() {
        let s = rect();
        let pts = s.points(&[]).unwrap();
        assert_eq!(pts.len(), 12);
        assert_eq!(pts[0], vec![0, 0]);
        assert_eq!(pts[11], vec![3, 2]);
    }

    #[test]
    fn test_parametric_bounds() {
        let s = Set::parse("[N] -> { S[i] : 0 <= i and i < N }").unwrap();
        assert_eq!(s.dim_bounds(0, &[7]).unwrap(), (0, 6));
    }

    #[test]
    fn test_project_out() {
        let mut s = rect();
        s.project_out(1);
        assert_eq!(s.dim(), 1);
        assert_eq!(s.points(&[]).unwrap().len(), 4);
    }

    #[test]
    fn test_display_round_trip() {
        let s = rect();
        let reparsed = Set::parse(&s.to_string()).unwrap();
        assert_eq!(reparsed.points(&[]).unwrap(), s.points(&[]).unwrap());
        // Serialization is stable on its own output.
        assert_eq!(reparsed.to_string(), Set::parse(&reparsed.to_string()).unwrap().to_string());
    }
}
