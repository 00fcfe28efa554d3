//! Affine relations between named spaces.
//!
//! A map relates an input space to an output space through a conjunction
//! of affine constraints over the concatenated columns
//! `[in dims..., out dims..., params...]`. Schedules and access relations
//! are maps.
//!
//! The text form follows isl: a dimension name repeated on both sides of
//! the arrow denotes equality, so the identity relation on `S[i, j]`
//! prints as `{ S[i, j] -> [i, j] : ... }` with no explicit equalities.

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::set::{strip_braces, Set};
use crate::polyhedral::space::Space;
use crate::utils::errors::{AlgebraError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An affine relation from an input space to an output space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    /// Input (domain) space.
    pub in_space: Space,
    /// Output (range) space.
    pub out_space: Space,
    /// Declared parameter names, in order.
    pub params: Vec<String>,
    /// Constraints over `[in dims..., out dims..., params...]`.
    pub cs: ConstraintSystem,
}

impl Map {
    /// The unconstrained relation between two spaces.
    pub fn universe(in_space: Space, out_space: Space, params: Vec<String>) -> Self {
        let cs = ConstraintSystem::new(in_space.dim() + out_space.dim(), params.len());
        Self {
            in_space,
            out_space,
            params,
            cs,
        }
    }

    /// The identity relation on a set: domain restricted to the set, each
    /// output dimension equal to the matching input dimension, output
    /// dimension names mirroring the input names, anonymous output tuple.
    pub fn identity_on(set: &Set) -> Self {
        let n = set.dim();
        let in_space = set.space.clone();
        let out_space = Space::anonymous(set.space.dims.clone());
        let mut cs = ConstraintSystem::new(2 * n, set.params.len());
        for c in &set.cs.constraints {
            let mut expr = AffineExpr::zero(2 * n, set.params.len());
            expr.constant = c.expr.constant;
            expr.coeffs[..n].copy_from_slice(&c.expr.coeffs);
            expr.param_coeffs.copy_from_slice(&c.expr.param_coeffs);
            cs.add(Constraint {
                expr,
                kind: c.kind,
            });
        }
        for k in 0..n {
            let mut expr = AffineExpr::zero(2 * n, set.params.len());
            expr.coeffs[n + k] = 1;
            expr.coeffs[k] = -1;
            cs.add(Constraint::eq_zero(expr));
        }
        let mut map = Self {
            in_space,
            out_space,
            params: set.params.clone(),
            cs,
        };
        map.coalesce();
        map
    }

    /// Parse from ISL map text.
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse_map(text, &[])
    }

    /// Parse from ISL map text with extra pre-declared parameters.
    pub fn parse_with_params(text: &str, extra_params: &[String]) -> Result<Self> {
        crate::parser::parse_map(text, extra_params)
    }

    /// Number of input dimensions.
    pub fn n_in(&self) -> usize {
        self.in_space.dim()
    }

    /// Number of output dimensions.
    pub fn n_out(&self) -> usize {
        self.out_space.dim()
    }

    /// Input tuple name.
    pub fn in_tuple(&self) -> &str {
        &self.in_space.tuple
    }

    /// Output tuple name.
    pub fn out_tuple(&self) -> &str {
        &self.out_space.tuple
    }

    /// Set the output tuple name.
    pub fn set_out_tuple(&mut self, name: impl Into<String>) {
        self.out_space.tuple = name.into();
    }

    /// Membership test for a pair of points.
    pub fn contains(&self, in_point: &[i64], out_point: &[i64], param_values: &[i64]) -> bool {
        if in_point.len() != self.n_in() || out_point.len() != self.n_out() {
            return false;
        }
        let mut values = Vec::with_capacity(self.cs.n_var);
        values.extend_from_slice(in_point);
        values.extend_from_slice(out_point);
        self.cs.is_satisfied(&values, param_values)
    }

    /// Insert an output dimension at `pos` (unconstrained).
    pub fn insert_out_dim(&mut self, pos: usize, name: impl Into<String>) {
        self.out_space.insert_dim(pos, name);
        self.cs.insert_var(self.n_in() + pos);
    }

    /// Constrain the output dimension at `pos` to a constant.
    pub fn fix_out_dim(&mut self, pos: usize, value: i64) {
        let col = self.n_in() + pos;
        let mut expr = AffineExpr::zero(self.cs.n_var, self.cs.n_param);
        expr.coeffs[col] = 1;
        expr.constant = -value;
        self.cs.add(Constraint::eq_zero(expr));
    }

    /// Add a constraint over the map's columns.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.cs.add(constraint);
    }

    /// Normalize and deduplicate constraints.
    pub fn coalesce(&mut self) {
        self.cs.coalesce();
    }

    /// Apply the relation to a set: the image of `set` under `self`.
    ///
    /// The set's space must match the relation's input space. Input
    /// dimensions are eliminated through equalities where possible and by
    /// Fourier–Motzkin combination otherwise.
    pub fn apply(&self, set: &Set) -> Result<Set> {
        if set.dim() != self.n_in() {
            return Err(Error::DimensionalityMismatch(format!(
                "cannot apply `{} -> {}` to `{}`",
                self.in_space, self.out_space, set.space
            )));
        }
        if set.tuple_name() != self.in_tuple() {
            return Err(Error::DimensionalityMismatch(format!(
                "tuple `{}` does not match the relation's domain tuple `{}`",
                set.tuple_name(),
                self.in_tuple()
            )));
        }
        let params = merge_params(&self.params, &set.params);
        let n_in = self.n_in();
        let n_out = self.n_out();

        let mut cs = ConstraintSystem::new(n_in + n_out, params.len());
        for c in &self.cs.constraints {
            cs.add(remap_params(c, &self.params, &params));
        }
        for c in &set.cs.constraints {
            let remapped = remap_params(c, &set.params, &params);
            let mut expr = AffineExpr::zero(n_in + n_out, params.len());
            expr.constant = remapped.expr.constant;
            expr.coeffs[..n_in].copy_from_slice(&remapped.expr.coeffs);
            expr.param_coeffs.copy_from_slice(&remapped.expr.param_coeffs);
            cs.add(Constraint {
                expr,
                kind: remapped.kind,
            });
        }

        for v in 0..n_in {
            cs.eliminate_var(v);
        }
        for _ in 0..n_in {
            cs.remove_var(0);
        }
        cs.coalesce();
        if cs.is_obviously_empty() {
            return Err(AlgebraError::EmptySet(set.space.to_string()).into());
        }
        Ok(Set {
            space: self.out_space.clone(),
            params,
            cs,
        })
    }

    /// Express each input dimension as an affine function of the output
    /// dimensions, using the relation's equalities.
    ///
    /// The returned expressions share the map's column layout; their input
    /// coefficients are all zero.
    pub fn solve_inputs(&self) -> Result<Vec<AffineExpr>> {
        self.solve_side(0, self.n_in(), self.n_in(), self.n_out(), &self.in_space)
    }

    /// Express each output dimension as an affine function of the input
    /// dimensions, using the relation's equalities.
    pub fn solve_outputs(&self) -> Result<Vec<AffineExpr>> {
        self.solve_side(self.n_in(), self.n_out(), 0, self.n_in(), &self.out_space)
    }

    /// Solve each column in `[base, base+count)` from an equality with a
    /// unit coefficient on it and zero coefficients on the rest of that
    /// side; the result may only reference columns in
    /// `[other_base, other_base+other_count)` and parameters.
    fn solve_side(
        &self,
        base: usize,
        count: usize,
        other_base: usize,
        other_count: usize,
        side_space: &Space,
    ) -> Result<Vec<AffineExpr>> {
        let mut solved = Vec::with_capacity(count);
        'dims: for d in 0..count {
            let col = base + d;
            for c in &self.cs.constraints {
                if !c.is_equality() {
                    continue;
                }
                let coeff = c.expr.coeff(col);
                if coeff.abs() != 1 {
                    continue;
                }
                // Every other column of this side must be absent.
                let clean = (0..count)
                    .all(|k| k == d || c.expr.coeff(base + k) == 0)
                    && (0..self.cs.n_var).all(|k| {
                        c.expr.coeff(k) == 0
                            || (k >= base && k < base + count)
                            || (k >= other_base && k < other_base + other_count)
                    });
                if !clean {
                    continue;
                }
                // coeff*x + rest = 0  =>  x = -rest/coeff
                let mut rest = c.expr.clone();
                rest.coeffs[col] = 0;
                solved.push(rest.scale(-coeff.signum()));
                continue 'dims;
            }
            return Err(AlgebraError::NotInvertible(
                side_space.dim_name(d).unwrap_or("?").to_string(),
            )
            .into());
        }
        Ok(solved)
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        write!(f, "{{ {} -> {}", self.in_space, self.out_space)?;

        // Names shared between the two sides carry an implicit equality;
        // skip printing those equalities to keep the repeated-name form.
        let n_in = self.n_in();
        let printed: Vec<&Constraint> = self
            .cs
            .constraints
            .iter()
            .filter(|c| !self.is_implied_identity(c, n_in))
            .collect();
        if !printed.is_empty() {
            // Constraint rendering resolves duplicated names to the domain
            // side, matching the parser.
            let mut names = self.in_space.dims.clone();
            names.extend(self.out_space.dims.iter().cloned());
            write!(f, " : ")?;
            for (i, c) in printed.iter().enumerate() {
                if i > 0 {
                    write!(f, " and ")?;
                }
                write!(f, "{}", c.to_string_with_names(&names, &self.params))?;
            }
        }
        write!(f, " }}")
    }
}

impl Map {
    fn is_implied_identity(&self, c: &Constraint, n_in: usize) -> bool {
        if !c.is_equality() || c.expr.constant != 0 {
            return false;
        }
        if c.expr.param_coeffs.iter().any(|&p| p != 0) {
            return false;
        }
        let nonzero: Vec<usize> = (0..self.cs.n_var)
            .filter(|&k| c.expr.coeff(k) != 0)
            .collect();
        if nonzero.len() != 2 {
            return false;
        }
        let (a, b) = (nonzero[0], nonzero[1]);
        if !(a < n_in && b >= n_in) {
            return false;
        }
        if c.expr.coeff(a) + c.expr.coeff(b) != 0 || c.expr.coeff(a).abs() != 1 {
            return false;
        }
        self.in_space.dim_name(a) == self.out_space.dim_name(b - n_in)
    }
}

/// A union of maps, one piece per domain tuple.
#[derive(Debug, Clone, Default)]
pub struct UnionMap(pub Vec<Map>);

impl UnionMap {
    /// Add a piece.
    pub fn add(&mut self, map: Map) {
        self.0.push(map);
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

impl fmt::Display for UnionMap {
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

fn merge_params(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged = a.to_vec();
    for p in b {
        if !merged.contains(p) {
            merged.push(p.clone());
        }
    }
    merged
}

fn remap_params(c: &Constraint, from: &[String], to: &[String]) -> Constraint {
    let mut expr = AffineExpr {
        constant: c.expr.constant,
        coeffs: c.expr.coeffs.clone(),
        param_coeffs: vec![0; to.len()],
    };
    for (i, coeff) in c.expr.param_coeffs.iter().enumerate() {
        if *coeff != 0 {
            let j = to
                .iter()
                .position(|p| p == &from[i])
                .expect("merged parameter list must contain every source parameter");
            expr.param_coeffs[j] = *coeff;
        }
    }
    Constraint {
        expr,
        kind: c.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Set {
        Set::parse("{ S[i, j] : 0 <= i and i < 4 and 0 <= j and j < 3 }").unwrap()
    }

    #[test]
    fn test_identity_prints_with_repeated_names() {
        let map = Map::identity_on(&domain());
        let text = map.to_string();
        assert!(text.starts_with("{ S[i, j] -> [i, j]"));
        assert!(!text.contains("= 0") || !text.contains("i - i"));
    }

    #[test]
    fn test_identity_relation() {
        let map = Map::identity_on(&domain());
        assert!(map.contains(&[2, 1], &[2, 1], &[]));
        assert!(!map.contains(&[2, 1], &[1, 2], &[]));
        assert!(!map.contains(&[4, 0], &[4, 0], &[]));
    }

    #[test]
    fn test_apply_identity_is_neutral() {
        let d = domain();
        let map = Map::identity_on(&d);
        let image = map.apply(&d).unwrap();
        assert_eq!(image.tuple_name(), "");
        assert_eq!(image.points(&[]).unwrap(), d.points(&[]).unwrap());
    }

    #[test]
    fn test_apply_tuple_mismatch() {
        let d = domain();
        let map = Map::identity_on(&d);
        let other = Set::parse("{ T[i, j] : 0 <= i and i < 4 and 0 <= j and j < 3 }").unwrap();
        assert!(map.apply(&other).is_err());
    }

    #[test]
    fn test_round_trip_through_text() {
        let map = Map::identity_on(&domain());
        let reparsed = Map::parse(&map.to_string()).unwrap();
        assert!(reparsed.contains(&[3, 2], &[3, 2], &[]));
        assert!(!reparsed.contains(&[3, 2], &[2, 3], &[]));
    }

    #[test]
    fn test_solve_inputs_identity() {
        let map = Map::identity_on(&domain());
        let solved = map.solve_inputs().unwrap();
        assert_eq!(solved.len(), 2);
        // i == out column 0, j == out column 1
        assert_eq!(solved[0].coeff(2), 1);
        assert_eq!(solved[1].coeff(3), 1);
    }

    #[test]
    fn test_fix_out_dim() {
        let mut map = Map::identity_on(&domain());
        map.insert_out_dim(0, "o");
        map.fix_out_dim(0, 1);
        assert!(map.contains(&[2, 1], &[1, 2, 1], &[]));
        assert!(!map.contains(&[2, 1], &[0, 2, 1], &[]));
    }
}
