//! Loop-AST construction from scheduled iteration domains.
//!
//! Input: one record per computation, carrying its time-processor set
//! (all records aligned to the same dimensionality) and the pullback
//! expressions giving the original iterators as affine functions of the
//! time dimensions. Output: a tree of `For`/`If`/`Block`/`UserLeaf` nodes.
//!
//! The builder walks the time dimensions outermost first. A dimension
//! fixed to a constant by an equality produces no loop: statements are
//! grouped by the constant and emitted in ascending order, which is what
//! realizes `after` ordering dimensions and alignment padding. A free
//! dimension produces a `For` whose bounds are extracted from the
//! constraints after Fourier-Motzkin elimination of the deeper
//! dimensions; redundant bounds are pruned by interval reasoning so
//! rectangular nests get plain constant loops. The construction is
//! deterministic for a fixed input: statements are processed in name
//! order and groups in constant order.

use crate::polyhedral::constraint::ConstraintSystem;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::set::Set;
use crate::utils::errors::{AlgebraError, Error, Result};
use num_rational::Rational64;

/// Binary operators in AST expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Greater than or equal
    Ge,
    /// Equal
    Eq,
    /// Logical and
    And,
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Variable reference (loop iterator or parameter)
    Var(String),
    /// Binary operation
    Binary {
        /// Operator
        op: AstBinOp,
        /// Left operand
        left: Box<AstExpr>,
        /// Right operand
        right: Box<AstExpr>,
    },
    /// Floor division
    FloorDiv(Box<AstExpr>, Box<AstExpr>),
    /// Ceiling division
    CeilDiv(Box<AstExpr>, Box<AstExpr>),
    /// Minimum of two expressions
    Min(Box<AstExpr>, Box<AstExpr>),
    /// Maximum of two expressions
    Max(Box<AstExpr>, Box<AstExpr>),
}

impl AstExpr {
    /// Integer constant.
    pub fn int(v: i64) -> Self {
        Self::Int(v)
    }

    /// Variable reference.
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    fn binary(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Addition.
    pub fn add(self, other: Self) -> Self {
        Self::binary(AstBinOp::Add, self, other)
    }

    /// Subtraction.
    pub fn sub(self, other: Self) -> Self {
        Self::binary(AstBinOp::Sub, self, other)
    }

    /// Multiplication.
    pub fn mul(self, other: Self) -> Self {
        Self::binary(AstBinOp::Mul, self, other)
    }

    /// Minimum.
    pub fn min(self, other: Self) -> Self {
        Self::Min(Box::new(self), Box::new(other))
    }

    /// Maximum.
    pub fn max(self, other: Self) -> Self {
        Self::Max(Box::new(self), Box::new(other))
    }

    /// Try to evaluate as a constant.
    pub fn eval_constant(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Var(_) => None,
            Self::Binary { op, left, right } => {
                let l = left.eval_constant()?;
                let r = right.eval_constant()?;
                Some(match op {
                    AstBinOp::Add => l + r,
                    AstBinOp::Sub => l - r,
                    AstBinOp::Mul => l * r,
                    AstBinOp::Ge => (l >= r) as i64,
                    AstBinOp::Eq => (l == r) as i64,
                    AstBinOp::And => ((l != 0) && (r != 0)) as i64,
                })
            }
            Self::FloorDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                (b != 0).then(|| Rational64::new(a, b).floor().to_integer())
            }
            Self::CeilDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                (b != 0).then(|| Rational64::new(a, b).ceil().to_integer())
            }
            Self::Min(a, b) => Some(a.eval_constant()?.min(b.eval_constant()?)),
            Self::Max(a, b) => Some(a.eval_constant()?.max(b.eval_constant()?)),
        }
    }

    /// Constant-fold and apply identity simplifications.
    pub fn simplify(self) -> Self {
        if let Some(v) = self.eval_constant() {
            return Self::Int(v);
        }
        match self {
            Self::Binary { op, left, right } => {
                let l = left.simplify();
                let r = right.simplify();
                match (&op, l.eval_constant(), r.eval_constant()) {
                    (AstBinOp::Add, Some(0), _) => return r,
                    (AstBinOp::Add, _, Some(0)) => return l,
                    (AstBinOp::Sub, _, Some(0)) => return l,
                    (AstBinOp::Mul, Some(1), _) => return r,
                    (AstBinOp::Mul, _, Some(1)) => return l,
                    (AstBinOp::Mul, Some(0), _) | (AstBinOp::Mul, _, Some(0)) => {
                        return Self::Int(0)
                    }
                    _ => {}
                }
                // Re-associate (x + a) + c and (a + x) + c into x + (a+c).
                if op == AstBinOp::Add {
                    if let Some(c) = r.eval_constant() {
                        if let Self::Binary {
                            op: AstBinOp::Add,
                            left: l2,
                            right: r2,
                        } = &l
                        {
                            if let Some(a) = r2.eval_constant() {
                                return Self::binary(
                                    AstBinOp::Add,
                                    (**l2).clone(),
                                    Self::Int(a + c),
                                )
                                .simplify();
                            }
                            if let Some(a) = l2.eval_constant() {
                                return Self::binary(
                                    AstBinOp::Add,
                                    Self::Int(a + c),
                                    (**r2).clone(),
                                )
                                .simplify();
                            }
                        }
                    }
                }
                Self::binary(op, l, r)
            }
            Self::Min(a, b) => Self::Min(Box::new(a.simplify()), Box::new(b.simplify())),
            Self::Max(a, b) => Self::Max(Box::new(a.simplify()), Box::new(b.simplify())),
            Self::FloorDiv(a, b) => {
                Self::FloorDiv(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            Self::CeilDiv(a, b) => Self::CeilDiv(Box::new(a.simplify()), Box::new(b.simplify())),
            other => other,
        }
    }
}

/// A node of the generated loop AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A for loop over `lower <= iterator < upper`.
    For {
        /// Iterator name (`c0`, `c1`, ... by time dimension).
        iterator: String,
        /// Inclusive lower bound.
        lower: AstExpr,
        /// Exclusive upper bound.
        upper: AstExpr,
        /// Loop body.
        body: Box<AstNode>,
    },
    /// A guard around statements whose constraints are not absorbed into
    /// loop bounds.
    If {
        /// Condition expression.
        cond: AstExpr,
        /// Then branch.
        then_body: Box<AstNode>,
        /// Optional else branch.
        else_body: Option<Box<AstNode>>,
    },
    /// Sequential composition.
    Block(Vec<AstNode>),
    /// A computation instance; `args` are the values of the original
    /// iterators as functions of the enclosing loop iterators.
    UserLeaf {
        /// Computation name.
        name: String,
        /// Original iterator values.
        args: Vec<AstExpr>,
    },
}

impl AstNode {
    /// Wrap a list of nodes into a single node.
    fn seq(mut nodes: Vec<AstNode>) -> AstNode {
        if nodes.len() == 1 {
            nodes.pop().unwrap()
        } else {
            AstNode::Block(nodes)
        }
    }
}

/// One scheduled computation, ready for AST construction.
#[derive(Debug, Clone)]
pub struct AstStatement {
    /// Computation name, used for `UserLeaf`s and deterministic ordering.
    pub name: String,
    /// Time-processor set (aligned dimensionality across statements).
    pub time: Set,
    /// Original iterators as affine functions of the time dimensions;
    /// variable columns match `time`, parameters match `time.params`.
    pub pullback: Vec<AffineExpr>,
}

struct StmtState {
    name: String,
    cs: ConstraintSystem,
    params: Vec<String>,
    pullback: Vec<AffineExpr>,
    bindings: Vec<Option<AstExpr>>,
    intervals: Vec<Option<(i64, i64)>>,
    guards: Vec<(AffineExpr, bool)>, // (expr, is_equality) residuals
}

enum DimClass {
    FixedConst(i64),
    FixedExpr(AffineExpr),
    Free,
}

/// Build the loop AST for a group of scheduled statements.
///
/// Deterministic for a fixed input; all statements must share one time
/// dimensionality (call `align_schedules` first).
pub fn build(statements: &[AstStatement]) -> Result<AstNode> {
    if statements.is_empty() {
        return Ok(AstNode::Block(Vec::new()));
    }
    let n = statements[0].time.dim();
    for s in statements {
        if s.time.dim() != n {
            return Err(Error::DimensionalityMismatch(format!(
                "statement `{}` has {} time dimensions, expected {}",
                s.name,
                s.time.dim(),
                n
            )));
        }
        if s.pullback.iter().any(|e| e.n_var() != n) {
            return Err(Error::DimensionalityMismatch(format!(
                "pullback of `{}` does not match its time space",
                s.name
            )));
        }
    }

    let mut states: Vec<StmtState> = statements
        .iter()
        .map(|s| StmtState {
            name: s.name.clone(),
            cs: s.time.cs.clone(),
            params: s.time.params.clone(),
            pullback: s.pullback.clone(),
            bindings: vec![None; n],
            intervals: vec![None; n],
            guards: Vec::new(),
        })
        .collect();
    states.sort_by(|a, b| a.name.cmp(&b.name));

    let nodes = build_rec(states, 0, n)?;
    Ok(AstNode::seq(nodes))
}

fn build_rec(states: Vec<StmtState>, d: usize, n: usize) -> Result<Vec<AstNode>> {
    if d == n {
        let mut nodes = Vec::new();
        for state in states {
            if let Some(leaf) = leaf_node(state) {
                nodes.push(leaf);
            }
        }
        return Ok(nodes);
    }

    let mut fixed_const: Vec<(i64, StmtState)> = Vec::new();
    let mut fixed_expr: Vec<(AffineExpr, StmtState)> = Vec::new();
    let mut free: Vec<StmtState> = Vec::new();
    for state in states {
        match classify_dim(&state.cs, d, n) {
            DimClass::FixedConst(v) => fixed_const.push((v, state)),
            DimClass::FixedExpr(e) => fixed_expr.push((e, state)),
            DimClass::Free => free.push(state),
        }
    }

    let mut nodes = Vec::new();

    // Constant-valued dimensions carry ordering: emit groups in ascending
    // value order, no loop.
    fixed_const.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
    let mut pending = fixed_const.into_iter().peekable();
    while let Some((value, first)) = pending.next() {
        let mut group = vec![first];
        while pending.peek().map(|(v, _)| *v) == Some(value) {
            group.push(pending.next().unwrap().1);
        }
        let mut fixed_group = Vec::with_capacity(group.len());
        for mut state in group {
            let constant = AffineExpr::constant(value, state.cs.n_var, state.cs.n_param);
            fix_dim(&mut state, d, AstExpr::Int(value), &constant);
            state.intervals[d] = Some((value, value));
            if !state.cs.is_obviously_empty() {
                fixed_group.push(state);
            }
        }
        nodes.extend(build_rec(fixed_group, d + 1, n)?);
    }

    for (expr, mut state) in fixed_expr {
        let rendered = render_affine(&expr, &state.bindings, &state.params);
        fix_dim(&mut state, d, rendered, &expr);
        if !state.cs.is_obviously_empty() {
            nodes.extend(build_rec(vec![state], d + 1, n)?);
        }
    }

    // Free dimensions become loops; statements sharing bound expressions
    // share one loop.
    let mut loop_groups: Vec<(AstExpr, AstExpr, Vec<StmtState>)> = Vec::new();
    for mut state in free {
        let (lower, upper, interval) = dim_bounds(&mut state, d, n)?;
        state.bindings[d] = Some(AstExpr::var(&iter_name(d)));
        state.intervals[d] = interval;
        let found = loop_groups
            .iter()
            .position(|(l, u, _)| *l == lower && *u == upper);
        match found {
            Some(idx) => loop_groups[idx].2.push(state),
            None => loop_groups.push((lower, upper, vec![state])),
        }
    }
    for (lower, upper, group) in loop_groups {
        let children = build_rec(group, d + 1, n)?;
        if children.is_empty() {
            continue;
        }
        nodes.push(AstNode::For {
            iterator: iter_name(d),
            lower,
            upper,
            body: Box::new(AstNode::seq(children)),
        });
    }

    Ok(nodes)
}

fn iter_name(d: usize) -> String {
    format!("c{}", d)
}

/// A dimension is fixed when an equality with a unit coefficient on it
/// mentions no deeper dimension.
fn classify_dim(cs: &ConstraintSystem, d: usize, n: usize) -> DimClass {
    for c in &cs.constraints {
        if !c.is_equality() || c.expr.coeff(d).abs() != 1 {
            continue;
        }
        if (d + 1..n).any(|v| c.expr.coeff(v) != 0) {
            continue;
        }
        // coeff*d + rest = 0  =>  d = -rest * sign(coeff)
        let sign = c.expr.coeff(d).signum();
        let mut rest = c.expr.clone();
        rest.coeffs[d] = 0;
        let value = rest.scale(-sign);
        return match value.as_constant() {
            Some(v) => DimClass::FixedConst(v),
            None => DimClass::FixedExpr(value),
        };
    }
    DimClass::Free
}

/// Bind dimension `d` to a value: record the binding, substitute through
/// the constraints, and move residual constraints that no longer mention
/// any deeper dimension into the guard list.
fn fix_dim(state: &mut StmtState, d: usize, rendered: AstExpr, value: &AffineExpr) {
    state.bindings[d] = Some(rendered);
    state.cs.substitute_var(d, value);
    state.cs.coalesce();

    let n = state.cs.n_var;
    let mut kept = Vec::new();
    for c in state.cs.constraints.drain(..) {
        let highest = (0..n).rev().find(|&v| c.expr.coeff(v) != 0);
        match highest {
            Some(v) if v > d => kept.push(c),
            Some(_) => state.guards.push((c.expr.clone(), c.is_equality())),
            None => {
                if c.is_trivially_false() {
                    kept.push(c); // keeps the state obviously empty
                }
            }
        }
    }
    state.cs.constraints = kept;
}

/// Extract loop bounds for dimension `d`, consuming the constraints whose
/// innermost dimension is `d`.
fn dim_bounds(
    state: &mut StmtState,
    d: usize,
    n: usize,
) -> Result<(AstExpr, AstExpr, Option<(i64, i64)>)> {
    // Consequences of deeper-dimension constraints bound this dimension
    // too; eliminate the deeper dimensions on a copy.
    let mut cs = state.cs.clone();
    for v in (d + 1..n).rev() {
        cs.eliminate_var(v);
    }

    // (numerator, divisor): lower is ceil(n/div), upper is floor(n/div).
    let mut lowers: Vec<(AffineExpr, i64)> = Vec::new();
    let mut uppers: Vec<(AffineExpr, i64)> = Vec::new();
    for c in &cs.constraints {
        let coeff = c.expr.coeff(d);
        if coeff == 0 {
            continue;
        }
        let mut rest = c.expr.clone();
        rest.coeffs[d] = 0;
        if coeff > 0 {
            // coeff*d + rest >= 0  =>  d >= -rest/coeff
            lowers.push((rest.clone().scale(-1), coeff));
            if c.is_equality() {
                uppers.push((rest.scale(-1), coeff));
            }
        } else {
            // coeff*d + rest >= 0  =>  d <= rest/|coeff|
            uppers.push((rest.clone(), -coeff));
            if c.is_equality() {
                lowers.push((rest, -coeff));
            }
        }
    }
    if lowers.is_empty() || uppers.is_empty() {
        return Err(Error::Algebra(AlgebraError::Unbounded(iter_name(d))));
    }

    prune_redundant(&mut lowers, &state.intervals, true);
    prune_redundant(&mut uppers, &state.intervals, false);

    let lower = fold_bounds(&lowers, &state.bindings, &state.params, true);
    let upper_incl = fold_bounds(&uppers, &state.bindings, &state.params, false);
    let upper = upper_incl.clone().add(AstExpr::Int(1)).simplify();

    let interval = match (lower.eval_constant(), upper_incl.eval_constant()) {
        (Some(l), Some(u)) => Some((l, u)),
        _ => None,
    };

    // Constraints whose innermost dimension is `d` are now enforced by the
    // loop bounds.
    state
        .cs
        .constraints
        .retain(|c| (d + 1..n).any(|v| c.expr.coeff(v) != 0) || c.expr.coeff(d) == 0);

    Ok((lower, upper, interval))
}

/// Drop bound candidates implied by another candidate over the known
/// constant intervals of the outer dimensions. Only unit-divisor,
/// parameter-free candidates participate.
fn prune_redundant(
    candidates: &mut Vec<(AffineExpr, i64)>,
    intervals: &[Option<(i64, i64)>],
    is_lower: bool,
) {
    let mut keep = vec![true; candidates.len()];
    for i in 0..candidates.len() {
        if !keep[i] {
            continue;
        }
        for j in 0..candidates.len() {
            if i == j || !keep[j] || !keep[i] {
                continue;
            }
            let (ref ei, di) = candidates[i];
            let (ref ej, dj) = candidates[j];
            if di != 1 || dj != 1 {
                continue;
            }
            // Lower bounds keep the max: i is redundant when ei <= ej
            // everywhere. Upper bounds keep the min: i is redundant when
            // ei >= ej everywhere.
            let diff = if is_lower {
                ej.clone() - ei.clone()
            } else {
                ei.clone() - ej.clone()
            };
            if let Some(min) = interval_min(&diff, intervals) {
                if min >= 0 && (candidates[i].0 != candidates[j].0 || i > j) {
                    keep[i] = false;
                }
            }
        }
    }
    let mut idx = 0;
    candidates.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

/// Minimum of an affine expression over the boxes of its variables; `None`
/// when a mentioned variable has no known interval or parameters appear.
fn interval_min(expr: &AffineExpr, intervals: &[Option<(i64, i64)>]) -> Option<i64> {
    if expr.param_coeffs.iter().any(|&c| c != 0) {
        return None;
    }
    let mut min = expr.constant;
    for (v, &coeff) in expr.coeffs.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let (lo, hi) = intervals.get(v).copied().flatten()?;
        min += if coeff > 0 { coeff * lo } else { coeff * hi };
    }
    Some(min)
}

fn fold_bounds(
    candidates: &[(AffineExpr, i64)],
    bindings: &[Option<AstExpr>],
    params: &[String],
    is_lower: bool,
) -> AstExpr {
    let mut acc: Option<AstExpr> = None;
    for (rest, div) in candidates {
        let base = render_affine(rest, bindings, params);
        let bound = if *div == 1 {
            base
        } else if is_lower {
            AstExpr::CeilDiv(Box::new(base), Box::new(AstExpr::Int(*div)))
        } else {
            AstExpr::FloorDiv(Box::new(base), Box::new(AstExpr::Int(*div)))
        }
        .simplify();
        acc = Some(match acc {
            None => bound,
            Some(prev) if is_lower => prev.max(bound).simplify(),
            Some(prev) => prev.min(bound).simplify(),
        });
    }
    acc.expect("at least one bound candidate")
}

/// Render an affine expression through the dimension bindings.
fn render_affine(
    expr: &AffineExpr,
    bindings: &[Option<AstExpr>],
    params: &[String],
) -> AstExpr {
    let mut acc = AstExpr::Int(expr.constant);
    for (v, &coeff) in expr.coeffs.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let var = bindings
            .get(v)
            .cloned()
            .flatten()
            .unwrap_or_else(|| AstExpr::var(&iter_name(v)));
        let term = if coeff == 1 {
            var
        } else {
            AstExpr::Int(coeff).mul(var)
        };
        acc = acc.add(term);
    }
    for (p, &coeff) in expr.param_coeffs.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let var = AstExpr::var(&params[p]);
        let term = if coeff == 1 {
            var
        } else {
            AstExpr::Int(coeff).mul(var)
        };
        acc = acc.add(term);
    }
    acc.simplify()
}

fn leaf_node(state: StmtState) -> Option<AstNode> {
    let args: Vec<AstExpr> = state
        .pullback
        .iter()
        .map(|e| render_affine(e, &state.bindings, &state.params))
        .collect();
    let leaf = AstNode::UserLeaf {
        name: state.name,
        args,
    };

    let mut cond: Option<AstExpr> = None;
    for (expr, is_eq) in &state.guards {
        let rendered = render_affine(expr, &state.bindings, &state.params);
        if let Some(v) = rendered.eval_constant() {
            let holds = if *is_eq { v == 0 } else { v >= 0 };
            if !holds {
                return None;
            }
            continue;
        }
        let op = if *is_eq { AstBinOp::Eq } else { AstBinOp::Ge };
        let test = AstExpr::binary(op, rendered, AstExpr::Int(0));
        cond = Some(match cond {
            None => test,
            Some(prev) => AstExpr::binary(AstBinOp::And, prev, test),
        });
    }
    Some(match cond {
        None => leaf,
        Some(cond) => AstNode::If {
            cond,
            then_body: Box::new(leaf),
            else_body: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::constraint::Constraint;
    use crate::polyhedral::map::Map;

    fn statement(name: &str, set_text: &str) -> AstStatement {
        let domain = Set::parse(set_text).unwrap();
        let schedule = Map::identity_on(&domain);
        let time = schedule.apply(&domain).unwrap();
        let n_in = schedule.n_in();
        let pullback = schedule
            .solve_inputs()
            .unwrap()
            .into_iter()
            .map(|e| AffineExpr {
                constant: e.constant,
                coeffs: e.coeffs[n_in..].to_vec(),
                param_coeffs: e.param_coeffs,
            })
            .collect();
        AstStatement {
            name: name.to_string(),
            time,
            pullback,
        }
    }

    #[test]
    fn test_rectangular_nest() {
        let ast = build(&[statement("S", "{ S[i, j] : 0 <= i < 4 and 0 <= j < 3 }")]).unwrap();
        match ast {
            AstNode::For {
                iterator,
                lower,
                upper,
                body,
            } => {
                assert_eq!(iterator, "c0");
                assert_eq!(lower, AstExpr::Int(0));
                assert_eq!(upper, AstExpr::Int(4));
                match *body {
                    AstNode::For { iterator, upper, body, .. } => {
                        assert_eq!(iterator, "c1");
                        assert_eq!(upper, AstExpr::Int(3));
                        match *body {
                            AstNode::UserLeaf { name, args } => {
                                assert_eq!(name, "S");
                                assert_eq!(args, vec![AstExpr::var("c0"), AstExpr::var("c1")]);
                            }
                            other => panic!("expected leaf, got {:?}", other),
                        }
                    }
                    other => panic!("expected inner loop, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_dim_orders_statements() {
        // Two statements distinguished by a leading constant dimension.
        let mut a = statement("A", "{ A[i] : 0 <= i < 8 }");
        let mut b = statement("B", "{ B[i] : 0 <= i < 8 }");
        for (s, v) in [(&mut a, 0i64), (&mut b, 1i64)] {
            s.time.insert_dim(0, "o");
            let mut expr = AffineExpr::var(0, 2, 0);
            expr.constant = -v;
            s.time.cs.add(Constraint::eq_zero(expr));
            for p in &mut s.pullback {
                p.insert_var(0);
            }
        }
        // Reverse insertion order must not matter.
        let ast = build(&[b, a]).unwrap();
        match ast {
            AstNode::Block(nodes) => {
                assert_eq!(nodes.len(), 2);
                for (node, expected) in nodes.iter().zip(["A", "B"]) {
                    match node {
                        AstNode::For { body, .. } => match body.as_ref() {
                            AstNode::UserLeaf { name, .. } => assert_eq!(name, expected),
                            other => panic!("expected leaf, got {:?}", other),
                        },
                        other => panic!("expected loop, got {:?}", other),
                    }
                }
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_loop_for_equal_bounds() {
        let a = statement("A", "{ A[i] : 0 <= i < 8 }");
        let b = statement("B", "{ B[i] : 0 <= i < 8 }");
        let ast = build(&[a, b]).unwrap();
        match ast {
            AstNode::For { body, .. } => match *body {
                AstNode::Block(nodes) => assert_eq!(nodes.len(), 2),
                other => panic!("expected block body, got {:?}", other),
            },
            other => panic!("expected shared loop, got {:?}", other),
        }
    }
}
