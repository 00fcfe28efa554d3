//! Parsing of the ISL set/map text form.
//!
//! Two layers:
//!
//! 1. A *structural* parse ([`SetTokens`], [`MapTokens`]) that recognizes
//!    the bracket/arrow/colon structure and keeps constraint substrings
//!    verbatim. Schedule transformations rewrite dimension lists at this
//!    level (see [`MapTokens::replace`]) and reassemble the text.
//! 2. A constraint compiler that turns constraint substrings into
//!    [`Constraint`]s over resolved dimension/parameter columns, with
//!    chained comparisons (`0 <= i < N`) expanded into conjunctions.
//!
//! A dimension name repeated on both sides of a map's arrow denotes
//! equality of the two dimensions, as in isl. Names used in constraints
//! must be declared: as a tuple dimension, in the leading `[...]`
//! parameter list, or in the caller-supplied extra parameter set (the
//! function's invariants).

mod lexer;

pub use lexer::{tokenize, ParseError, Token, TokenKind};

use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use crate::polyhedral::space::{fresh_name, Space};
use crate::utils::errors::{AlgebraError, Error, Result};
use std::fmt;

/// Structural form of a set string: tuple name, dimension entries, and
/// verbatim constraint substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTokens {
    /// Declared parameter names.
    pub params: Vec<String>,
    /// Tuple name (possibly empty).
    pub tuple: String,
    /// Dimension entries, verbatim.
    pub dims: Vec<String>,
    /// Constraint substrings, verbatim.
    pub constraints: Vec<String>,
}

impl SetTokens {
    /// Parse the structural form of a set string.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        let s = Structure::parse(text)?;
        if s.range.is_some() {
            return Err(ParseError::new("expected a set, found a map", 0));
        }
        Ok(Self {
            params: s.params,
            tuple: s.domain_tuple,
            dims: s.domain_dims,
            constraints: s.constraints,
        })
    }

    /// Add a constraint substring.
    pub fn add_constraint(&mut self, constraint: impl Into<String>) {
        self.constraints.push(constraint.into());
    }
}

impl fmt::Display for SetTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        write!(f, "{{ {}[{}]", self.tuple, self.dims.join(", "))?;
        if !self.constraints.is_empty() {
            write!(f, " : {}", self.constraints.join(" and "))?;
        }
        write!(f, " }}")
    }
}

/// Structural form of a map string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTokens {
    /// Declared parameter names.
    pub params: Vec<String>,
    /// Domain tuple name.
    pub domain_tuple: String,
    /// Domain dimension entries.
    pub domain_dims: Vec<String>,
    /// Range tuple name (possibly empty).
    pub range_tuple: String,
    /// Range dimension entries.
    pub range_dims: Vec<String>,
    /// Constraint substrings, verbatim.
    pub constraints: Vec<String>,
}

impl MapTokens {
    /// Parse the structural form of a map string.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        let s = Structure::parse(text)?;
        let (range_tuple, range_dims) = s
            .range
            .ok_or_else(|| ParseError::new("expected a map, found a set", 0))?;
        Ok(Self {
            params: s.params,
            domain_tuple: s.domain_tuple,
            domain_dims: s.domain_dims,
            range_tuple,
            range_dims,
            constraints: s.constraints,
        })
    }

    /// Replace the range dimension called `name` by the pair
    /// `(out1, out2)`, growing the range by one dimension. Used by `split`
    /// to divide one time dimension in two.
    pub fn replace(&mut self, name: &str, out1: &str, out2: &str) {
        let mut new_dims = Vec::with_capacity(self.range_dims.len() + 1);
        for dim in &self.range_dims {
            if dim == name {
                new_dims.push(out1.to_string());
                new_dims.push(out2.to_string());
            } else {
                new_dims.push(dim.clone());
            }
        }
        self.range_dims = new_dims;
    }

    /// Add a constraint substring.
    pub fn add_constraint(&mut self, constraint: impl Into<String>) {
        self.constraints.push(constraint.into());
    }

    /// Every name mentioned in the dimension lists and parameters.
    pub fn all_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .chain(self.domain_dims.iter())
            .chain(self.range_dims.iter())
            .map(|s| s.as_str())
            .collect()
    }
}

impl fmt::Display for MapTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        write!(
            f,
            "{{ {}[{}] -> {}[{}]",
            self.domain_tuple,
            self.domain_dims.join(", "),
            self.range_tuple,
            self.range_dims.join(", ")
        )?;
        if !self.constraints.is_empty() {
            write!(f, " : {}", self.constraints.join(" and "))?;
        }
        write!(f, " }}")
    }
}

// ---------------------------------------------------------------------------
// Structural parsing
// ---------------------------------------------------------------------------

struct Structure {
    params: Vec<String>,
    domain_tuple: String,
    domain_dims: Vec<String>,
    range: Option<(String, Vec<String>)>,
    constraints: Vec<String>,
}

struct Cursor<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> std::result::Result<Self, ParseError> {
        Ok(Self {
            src,
            toks: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.toks.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&Token> {
        let i = self.pos;
        if i < self.toks.len() {
            self.pos += 1;
            Some(&self.toks[i])
        } else {
            None
        }
    }

    fn offset(&self) -> usize {
        self.toks
            .get(self.pos)
            .map(|t| t.start)
            .unwrap_or(self.src.len())
    }

    fn expect(&mut self, kind: TokenKind) -> std::result::Result<(), ParseError> {
        let offset = self.offset();
        match self.next() {
            Some(t) if t.kind == kind => Ok(()),
            _ => Err(ParseError::new(format!("expected {:?}", kind), offset)),
        }
    }

    fn take_ident(&mut self) -> Option<String> {
        if let Some(TokenKind::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Some(name)
        } else {
            None
        }
    }

    /// Read dimension entries between `[` and `]`, splitting at top-level
    /// commas; each entry is returned as a verbatim substring.
    fn dim_entries(&mut self) -> std::result::Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut start: Option<usize> = None;
        let mut end = self.offset();
        loop {
            let offset = self.offset();
            let tok = self
                .toks
                .get(self.pos)
                .ok_or_else(|| ParseError::new("unterminated `[`", offset))?
                .clone();
            match tok.kind {
                TokenKind::RBracket if depth == 0 => {
                    self.pos += 1;
                    if let Some(s) = start {
                        entries.push(self.src[s..end].trim().to_string());
                    }
                    return Ok(entries);
                }
                TokenKind::Comma if depth == 0 => {
                    self.pos += 1;
                    let s = start.take().ok_or_else(|| {
                        ParseError::new("empty dimension entry", offset)
                    })?;
                    entries.push(self.src[s..end].trim().to_string());
                }
                ref k => {
                    if matches!(k, TokenKind::LBracket | TokenKind::LParen) {
                        depth += 1;
                    }
                    if matches!(k, TokenKind::RBracket | TokenKind::RParen) {
                        depth = depth.saturating_sub(1);
                    }
                    if start.is_none() {
                        start = Some(tok.start);
                    }
                    end = tok.end;
                    self.pos += 1;
                }
            }
        }
    }

    /// Read constraint substrings up to the closing `}`, splitting at
    /// top-level `and`.
    fn constraint_entries(&mut self) -> std::result::Result<Vec<String>, ParseError> {
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut start: Option<usize> = None;
        let mut end = self.offset();
        loop {
            let offset = self.offset();
            let tok = self
                .toks
                .get(self.pos)
                .ok_or_else(|| ParseError::new("unterminated `{`", offset))?
                .clone();
            match &tok.kind {
                TokenKind::RBrace if depth == 0 => {
                    let s = start
                        .take()
                        .ok_or_else(|| ParseError::new("empty constraint", offset))?;
                    entries.push(self.src[s..end].trim().to_string());
                    return Ok(entries);
                }
                TokenKind::Ident(name) if name == "and" && depth == 0 => {
                    self.pos += 1;
                    let s = start
                        .take()
                        .ok_or_else(|| ParseError::new("empty constraint", offset))?;
                    entries.push(self.src[s..end].trim().to_string());
                }
                k => {
                    if matches!(k, TokenKind::LBracket | TokenKind::LParen) {
                        depth += 1;
                    }
                    if matches!(k, TokenKind::RBracket | TokenKind::RParen) {
                        depth = depth.saturating_sub(1);
                    }
                    if start.is_none() {
                        start = Some(tok.start);
                    }
                    end = tok.end;
                    self.pos += 1;
                }
            }
        }
    }
}

impl Structure {
    fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        let mut cur = Cursor::new(text)?;

        let mut params = Vec::new();
        if cur.peek() == Some(&TokenKind::LBracket) {
            cur.pos += 1;
            loop {
                let offset = cur.offset();
                match cur.take_ident() {
                    Some(name) => params.push(name),
                    None => return Err(ParseError::new("expected parameter name", offset)),
                }
                match cur.peek() {
                    Some(TokenKind::Comma) => {
                        cur.pos += 1;
                    }
                    Some(TokenKind::RBracket) => {
                        cur.pos += 1;
                        break;
                    }
                    _ => return Err(ParseError::new("expected `,` or `]`", cur.offset())),
                }
            }
            cur.expect(TokenKind::Arrow)?;
        }

        cur.expect(TokenKind::LBrace)?;
        let domain_tuple = cur.take_ident().unwrap_or_default();
        let domain_dims = cur.dim_entries()?;

        let range = if cur.peek() == Some(&TokenKind::Arrow) {
            cur.pos += 1;
            let tuple = cur.take_ident().unwrap_or_default();
            Some((tuple, cur.dim_entries()?))
        } else {
            None
        };

        let constraints = if cur.peek() == Some(&TokenKind::Colon) {
            cur.pos += 1;
            cur.constraint_entries()?
        } else {
            Vec::new()
        };

        cur.expect(TokenKind::RBrace)?;
        if cur.peek().is_some() {
            return Err(ParseError::new("trailing input", cur.offset()));
        }

        Ok(Self {
            params,
            domain_tuple,
            domain_dims,
            range,
            constraints,
        })
    }
}

// ---------------------------------------------------------------------------
// Constraint compilation
// ---------------------------------------------------------------------------

/// Resolved column layout for constraint compilation.
struct Columns {
    /// Dimension names; duplicated names resolve to the first occurrence.
    dims: Vec<String>,
    /// Declared parameters, extended lazily from the extras.
    params: Vec<String>,
    /// Names permitted to become parameters on first use.
    extras: Vec<String>,
}

impl Columns {
    /// Pre-register every extra name used by the constraint texts, so the
    /// parameter list is fixed before expressions are built.
    fn collect_used_extras(&mut self, constraints: &[String]) -> std::result::Result<(), ParseError> {
        for text in constraints {
            for tok in tokenize(text)? {
                if let TokenKind::Ident(name) = tok.kind {
                    if name == "and" {
                        continue;
                    }
                    if self.dims.contains(&name) || self.params.contains(&name) {
                        continue;
                    }
                    if self.extras.contains(&name) {
                        self.params.push(name);
                    } else {
                        return Err(ParseError::new(
                            format!("undeclared name `{}`", name),
                            tok.start,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn var(&self, name: &str) -> Option<AffineExpr> {
        self.dims
            .iter()
            .position(|d| d == name)
            .map(|i| AffineExpr::var(i, self.dims.len(), self.params.len()))
            .or_else(|| {
                self.params
                    .iter()
                    .position(|p| p == name)
                    .map(|i| AffineExpr::param(i, self.dims.len(), self.params.len()))
            })
    }
}

struct ExprParser<'a> {
    toks: Vec<Token>,
    pos: usize,
    cols: &'a Columns,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.toks.get(self.pos).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.toks.get(self.pos).map(|t| t.start).unwrap_or(0)
    }

    fn atom(&mut self) -> std::result::Result<AffineExpr, ParseError> {
        let offset = self.offset();
        match self.peek().cloned() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                Ok(-self.atom()?)
            }
            Some(TokenKind::Int(v)) => {
                self.pos += 1;
                // `2i` and `2*i` are both accepted.
                let scaled = match self.peek().cloned() {
                    Some(TokenKind::Star) => {
                        self.pos += 1;
                        Some(self.atom()?)
                    }
                    Some(TokenKind::Ident(_)) => Some(self.atom()?),
                    _ => None,
                };
                match scaled {
                    Some(expr) => Ok(expr.scale(v)),
                    None => Ok(AffineExpr::constant(
                        v,
                        self.cols.dims.len(),
                        self.cols.params.len(),
                    )),
                }
            }
            Some(TokenKind::Ident(name)) => {
                self.pos += 1;
                let var = self
                    .cols
                    .var(&name)
                    .ok_or_else(|| ParseError::new(format!("undeclared name `{}`", name), offset))?;
                if self.peek() == Some(&TokenKind::Star) {
                    self.pos += 1;
                    match self.peek().cloned() {
                        Some(TokenKind::Int(v)) => {
                            self.pos += 1;
                            Ok(var.scale(v))
                        }
                        _ => Err(ParseError::new("expected integer factor", self.offset())),
                    }
                } else {
                    Ok(var)
                }
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let expr = self.expr()?;
                match self.peek() {
                    Some(TokenKind::RParen) => {
                        self.pos += 1;
                        Ok(expr)
                    }
                    _ => Err(ParseError::new("expected `)`", self.offset())),
                }
            }
            _ => Err(ParseError::new("expected expression", offset)),
        }
    }

    fn expr(&mut self) -> std::result::Result<AffineExpr, ParseError> {
        let mut acc = self.atom()?;
        loop {
            match self.peek() {
                Some(TokenKind::Plus) => {
                    self.pos += 1;
                    acc = acc + self.atom()?;
                }
                Some(TokenKind::Minus) => {
                    self.pos += 1;
                    acc = acc - self.atom()?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }
}

fn relop(kind: &TokenKind) -> Option<fn(AffineExpr, AffineExpr) -> Constraint> {
    fn le(a: AffineExpr, b: AffineExpr) -> Constraint {
        Constraint::ge_zero(b - a)
    }
    fn lt(a: AffineExpr, b: AffineExpr) -> Constraint {
        let mut e = b - a;
        e.constant -= 1;
        Constraint::ge_zero(e)
    }
    fn ge(a: AffineExpr, b: AffineExpr) -> Constraint {
        Constraint::ge_zero(a - b)
    }
    fn gt(a: AffineExpr, b: AffineExpr) -> Constraint {
        let mut e = a - b;
        e.constant -= 1;
        Constraint::ge_zero(e)
    }
    fn eq(a: AffineExpr, b: AffineExpr) -> Constraint {
        Constraint::eq_zero(a - b)
    }
    match kind {
        TokenKind::Le => Some(le),
        TokenKind::Lt => Some(lt),
        TokenKind::Ge => Some(ge),
        TokenKind::Gt => Some(gt),
        TokenKind::Eq => Some(eq),
        _ => None,
    }
}

/// Compile one constraint substring (possibly a comparison chain) into
/// constraints over the given columns.
fn compile_constraint(
    text: &str,
    cols: &Columns,
) -> std::result::Result<Vec<Constraint>, ParseError> {
    let toks = tokenize(text)?;
    let mut p = ExprParser {
        toks,
        pos: 0,
        cols,
    };
    let mut lhs = p.expr()?;
    let mut out = Vec::new();
    loop {
        let offset = p.offset();
        let op = match p.peek().and_then(relop) {
            Some(op) => {
                p.pos += 1;
                op
            }
            None if out.is_empty() => {
                return Err(ParseError::new("expected comparison operator", offset))
            }
            None => break,
        };
        let rhs = p.expr()?;
        out.push(op(lhs.clone(), rhs.clone()));
        lhs = rhs;
    }
    if p.peek().is_some() {
        return Err(ParseError::new("trailing tokens in constraint", p.offset()));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Full set/map construction
// ---------------------------------------------------------------------------

fn malformed(e: ParseError) -> Error {
    Error::Algebra(AlgebraError::MalformedText {
        message: e.message,
        offset: e.offset,
    })
}

fn ident_entry(entry: &str) -> Option<String> {
    match tokenize(entry) {
        Ok(toks) if toks.len() == 1 => match &toks[0].kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Parse ISL set text into a [`Set`]. `extra_params` may be referenced by
/// constraints without appearing in the leading parameter list.
pub fn parse_set(text: &str, extra_params: &[String]) -> Result<Set> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("empty set text".to_string()));
    }
    let tokens = SetTokens::parse(text).map_err(malformed)?;
    let mut dims = Vec::with_capacity(tokens.dims.len());
    for entry in &tokens.dims {
        match ident_entry(entry) {
            Some(name) => dims.push(name),
            None => {
                return Err(Error::InvalidInput(format!(
                    "set dimension `{}` is not an identifier",
                    entry
                )))
            }
        }
    }
    let mut cols = Columns {
        dims,
        params: tokens.params.clone(),
        extras: extra_params.to_vec(),
    };
    cols.collect_used_extras(&tokens.constraints)
        .map_err(malformed)?;

    let mut cs = ConstraintSystem::new(cols.dims.len(), cols.params.len());
    for text in &tokens.constraints {
        for c in compile_constraint(text, &cols).map_err(malformed)? {
            cs.add(c);
        }
    }
    Ok(Set {
        space: Space::new(tokens.tuple, cols.dims),
        params: cols.params,
        cs,
    })
}

/// Parse ISL map text into a [`Map`].
///
/// Range entries may be bare names (repeated domain names denote equality)
/// or affine expressions over the domain dimensions (each becomes a fresh
/// anonymous dimension constrained to the expression).
pub fn parse_map(text: &str, extra_params: &[String]) -> Result<Map> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("empty map text".to_string()));
    }
    let tokens = MapTokens::parse(text).map_err(malformed)?;

    let mut domain_dims = Vec::with_capacity(tokens.domain_dims.len());
    for entry in &tokens.domain_dims {
        match ident_entry(entry) {
            Some(name) => domain_dims.push(name),
            None => {
                return Err(Error::InvalidInput(format!(
                    "domain dimension `{}` is not an identifier",
                    entry
                )))
            }
        }
    }

    // Range entries: bare names stay; expressions get a fresh name and an
    // equality constraint added below.
    let mut range_dims = Vec::with_capacity(tokens.range_dims.len());
    let mut expr_entries: Vec<(usize, String)> = Vec::new();
    for (k, entry) in tokens.range_dims.iter().enumerate() {
        match ident_entry(entry) {
            Some(name) => range_dims.push(name),
            None => {
                let taken: Vec<&str> = domain_dims
                    .iter()
                    .map(|s| s.as_str())
                    .chain(range_dims.iter().map(|s| s.as_str()))
                    .chain(tokens.params.iter().map(|s| s.as_str()))
                    .collect();
                let name = fresh_name(&format!("e{}", k), &taken);
                expr_entries.push((k, entry.clone()));
                range_dims.push(name);
            }
        }
    }

    // Constraint name resolution: domain dimensions first, then range
    // dimensions with unseen names.
    let n_in = domain_dims.len();
    let n_out = range_dims.len();
    let mut all_dims = domain_dims.clone();
    all_dims.extend(range_dims.iter().cloned());
    let mut cols = Columns {
        dims: all_dims,
        params: tokens.params.clone(),
        extras: extra_params.to_vec(),
    };
    let expr_texts: Vec<String> = expr_entries.iter().map(|(_, t)| t.clone()).collect();
    cols.collect_used_extras(&tokens.constraints)
        .map_err(malformed)?;
    cols.collect_used_extras(&expr_texts).map_err(malformed)?;

    let n_var = n_in + n_out;
    let mut cs = ConstraintSystem::new(n_var, cols.params.len());

    // Implicit equalities for repeated names.
    for (k, out_name) in range_dims.iter().enumerate() {
        if let Some(j) = domain_dims.iter().position(|d| d == out_name) {
            let mut expr = AffineExpr::zero(n_var, cols.params.len());
            expr.coeffs[n_in + k] = 1;
            expr.coeffs[j] = -1;
            cs.add(Constraint::eq_zero(expr));
        }
    }

    // Equalities for expression entries.
    for (k, entry) in &expr_entries {
        let toks = tokenize(entry).map_err(malformed)?;
        let mut p = ExprParser {
            toks,
            pos: 0,
            cols: &cols,
        };
        let value = p.expr().map_err(malformed)?;
        if p.peek().is_some() {
            return Err(Error::InvalidInput(format!(
                "range dimension `{}` is not an affine expression",
                entry
            )));
        }
        let mut expr = AffineExpr::var(n_in + k, n_var, cols.params.len());
        expr = expr - value;
        cs.add(Constraint::eq_zero(expr));
    }

    for text in &tokens.constraints {
        for c in compile_constraint(text, &cols).map_err(malformed)? {
            cs.add(c);
        }
    }

    Ok(Map {
        in_space: Space::new(tokens.domain_tuple, domain_dims),
        out_space: Space::new(tokens.range_tuple, range_dims),
        params: cols.params,
        cs,
    })
}
