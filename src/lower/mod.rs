//! Lowering of the polyhedral AST to host statements.
//!
//! Each `UserLeaf` becomes a `Store`: the leaf's argument expressions are
//! substituted into the computation's body, reads of other computations
//! are resolved through their access relations into buffer loads, and the
//! store index is obtained by applying the computation's own access
//! relation to the same argument vector. `For` nodes are tagged parallel
//! or vectorized when the loop level matches the tag recorded for the
//! single computation they enclose, and the whole body is wrapped in
//! `LetStmt`s materializing the function's invariants.

use crate::codegen::{BinOp, Expr, LoopKind, StmtBuilder};
use crate::ir::{Computation, Function};
use crate::polyhedral::ast_build::{AstBinOp, AstExpr, AstNode};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::Map;
use crate::utils::errors::{Error, Result};
use std::collections::HashMap;

/// Emit host statements for a generated AST.
pub(crate) fn emit<B: StmtBuilder>(
    func: &Function,
    ast: &AstNode,
    builder: &mut B,
) -> Result<B::Stmt> {
    let body = walk(func, ast, 0, builder)?;
    let mut stmt = match body {
        Some(stmt) => stmt,
        None => builder.block(Vec::new()),
    };
    for invariant in func.invariants().iter().rev() {
        stmt = builder.let_stmt(invariant.name(), invariant.expr().clone(), stmt);
    }
    Ok(stmt)
}

fn walk<B: StmtBuilder>(
    func: &Function,
    node: &AstNode,
    loop_level: usize,
    builder: &mut B,
) -> Result<Option<B::Stmt>> {
    match node {
        AstNode::For {
            iterator,
            lower,
            upper,
            body,
        } => {
            let inner = match walk(func, body, loop_level + 1, builder)? {
                Some(inner) => inner,
                None => return Ok(None),
            };
            let kind = loop_kind(func, node, loop_level);
            Ok(Some(builder.for_loop(
                iterator,
                convert(lower),
                convert(upper),
                kind,
                inner,
            )))
        }
        AstNode::If {
            cond,
            then_body,
            else_body,
        } => {
            let then_stmt = match walk(func, then_body, loop_level, builder)? {
                Some(stmt) => stmt,
                None => return Ok(None),
            };
            let else_stmt = match else_body {
                Some(e) => walk(func, e, loop_level, builder)?,
                None => None,
            };
            Ok(Some(builder.if_then_else(convert(cond), then_stmt, else_stmt)))
        }
        AstNode::Block(children) => {
            let mut stmts = Vec::with_capacity(children.len());
            for child in children {
                if let Some(stmt) = walk(func, child, loop_level, builder)? {
                    stmts.push(stmt);
                }
            }
            if stmts.is_empty() {
                Ok(None)
            } else {
                Ok(Some(builder.block(stmts)))
            }
        }
        AstNode::UserLeaf { name, args } => leaf(func, name, args, builder),
    }
}

/// The loop kind for a `For` node: parallel or vectorized when the
/// recorded tag level of the sole enclosed computation matches this loop
/// level, serial otherwise.
fn loop_kind(func: &Function, node: &AstNode, loop_level: usize) -> LoopKind {
    let mut names = Vec::new();
    leaf_names(node, &mut names);
    if let [name] = names.as_slice() {
        if func.should_parallelize(name, loop_level) {
            return LoopKind::Parallel;
        }
        if func.should_vectorize(name, loop_level) {
            return LoopKind::Vectorized;
        }
    }
    LoopKind::Serial
}

fn leaf_names(node: &AstNode, out: &mut Vec<String>) {
    match node {
        AstNode::For { body, .. } => leaf_names(body, out),
        AstNode::If {
            then_body,
            else_body,
            ..
        } => {
            leaf_names(then_body, out);
            if let Some(e) = else_body {
                leaf_names(e, out);
            }
        }
        AstNode::Block(children) => {
            for c in children {
                leaf_names(c, out);
            }
        }
        AstNode::UserLeaf { name, .. } => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
    }
}

fn leaf<B: StmtBuilder>(
    func: &Function,
    name: &str,
    args: &[AstExpr],
    builder: &mut B,
) -> Result<Option<B::Stmt>> {
    let comp = func.computation(name)?;
    if !comp.is_schedulable() {
        return Ok(None);
    }
    let body = comp.body().ok_or_else(|| {
        Error::InvalidInput(format!("computation `{}` has no body expression", name))
    })?;

    let args: Vec<Expr> = args.iter().map(convert).collect();
    let mut substitution = HashMap::new();
    for (dim, arg) in comp.iteration_domain().space.dims.iter().zip(&args) {
        substitution.insert(dim.clone(), arg.clone());
    }
    let value = resolve_accesses(func, &body.substitute(&substitution))?;

    let access = effective_access(func, comp)?;
    let (buffer, index) = access_index(func, &access, &args)?;
    Ok(Some(builder.store(&buffer, index, value)))
}

/// The access relation used for a computation's store: the bound relation
/// if present, otherwise (with auto data mapping) the schedule-derived
/// mapping targeting the computation's name.
fn effective_access(func: &Function, comp: &Computation) -> Result<Map> {
    match comp.access() {
        Some(access) => Ok(access.clone()),
        None if func.options().auto_data_mapping => {
            Ok(comp.access_from_schedule(comp.name()))
        }
        None => Err(Error::UnboundComputation(comp.name().to_string())),
    }
}

/// Apply an access relation to concrete argument expressions: solve the
/// buffer indices from the relation's equalities, substitute the argument
/// vector, and linearize against the target buffer.
fn access_index(func: &Function, access: &Map, args: &[Expr]) -> Result<(String, Expr)> {
    let outputs = access.solve_outputs()?;
    let indices: Vec<Expr> = outputs
        .iter()
        .map(|e| affine_to_expr(e, args, &access.params))
        .collect();
    let target = access.out_tuple().to_string();
    let buffer = func.buffer(&target).ok_or_else(|| {
        Error::InvalidInput(format!(
            "access targets buffer `{}` which is not declared in function `{}`",
            target,
            func.name()
        ))
    })?;
    Ok((target, buffer.linearize(&indices)?))
}

/// Replace [`Expr::Access`] reads with buffer loads through the accessed
/// computation's access relation.
fn resolve_accesses(func: &Function, expr: &Expr) -> Result<Expr> {
    Ok(match expr {
        Expr::Access { computation, args } => {
            let args: Vec<Expr> = args
                .iter()
                .map(|a| resolve_accesses(func, a))
                .collect::<Result<_>>()?;
            let target = func.computation(computation)?;
            let access = effective_access(func, target)?;
            let (buffer, index) = access_index(func, &access, &args)?;
            Expr::load(&buffer, index)
        }
        Expr::Cast(ty, e) => Expr::Cast(*ty, Box::new(resolve_accesses(func, e)?)),
        Expr::Load { buffer, index } => Expr::Load {
            buffer: buffer.clone(),
            index: Box::new(resolve_accesses(func, index)?),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(resolve_accesses(func, left)?),
            right: Box::new(resolve_accesses(func, right)?),
        },
        Expr::Min(a, b) => Expr::Min(
            Box::new(resolve_accesses(func, a)?),
            Box::new(resolve_accesses(func, b)?),
        ),
        Expr::Max(a, b) => Expr::Max(
            Box::new(resolve_accesses(func, a)?),
            Box::new(resolve_accesses(func, b)?),
        ),
        Expr::FloorDiv(a, b) => Expr::FloorDiv(
            Box::new(resolve_accesses(func, a)?),
            Box::new(resolve_accesses(func, b)?),
        ),
        Expr::CeilDiv(a, b) => Expr::CeilDiv(
            Box::new(resolve_accesses(func, a)?),
            Box::new(resolve_accesses(func, b)?),
        ),
        Expr::Int(_) | Expr::Var(_) => expr.clone(),
    })
}

/// Render an affine expression whose variable columns cover the relation's
/// input dimensions, substituting the given argument expressions.
fn affine_to_expr(expr: &AffineExpr, args: &[Expr], params: &[String]) -> Expr {
    let mut terms: Vec<Expr> = Vec::new();
    for (v, &coeff) in expr.coeffs.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let base = args
            .get(v)
            .cloned()
            .unwrap_or_else(|| Expr::var(&format!("c{}", v)));
        terms.push(if coeff == 1 {
            base
        } else {
            Expr::int(coeff).mul(base)
        });
    }
    for (p, &coeff) in expr.param_coeffs.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let base = Expr::var(&params[p]);
        terms.push(if coeff == 1 {
            base
        } else {
            Expr::int(coeff).mul(base)
        });
    }
    if expr.constant != 0 || terms.is_empty() {
        terms.push(Expr::int(expr.constant));
    }
    let mut acc = terms.remove(0);
    for term in terms {
        acc = acc.add(term);
    }
    acc
}

fn convert(expr: &AstExpr) -> Expr {
    match expr {
        AstExpr::Int(v) => Expr::Int(*v),
        AstExpr::Var(name) => Expr::Var(name.clone()),
        AstExpr::Binary { op, left, right } => {
            let op = match op {
                AstBinOp::Add => BinOp::Add,
                AstBinOp::Sub => BinOp::Sub,
                AstBinOp::Mul => BinOp::Mul,
                AstBinOp::Ge => BinOp::Ge,
                AstBinOp::Eq => BinOp::Eq,
                AstBinOp::And => BinOp::And,
            };
            Expr::Binary {
                op,
                left: Box::new(convert(left)),
                right: Box::new(convert(right)),
            }
        }
        AstExpr::FloorDiv(a, b) => Expr::FloorDiv(Box::new(convert(a)), Box::new(convert(b))),
        AstExpr::CeilDiv(a, b) => Expr::CeilDiv(Box::new(convert(a)), Box::new(convert(b))),
        AstExpr::Min(a, b) => Expr::Min(Box::new(convert(a)), Box::new(convert(b))),
        AstExpr::Max(a, b) => Expr::Max(Box::new(convert(a)), Box::new(convert(b))),
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::{ElementType, Expr, LoopKind, Stmt};
    use crate::ir::{ArgumentKind, Function};

    #[test]
    fn test_pointwise_lowering() {
        let mut f = Function::new("copy").unwrap();
        f.add_buffer("in_buf", vec![8], ElementType::I32, ArgumentKind::Input)
            .unwrap();
        f.add_buffer("out_buf", vec![8], ElementType::I32, ArgumentKind::Output)
            .unwrap();
        f.add_computation(
            "{ input[i] : 0 <= i < 8 }",
            None,
            false,
            ElementType::I32,
        )
        .unwrap();
        f.add_computation(
            "{ out[i] : 0 <= i < 8 }",
            Some(Expr::access("input", vec![Expr::var("i")])),
            true,
            ElementType::I32,
        )
        .unwrap();
        f.bind_to("input", "in_buf").unwrap();
        f.bind_to("out", "out_buf").unwrap();

        let stmt = f.gen_stmt().unwrap().clone();
        match stmt {
            Stmt::For {
                iterator,
                kind,
                body,
                ..
            } => {
                assert_eq!(iterator, "c0");
                assert_eq!(kind, LoopKind::Serial);
                match *body {
                    Stmt::Store {
                        buffer,
                        index,
                        value,
                    } => {
                        assert_eq!(buffer, "out_buf");
                        assert_eq!(index, Expr::var("c0"));
                        assert_eq!(value, Expr::load("in_buf", Expr::var("c0")));
                    }
                    other => panic!("expected store, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_unbound_computation_detected() {
        let mut f = Function::with_options(
            "f",
            crate::options::Options {
                auto_data_mapping: false,
            },
        )
        .unwrap();
        f.add_computation(
            "{ S[i] : 0 <= i < 8 }",
            Some(Expr::int(0)),
            true,
            ElementType::I32,
        )
        .unwrap();
        assert!(matches!(
            f.gen_stmt(),
            Err(crate::utils::errors::Error::UnboundComputation(_))
        ));
    }
}
