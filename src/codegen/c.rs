//! C text emission from lowered statements.
//!
//! A small textual backend over [`Stmt`] trees, mainly for diagnostics and
//! tests; object-file emission belongs to the downstream code generator.

use crate::codegen::{BinOp, ElementType, Expr, LoopKind, Stmt};
use crate::utils::pretty::CodeFormatter;

/// Emit a lowered statement as C text.
pub fn emit_c(stmt: &Stmt) -> String {
    let mut f = CodeFormatter::default_indent();
    emit_stmt(&mut f, stmt);
    f.finish()
}

fn emit_stmt(f: &mut CodeFormatter, stmt: &Stmt) {
    match stmt {
        Stmt::Let { name, value, body } => {
            f.writeln(&format!("int64_t {} = {};", name, expr_to_c(value)));
            emit_stmt(f, body);
        }
        Stmt::For {
            iterator,
            lower,
            upper,
            kind,
            body,
        } => {
            match kind {
                LoopKind::Serial => {}
                LoopKind::Parallel => f.writeln("#pragma omp parallel for"),
                LoopKind::Vectorized => f.writeln("#pragma omp simd"),
                LoopKind::Unrolled => f.writeln("#pragma unroll"),
            }
            f.writeln(&format!(
                "for (int64_t {it} = {lo}; {it} < {hi}; {it}++) {{",
                it = iterator,
                lo = expr_to_c(lower),
                hi = expr_to_c(upper)
            ));
            f.indent();
            emit_stmt(f, body);
            f.dedent();
            f.writeln("}");
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            f.writeln(&format!("if ({}) {{", expr_to_c(cond)));
            f.indent();
            emit_stmt(f, then_body);
            f.dedent();
            match else_body {
                Some(else_body) => {
                    f.writeln("} else {");
                    f.indent();
                    emit_stmt(f, else_body);
                    f.dedent();
                    f.writeln("}");
                }
                None => f.writeln("}"),
            }
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                emit_stmt(f, s);
            }
        }
        Stmt::Store {
            buffer,
            index,
            value,
        } => {
            f.writeln(&format!(
                "{}[{}] = {};",
                buffer,
                expr_to_c(index),
                expr_to_c(value)
            ));
        }
    }
}

/// Convert a host expression to C text.
pub fn expr_to_c(expr: &Expr) -> String {
    match expr {
        Expr::Int(v) => v.to_string(),
        Expr::Var(name) => name.clone(),
        Expr::Cast(ty, e) => format!("({})({})", c_type(ty), expr_to_c(e)),
        Expr::Load { buffer, index } => format!("{}[{}]", buffer, expr_to_c(index)),
        Expr::Access { computation, args } => {
            let args: Vec<String> = args.iter().map(expr_to_c).collect();
            format!("{}({})", computation, args.join(", "))
        }
        Expr::Binary { op, left, right } => {
            let op = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Mod => "%",
                BinOp::Ge => ">=",
                BinOp::Eq => "==",
                BinOp::And => "&&",
            };
            format!("({} {} {})", expr_to_c(left), op, expr_to_c(right))
        }
        Expr::Min(a, b) => format!("MIN({}, {})", expr_to_c(a), expr_to_c(b)),
        Expr::Max(a, b) => format!("MAX({}, {})", expr_to_c(a), expr_to_c(b)),
        Expr::FloorDiv(a, b) => format!("FLOOR_DIV({}, {})", expr_to_c(a), expr_to_c(b)),
        Expr::CeilDiv(a, b) => format!("CEIL_DIV({}, {})", expr_to_c(a), expr_to_c(b)),
    }
}

fn c_type(ty: &ElementType) -> &'static str {
    match (ty.float, ty.signed, ty.bits) {
        (true, _, 32) => "float",
        (true, _, _) => "double",
        (false, true, 8) => "int8_t",
        (false, true, 16) => "int16_t",
        (false, true, 32) => "int32_t",
        (false, true, _) => "int64_t",
        (false, false, 8) => "uint8_t",
        (false, false, 16) => "uint16_t",
        (false, false, 32) => "uint32_t",
        (false, false, _) => "uint64_t",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::IrBuilder;
    use crate::codegen::StmtBuilder;

    #[test]
    fn test_emit_loop_with_store() {
        let mut b = IrBuilder;
        let store = b.store(
            "out",
            Expr::var("c0"),
            Expr::load("in", Expr::var("c0")).add(Expr::int(1)),
        );
        let loop_ = b.for_loop("c0", Expr::int(0), Expr::int(8), LoopKind::Parallel, store);
        let code = emit_c(&loop_);
        assert!(code.contains("#pragma omp parallel for"));
        assert!(code.contains("for (int64_t c0 = 0; c0 < 8; c0++) {"));
        assert!(code.contains("out[c0] = (in[c0] + 1);"));
    }

    #[test]
    fn test_cast_emission() {
        let e = Expr::cast(ElementType::U8, Expr::var("i"));
        assert_eq!(expr_to_c(&e), "(uint8_t)(i)");
    }
}
