//! Integer-set / affine-map algebra and the loop-AST builder.
//!
//! Sets and maps carry named tuples and named dimensions, are built from
//! the ISL text form, and support the operations the schedule pipeline
//! needs: intersection, image (`apply`), identity relations, dimension
//! insertion, coalescing, and deterministic AST construction.

pub mod ast_build;
pub mod constraint;
pub mod expr;
pub mod map;
pub mod set;
pub mod space;

pub use ast_build::{AstExpr, AstNode, AstStatement};
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use expr::AffineExpr;
pub use map::{Map, UnionMap};
pub use set::{Set, UnionSet};
pub use space::Space;

/// Algebra context associated with a function.
///
/// Holds the symbolic parameter names (the function's invariants) that
/// set/map text may reference without declaring them in a leading `[...]`
/// list. All sets and maps of a function are parsed through its context.
#[derive(Debug, Clone, Default)]
pub struct Context {
    parameters: Vec<String>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbolic parameter.
    pub fn add_parameter(&mut self, name: &str) {
        if !self.parameters.iter().any(|p| p == name) {
            self.parameters.push(name.to_string());
        }
    }

    /// The registered parameter names.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}
