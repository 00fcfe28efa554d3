//! # polyfront - Polyhedral DSL Front End
//!
//! A front end for expressing array/loop computations separately from
//! their execution order and data layout, then lowering them to an
//! imperative loop AST:
//! - Iteration domains, schedules, and access relations over an
//!   integer-set/affine-map algebra
//! - Schedule transformations: tiling, splitting, interchange, relative
//!   ordering, parallel/vector tagging
//! - Alignment into a common time-processor space and deterministic
//!   loop-AST generation with buffer-indexed store leaves
//!
//! ## Architecture
//!
//! ```text
//! Entities -> Schedule rewrites -> align_schedules -> time-processor
//! domain -> loop AST -> host statements -> C text
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polyfront::prelude::*;
//!
//! let mut f = Function::new("blur")?;
//! f.add_buffer("out_buf", vec![10, 20], ElementType::U8, ArgumentKind::Output)?;
//! f.add_computation(
//!     "{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }",
//!     Some(Expr::var("i").add(Expr::var("j"))),
//!     true,
//!     ElementType::U8,
//! )?;
//! f.computation_mut("S")?.tile(0, 1, 2, 2)?;
//! f.tag_parallel_dimension("S", 0)?;
//! f.bind_to("S", "out_buf")?;
//! let code = f.gen_c_code()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod ir;
pub mod lower;
pub mod options;
pub mod parser;
pub mod polyhedral;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::codegen::{ElementType, Expr, IrBuilder, LoopKind, Stmt, StmtBuilder};
    pub use crate::ir::{ArgumentKind, Buffer, Computation, Function, Invariant};
    pub use crate::options::{default_options, set_default_options, Options};
    pub use crate::polyhedral::{AffineExpr, AstExpr, AstNode, Map, Set, Space};
    pub use crate::utils::errors::{AlgebraError, Error, Result};
}

pub use ir::Function;
pub use options::Options;
pub use utils::errors::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
