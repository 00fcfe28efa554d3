//! The entity model: functions, computations, buffers, and invariants.

pub mod buffer;
pub mod computation;
pub mod function;
pub mod invariant;

pub use buffer::{ArgumentKind, Buffer};
pub use computation::Computation;
pub use function::Function;
pub use invariant::Invariant;
