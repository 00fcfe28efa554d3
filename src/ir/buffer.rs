//! Buffers: the memory objects computations are stored into.

use crate::codegen::{ElementType, Expr};
use crate::utils::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a buffer relates to the function's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentKind {
    /// Read by the function, allocated by the caller.
    Input,
    /// Written by the function, allocated by the caller.
    Output,
    /// Declared and used inside the function only.
    Internal,
}

/// A multi-dimensional buffer with a fixed element type.
///
/// The first size is the leftmost dimension: for `buf[N0][N1][N2]` the
/// sizes vector is `[N0, N1, N2]` and elements are laid out row-major.
#[derive(Debug, Clone)]
pub struct Buffer {
    name: String,
    dim_sizes: Vec<i64>,
    element_type: ElementType,
    kind: ArgumentKind,
    data: Option<Vec<u8>>,
}

impl Buffer {
    pub(crate) fn new(
        name: &str,
        dim_sizes: Vec<i64>,
        element_type: ElementType,
        kind: ArgumentKind,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidInput("empty buffer name".to_string()));
        }
        if dim_sizes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "buffer `{}` must have at least one dimension",
                name
            )));
        }
        if let Some(&bad) = dim_sizes.iter().find(|&&s| s <= 0) {
            return Err(Error::InvalidInput(format!(
                "buffer `{}` has non-positive dimension size {}",
                name, bad
            )));
        }
        Ok(Self {
            name: name.to_string(),
            dim_sizes,
            element_type,
            kind,
            data: None,
        })
    }

    /// Attach host-provided contents.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    /// Buffer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize {
        self.dim_sizes.len()
    }

    /// Dimension sizes, leftmost first.
    pub fn dim_sizes(&self) -> &[i64] {
        &self.dim_sizes
    }

    /// Element type.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Argument kind.
    pub fn argument_kind(&self) -> ArgumentKind {
        self.kind
    }

    /// Host-provided contents, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Linearize per-dimension index expressions into one row-major
    /// element index.
    pub fn linearize(&self, indices: &[Expr]) -> Result<Expr> {
        if indices.len() != self.dim_sizes.len() {
            return Err(Error::DimensionalityMismatch(format!(
                "buffer `{}` has {} dimensions but the access provides {}",
                self.name,
                self.dim_sizes.len(),
                indices.len()
            )));
        }
        let mut acc = indices[0].clone();
        for (i, idx) in indices.iter().enumerate().skip(1) {
            acc = acc.mul(Expr::int(self.dim_sizes[i])).add(idx.clone());
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::c::expr_to_c;

    #[test]
    fn test_validation() {
        assert!(Buffer::new("", vec![4], ElementType::U8, ArgumentKind::Input).is_err());
        assert!(Buffer::new("b", vec![], ElementType::U8, ArgumentKind::Input).is_err());
        assert!(Buffer::new("b", vec![4, 0], ElementType::U8, ArgumentKind::Input).is_err());
        assert!(Buffer::new("b", vec![4, 2], ElementType::U8, ArgumentKind::Input).is_ok());
    }

    #[test]
    fn test_linearize_row_major() {
        let buf =
            Buffer::new("b", vec![10, 20], ElementType::U8, ArgumentKind::Output).unwrap();
        let idx = buf
            .linearize(&[Expr::var("i"), Expr::var("j")])
            .unwrap();
        assert_eq!(expr_to_c(&idx), "((i * 20) + j)");
    }
}
