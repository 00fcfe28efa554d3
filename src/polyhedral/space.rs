//! Spaces name one side of a set or relation.
//!
//! A space carries a *tuple name* (possibly empty, i.e. anonymous) and an
//! ordered list of *dimension names*. A set has one space; a map has a
//! domain space and a range space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a set or relation: tuple name plus named dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Tuple name; empty for an anonymous space.
    pub tuple: String,
    /// Ordered dimension names.
    pub dims: Vec<String>,
}

impl Space {
    /// Create a space with the given tuple name and dimension names.
    pub fn new(tuple: impl Into<String>, dims: Vec<String>) -> Self {
        Self {
            tuple: tuple.into(),
            dims,
        }
    }

    /// Create an anonymous space with the given dimension names.
    pub fn anonymous(dims: Vec<String>) -> Self {
        Self::new("", dims)
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.dims.len()
    }

    /// Name of dimension `idx`.
    pub fn dim_name(&self, idx: usize) -> Option<&str> {
        self.dims.get(idx).map(|s| s.as_str())
    }

    /// Position of the dimension called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Insert a dimension at `pos`.
    pub fn insert_dim(&mut self, pos: usize, name: impl Into<String>) {
        self.dims.insert(pos, name.into());
    }

    /// Remove the dimension at `pos`.
    pub fn remove_dim(&mut self, pos: usize) {
        self.dims.remove(pos);
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tuple, self.dims.join(", "))
    }
}

/// Pick a dimension name based on `base` that does not collide with any
/// name in `taken`.
pub fn fresh_name(base: &str, taken: &[&str]) -> String {
    if !taken.contains(&base) {
        return base.to_string();
    }
    let mut i = 0;
    loop {
        let candidate = format!("{}{}", base, i);
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space() {
        let space = Space::new("S", vec!["i".to_string(), "j".to_string()]);
        assert_eq!(space.dim(), 2);
        assert_eq!(space.dim_name(0), Some("i"));
        assert_eq!(space.index_of("j"), Some(1));
        assert_eq!(space.to_string(), "S[i, j]");
    }

    #[test]
    fn test_fresh_name() {
        assert_eq!(fresh_name("i_out", &["i", "j"]), "i_out");
        assert_eq!(fresh_name("i", &["i", "i0"]), "i1");
    }
}
